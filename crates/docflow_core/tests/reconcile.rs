use std::collections::BTreeSet;

use docflow_core::{
    update, ArtifactKind, Effect, HistoryEntry, JobId, JobOrigin, JobResult, JobState, Msg,
    ProcessMode, ServerId, SourceFile, TrackerState, UploadOutcome, INCOMPLETE_PROGRESS,
    PARTIAL_PROGRESS,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    docflow_logging::initialize_for_tests();
}

fn entry(server_id: &str, name: &str, status: Option<&str>, is_processing: bool) -> HistoryEntry {
    HistoryEntry {
        server_id: ServerId::new(server_id),
        name: name.to_string(),
        pages: Some(8),
        status: status.map(str::to_string),
        is_processing,
        processing_progress: if is_processing { 40.0 } else { 0.0 },
        artifacts: BTreeSet::from([ArtifactKind::Archive, ArtifactKind::Document]),
    }
}

fn load(state: TrackerState, entries: Vec<HistoryEntry>) -> (TrackerState, Vec<Effect>) {
    update(state, Msg::HistoryLoaded(Ok(entries)))
}

/// Local record uploaded and queued under `server_id`.
fn queued_local(server_id: &str) -> (TrackerState, JobId) {
    let (state, _) = update(
        TrackerState::new(),
        Msg::FilesSelected(vec![SourceFile::local("/tmp/inbox/local.pdf", 10)]),
    );
    let (state, _) = update(
        state,
        Msg::StartBatchClicked {
            mode: ProcessMode::AllPages,
        },
    );
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            job_id: JobId(1),
            result: Ok(UploadOutcome {
                server_id: ServerId::new(server_id),
                already_exists: false,
                result: Some(JobResult {
                    display_name: "local".to_string(),
                    total_pages: None,
                    processing_time: None,
                }),
            }),
        },
    );
    (state, JobId(1))
}

#[test]
fn unknown_history_rows_are_synthesized() {
    init_logging();
    let (state, effects) = load(
        TrackerState::new(),
        vec![
            entry("aaaa", "done", Some("completed"), false),
            entry("bbbb", "busy", Some("processing"), true),
        ],
    );

    assert_eq!(
        effects,
        vec![Effect::StartPolling {
            job_id: JobId(2),
            server_id: ServerId::new("bbbb"),
        }]
    );
    let records: Vec<_> = state.queue().iter().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source().name, "done.pdf");
    assert_eq!(records[0].source().size, None);
    assert_eq!(records[0].origin(), JobOrigin::History);
    assert_eq!(records[0].state(), JobState::Complete);
    assert_eq!(records[0].progress(), 100.0);
    assert_eq!(
        records[0].result().and_then(|r| r.total_pages),
        Some(8)
    );
    assert_eq!(records[1].state(), JobState::Processing);
    assert!(records[1].is_polling());
    assert!((records[1].progress() - 40.0).abs() < 1e-9);
}

#[test]
fn merging_the_same_listing_twice_changes_nothing() {
    init_logging();
    let listing = vec![
        entry("aaaa", "done", Some("completed"), false),
        entry("bbbb", "busy", Some("processing"), true),
        entry("cccc", "half", Some("partial"), false),
    ];
    let (state, _) = load(TrackerState::new(), listing.clone());
    let mut before = state.clone();
    before.consume_dirty();

    let (mut after, effects) = load(before.clone(), listing);

    assert!(effects.is_empty());
    assert!(!after.consume_dirty());
    assert_eq!(before, after);
}

#[test]
fn status_labels_map_to_terminal_states() {
    let (state, _) = load(
        TrackerState::new(),
        vec![
            entry("aaaa", "legacy", None, false),
            entry("bbbb", "half", Some("partial"), false),
            entry("cccc", "odd", Some("failed"), false),
        ],
    );
    let summary: Vec<_> = state
        .queue()
        .iter()
        .map(|r| (r.state(), r.progress()))
        .collect();

    assert_eq!(
        summary,
        vec![
            (JobState::Complete, 100.0),
            (JobState::Partial, PARTIAL_PROGRESS),
            (JobState::Incomplete, INCOMPLETE_PROGRESS),
        ]
    );
}

#[test]
fn history_finishing_a_polled_job_stops_its_loop() {
    init_logging();
    let (state, job_id) = queued_local("aaaa");

    let (state, effects) = load(state, vec![entry("aaaa", "local", Some("completed"), false)]);

    assert_eq!(effects, vec![Effect::StopPolling { job_id }]);
    let record = state.queue().get(job_id).expect("record");
    assert_eq!(record.state(), JobState::Complete);
    assert_eq!(record.origin(), JobOrigin::Local);
    assert!(!record.is_polling());
    assert_eq!(
        record.artifacts().iter().copied().collect::<Vec<_>>(),
        vec![ArtifactKind::Archive, ArtifactKind::Document]
    );
}

#[test]
fn in_progress_row_does_not_start_a_second_loop() {
    let (state, job_id) = queued_local("aaaa");

    let (state, effects) = load(state, vec![entry("aaaa", "local", Some("processing"), true)]);

    assert!(effects.is_empty());
    let record = state.queue().get(job_id).expect("record");
    assert_eq!(record.state(), JobState::Processing);
    assert!(record.is_polling());
}

#[test]
fn in_progress_row_never_reopens_a_finished_record() {
    init_logging();
    let (state, _) = load(
        TrackerState::new(),
        vec![entry("aaaa", "done", Some("completed"), false)],
    );

    let (state, effects) = load(state, vec![entry("aaaa", "done", Some("processing"), true)]);

    assert!(effects.is_empty());
    let record = state.queue().get(JobId(1)).expect("record");
    assert_eq!(record.state(), JobState::Complete);
    assert!(!record.is_polling());
}

#[test]
fn local_failure_survives_a_finished_history_row() {
    let (state, job_id) = queued_local("aaaa");
    let (state, _) = update(
        state,
        Msg::ProgressPolled {
            job_id,
            result: Err("connection reset".to_string()),
        },
    );

    let (state, _) = load(state, vec![entry("aaaa", "local", Some("completed"), false)]);

    let record = state.queue().get(job_id).expect("record");
    assert_eq!(record.state(), JobState::Error);
    assert_eq!(record.last_error(), Some("connection reset"));
    assert!(record.server_info().is_some());
}

#[test]
fn restart_rebinds_polling_for_jobs_still_running() {
    init_logging();
    // Fresh client after a reload: nothing known locally.
    let (state, effects) = update(TrackerState::new(), Msg::Started);
    assert!(effects.contains(&Effect::FetchHistory));

    let (state, effects) = load(
        state,
        vec![entry("bbbb", "busy", Some("queued"), false)],
    );

    assert_eq!(
        effects,
        vec![Effect::StartPolling {
            job_id: JobId(1),
            server_id: ServerId::new("bbbb"),
        }]
    );
    assert_eq!(
        state.queue().get(JobId(1)).map(|r| r.state()),
        Some(JobState::Queued)
    );
}
