use std::path::PathBuf;

use docflow_logging::{docflow_debug, docflow_info, docflow_warn};

use crate::batch::{self, ReprocessOutcome, StopOutcome};
use crate::detail::{self, DetailOpen, DetailOutcome};
use crate::dispatcher::{self, UploadFinish, UploadStart};
use crate::poller::{self, PollOutcome, PollStart};
use crate::reconciler;
use crate::state::NoticeLevel;
use crate::view_model::SelectionStats;
use crate::{
    ArtifactKind, Effect, HistoryEntry, JobDraft, JobId, JobState, Msg, ProcessMode,
    ProgressSnapshot, ServerInfo, SourceFile, StopReply, TrackerState, UploadOutcome,
};

/// Bounds accepted for the server's image concurrency setting.
pub const MIN_CONCURRENT_IMAGES: u32 = 1;
pub const MAX_CONCURRENT_IMAGES: u32 = 16;

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started => {
            let mut effects = vec![Effect::FetchServerInfo];
            effects.extend(request_history(&mut state));
            effects
        }
        Msg::FilesSelected(files) => select_files(&mut state, files),
        Msg::StartBatchClicked { mode } => start_batch(&mut state, mode),
        Msg::UploadFinished { job_id, result } => upload_finished(&mut state, job_id, result),
        Msg::ProgressPolled { job_id, result } => progress_polled(&mut state, job_id, result),
        Msg::RefreshHistoryClicked => request_history(&mut state),
        Msg::HistoryLoaded(result) => history_loaded(&mut state, result),
        Msg::ServerInfoLoaded(result) => {
            match result {
                Ok(info) => {
                    state.server_info = Some(info);
                    state.mark_dirty();
                }
                Err(message) => {
                    state.notify(
                        NoticeLevel::Warning,
                        format!("could not read server info: {message}"),
                    );
                }
            }
            Vec::new()
        }
        Msg::SaveSettingsClicked {
            max_concurrent_images,
        } => save_settings(&mut state, max_concurrent_images),
        Msg::SettingsSaved(result) => settings_saved(&mut state, result),
        Msg::SelectionToggled { job_id } => {
            batch::toggle(&mut state.selection, &state.queue, job_id);
            state.mark_dirty();
            Vec::new()
        }
        Msg::SelectAll(selected) => {
            batch::select_all(&mut state.selection, &state.queue, selected);
            state.mark_dirty();
            Vec::new()
        }
        Msg::BatchDownloadClicked => {
            let server_ids = batch::selected_server_ids(&state.selection, &state.queue);
            if server_ids.is_empty() {
                Vec::new()
            } else {
                vec![Effect::DownloadBatch { server_ids }]
            }
        }
        Msg::BatchDownloadFinished(result) => {
            download_finished(&mut state, "batch archive", result);
            Vec::new()
        }
        Msg::ArtifactDownloadClicked { job_id, kind } => {
            artifact_download(&mut state, job_id, kind)
        }
        Msg::ArtifactDownloadFinished {
            job_id,
            kind,
            result,
        } => {
            download_finished(&mut state, &format!("{kind} of job {job_id}"), result);
            Vec::new()
        }
        Msg::StopClicked { job_id } => stop_clicked(&mut state, job_id),
        Msg::StopFinished { job_id, result } => stop_finished(&mut state, job_id, result),
        Msg::ReprocessClicked { job_id } => reprocess_clicked(&mut state, job_id),
        Msg::ReprocessFinished { job_id, result } => {
            reprocess_finished(&mut state, job_id, result)
        }
        Msg::DetailOpened { job_id } => detail_opened(&mut state, job_id),
        Msg::DetailPolled { job_id, result } => detail_polled(&mut state, job_id, result),
        Msg::DetailClosed => {
            let effects = detail::close(&mut state.detail)
                .map(|job_id| vec![Effect::UnwatchDetail { job_id }])
                .unwrap_or_default();
            state.mark_dirty();
            effects
        }
        Msg::ClearFinishedClicked => clear_finished(&mut state),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn select_files(state: &mut TrackerState, files: Vec<SourceFile>) -> Vec<Effect> {
    let mut stats = SelectionStats::default();
    for file in files {
        if !file.is_pdf() {
            docflow_debug!("skipping non-pdf selection {}", file.name);
            stats.skipped += 1;
            continue;
        }
        match state.queue.add(JobDraft::local(file)) {
            Ok(job_id) => {
                stats.added += 1;
                // A running batch picks up records appended while it iterates.
                if state.batch_active() {
                    state.upload_backlog.push_back(job_id);
                }
            }
            Err(err) => {
                docflow_debug!("selection skipped: {}", err);
                stats.skipped += 1;
            }
        }
    }
    state.last_selection = Some(stats);
    state.mark_dirty();
    Vec::new()
}

fn start_batch(state: &mut TrackerState, mode: ProcessMode) -> Vec<Effect> {
    if state.batch_active() {
        docflow_debug!("batch already running");
        return Vec::new();
    }
    state.batch_mode = mode;
    state.upload_backlog = state.queue.ids_in_state(JobState::Waiting).into();
    if state.upload_backlog.is_empty() {
        state.notify(NoticeLevel::Info, "nothing waiting to upload");
        return Vec::new();
    }
    docflow_info!(
        "batch started: {} uploads, mode {}",
        state.upload_backlog.len(),
        mode.wire_value()
    );
    advance_batch(state)
}

/// Starts the next upload of the batch. At most one upload is in flight.
fn advance_batch(state: &mut TrackerState) -> Vec<Effect> {
    while let Some(job_id) = state.upload_backlog.pop_front() {
        match dispatcher::begin_upload(&mut state.queue, job_id) {
            UploadStart::Started { path, file_name } => {
                state.uploading = Some(job_id);
                state.mark_dirty();
                return vec![Effect::Upload {
                    job_id,
                    path,
                    file_name,
                    mode: state.batch_mode,
                }];
            }
            UploadStart::Rejected => state.mark_dirty(),
            UploadStart::NotWaiting => {}
        }
    }
    if state.uploading.take().is_some() {
        docflow_info!("batch finished");
        state.mark_dirty();
    }
    Vec::new()
}

fn upload_finished(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<UploadOutcome, String>,
) -> Vec<Effect> {
    let mut effects = match dispatcher::finish_upload(&mut state.queue, job_id, result) {
        UploadFinish::Cached | UploadFinish::Failed => Vec::new(),
        UploadFinish::Queued(_) => start_polling(state, job_id),
        UploadFinish::Merged { into, was_polling } => merged_upload(state, into, was_polling),
        UploadFinish::Ignored => return Vec::new(),
    };
    state.mark_dirty();
    if state.uploading == Some(job_id) {
        effects.extend(advance_batch(state));
    }
    effects
}

fn merged_upload(state: &mut TrackerState, into: JobId, was_polling: bool) -> Vec<Effect> {
    batch::prune(&mut state.selection, &state.queue);
    let terminal = state
        .queue
        .get(into)
        .is_some_and(|record| record.state().is_terminal());
    match (terminal, was_polling) {
        (true, true) => vec![Effect::StopPolling { job_id: into }],
        (false, false) => start_polling(state, into),
        _ => Vec::new(),
    }
}

fn start_polling(state: &mut TrackerState, job_id: JobId) -> Vec<Effect> {
    match poller::start(&mut state.queue, job_id) {
        PollStart::Started(server_id) => vec![Effect::StartPolling { job_id, server_id }],
        PollStart::AlreadyRunning | PollStart::NotEligible => Vec::new(),
    }
}

fn progress_polled(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<ProgressSnapshot, String>,
) -> Vec<Effect> {
    let outcome = match result {
        Ok(snapshot) => poller::apply_snapshot(&mut state.queue, job_id, &snapshot),
        Err(message) => {
            docflow_warn!("poll for job {} failed: {}", job_id, message);
            poller::apply_failure(&mut state.queue, job_id, message)
        }
    };
    match outcome {
        PollOutcome::Continue => {
            state.mark_dirty();
            Vec::new()
        }
        PollOutcome::Finished => {
            state.mark_dirty();
            let mut effects = vec![Effect::StopPolling { job_id }];
            // Final artifact flags only show up in the listing.
            effects.extend(request_history(state));
            effects
        }
        PollOutcome::TransportFailed => {
            state.mark_dirty();
            vec![Effect::StopPolling { job_id }]
        }
        PollOutcome::Ignored => Vec::new(),
    }
}

fn request_history(state: &mut TrackerState) -> Vec<Effect> {
    if state.history_in_flight {
        state.history_refetch = true;
        return Vec::new();
    }
    state.history_in_flight = true;
    vec![Effect::FetchHistory]
}

fn history_loaded(
    state: &mut TrackerState,
    result: Result<Vec<HistoryEntry>, String>,
) -> Vec<Effect> {
    state.history_in_flight = false;
    let mut effects = Vec::new();
    match result {
        Ok(entries) => {
            let report = reconciler::merge(&mut state.queue, &entries);
            state.history_loaded = true;
            effects.extend(
                report
                    .stop_polling
                    .into_iter()
                    .map(|job_id| Effect::StopPolling { job_id }),
            );
            effects.extend(
                report
                    .start_polling
                    .into_iter()
                    .map(|(job_id, server_id)| Effect::StartPolling { job_id, server_id }),
            );
            batch::prune(&mut state.selection, &state.queue);
            if report.added > 0 || report.updated > 0 {
                state.mark_dirty();
            }
        }
        Err(message) => {
            state.notify(
                NoticeLevel::Warning,
                format!("history refresh failed: {message}"),
            );
        }
    }
    if std::mem::take(&mut state.history_refetch) {
        effects.extend(request_history(state));
    }
    effects
}

fn save_settings(state: &mut TrackerState, max_concurrent_images: u32) -> Vec<Effect> {
    if !(MIN_CONCURRENT_IMAGES..=MAX_CONCURRENT_IMAGES).contains(&max_concurrent_images) {
        state.notify(
            NoticeLevel::Warning,
            format!(
                "max concurrent images must be between {MIN_CONCURRENT_IMAGES} and {MAX_CONCURRENT_IMAGES}"
            ),
        );
        return Vec::new();
    }
    vec![Effect::SaveSettings {
        max_concurrent_images,
    }]
}

fn settings_saved(state: &mut TrackerState, result: Result<ServerInfo, String>) -> Vec<Effect> {
    match result {
        Ok(info) => {
            state.server_info = Some(info);
            state.notify(
                NoticeLevel::Info,
                format!(
                    "settings saved: max {} concurrent images",
                    info.max_concurrent_images
                ),
            );
        }
        Err(message) => {
            state.notify(
                NoticeLevel::Error,
                format!("failed to save settings: {message}"),
            );
        }
    }
    Vec::new()
}

fn download_finished(state: &mut TrackerState, what: &str, result: Result<PathBuf, String>) {
    match result {
        Ok(path) => state.notify(
            NoticeLevel::Info,
            format!("{what} saved to {}", path.display()),
        ),
        Err(message) => state.notify(
            NoticeLevel::Error,
            format!("download of {what} failed: {message}"),
        ),
    }
}

fn artifact_download(state: &mut TrackerState, job_id: JobId, kind: ArtifactKind) -> Vec<Effect> {
    let Some(record) = state.queue.get(job_id) else {
        state.notify(NoticeLevel::Warning, format!("unknown job {job_id}"));
        return Vec::new();
    };
    if !record.state().is_terminal_success() {
        let message = format!("job {job_id} is {}, nothing to download", record.state());
        state.notify(NoticeLevel::Warning, message);
        return Vec::new();
    }
    let Some(server_id) = record.server_id().cloned() else {
        state.notify(NoticeLevel::Warning, format!("job {job_id} has no server id"));
        return Vec::new();
    };
    // An empty set means the listing has not reported flags yet.
    if !record.artifacts().is_empty() && !record.artifacts().contains(&kind) {
        state.notify(
            NoticeLevel::Warning,
            format!("{kind} is not available for job {job_id}"),
        );
        return Vec::new();
    }
    vec![Effect::DownloadArtifact {
        job_id,
        server_id,
        kind,
        file_stem: record.source().stem().to_string(),
    }]
}

fn stop_clicked(state: &mut TrackerState, job_id: JobId) -> Vec<Effect> {
    let target = state
        .queue
        .get(job_id)
        .map(|record| (record.state(), record.server_id().cloned()));
    match target {
        None => {
            state.notify(NoticeLevel::Warning, format!("unknown job {job_id}"));
            Vec::new()
        }
        Some((job_state, _)) if job_state.is_terminal() => {
            state.notify(
                NoticeLevel::Info,
                format!("job {job_id} already finished as {job_state}"),
            );
            Vec::new()
        }
        Some((_, None)) => {
            state.notify(
                NoticeLevel::Warning,
                format!("job {job_id} has not reached the server yet"),
            );
            Vec::new()
        }
        Some((_, Some(server_id))) => vec![Effect::RequestStop { job_id, server_id }],
    }
}

fn stop_finished(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<StopReply, String>,
) -> Vec<Effect> {
    match batch::apply_stop(&mut state.queue, job_id, result) {
        StopOutcome::Stopped => {
            state.mark_dirty();
            vec![Effect::StopPolling { job_id }]
        }
        StopOutcome::Refused(message) => {
            state.notify(NoticeLevel::Warning, message);
            Vec::new()
        }
    }
}

fn reprocess_clicked(state: &mut TrackerState, job_id: JobId) -> Vec<Effect> {
    match state.queue.get(job_id).and_then(|record| record.server_id().cloned()) {
        Some(server_id) => vec![Effect::RequestReprocess {
            job_id,
            server_id,
            mode: ProcessMode::AllPages,
        }],
        None => {
            state.notify(
                NoticeLevel::Warning,
                format!("job {job_id} has no server id to reprocess"),
            );
            Vec::new()
        }
    }
}

fn reprocess_finished(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<(), String>,
) -> Vec<Effect> {
    match batch::apply_reprocess(&mut state.queue, job_id, result) {
        ReprocessOutcome::Restarted {
            server_id,
            start_poll,
        } => {
            state.selection.remove(&job_id);
            state.mark_dirty();
            if start_poll {
                vec![Effect::StartPolling { job_id, server_id }]
            } else {
                Vec::new()
            }
        }
        ReprocessOutcome::Rejected(message) => {
            state.notify(
                NoticeLevel::Warning,
                format!("reprocess of job {job_id} rejected: {message}"),
            );
            Vec::new()
        }
    }
}

fn detail_opened(state: &mut TrackerState, job_id: JobId) -> Vec<Effect> {
    match detail::open(&mut state.detail, &state.queue, job_id) {
        DetailOpen::Bound {
            server_id,
            previous,
        } => {
            state.mark_dirty();
            let mut effects = Vec::with_capacity(2);
            if let Some(previous) = previous {
                effects.push(Effect::UnwatchDetail { job_id: previous });
            }
            effects.push(Effect::WatchDetail { job_id, server_id });
            effects
        }
        DetailOpen::Unchanged => Vec::new(),
        DetailOpen::NoServerId => {
            state.notify(
                NoticeLevel::Info,
                format!("job {job_id} has no server progress to show yet"),
            );
            Vec::new()
        }
    }
}

fn detail_polled(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<ProgressSnapshot, String>,
) -> Vec<Effect> {
    let outcome = match result {
        Ok(snapshot) => detail::apply(&mut state.detail, &state.queue, job_id, &snapshot),
        Err(message) => detail::apply_failure(&mut state.detail, job_id, &message),
    };
    match outcome {
        DetailOutcome::Continue => {
            state.mark_dirty();
            Vec::new()
        }
        DetailOutcome::Halt => {
            state.mark_dirty();
            vec![Effect::UnwatchDetail { job_id }]
        }
        DetailOutcome::Ignored => Vec::new(),
    }
}

fn clear_finished(state: &mut TrackerState) -> Vec<Effect> {
    let removed = state.queue.clear_terminal();
    if removed.is_empty() {
        return Vec::new();
    }
    docflow_info!("cleared {} finished jobs", removed.len());
    batch::prune(&mut state.selection, &state.queue);
    let mut effects = Vec::new();
    let detail_removed = state
        .detail
        .as_ref()
        .is_some_and(|view| removed.contains(&view.job_id));
    if detail_removed {
        if let Some(job_id) = detail::close(&mut state.detail) {
            effects.push(Effect::UnwatchDetail { job_id });
        }
    }
    state.mark_dirty();
    effects
}
