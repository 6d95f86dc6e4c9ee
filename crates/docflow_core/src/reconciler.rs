//! Merges the server's authoritative history into the local queue.
//!
//! Merging the same listing twice is a no-op: every write compares first and
//! polls are only requested for records that have none bound.

use docflow_logging::{docflow_debug, docflow_info};

use crate::{
    HistoryEntry, HistoryStatus, JobDraft, JobId, JobQueue, JobState, ServerFileInfo, ServerId,
    SourceFile,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct MergeReport {
    pub start_polling: Vec<(JobId, ServerId)>,
    pub stop_polling: Vec<JobId>,
    pub added: usize,
    pub updated: usize,
}

pub(crate) fn merge(queue: &mut JobQueue, entries: &[HistoryEntry]) -> MergeReport {
    let mut report = MergeReport::default();
    for entry in entries {
        match queue.find_by_server_id(&entry.server_id).map(|r| r.id()) {
            Some(id) => merge_existing(queue, id, entry, &mut report),
            None => synthesize(queue, entry, &mut report),
        }
    }
    if report.added > 0 || report.updated > 0 {
        docflow_info!(
            "history merged: {} added, {} updated",
            report.added,
            report.updated
        );
    }
    report
}

fn file_info(entry: &HistoryEntry) -> ServerFileInfo {
    ServerFileInfo {
        name: entry.name.clone(),
        pages: entry.pages,
        status: entry.status.clone(),
        artifacts: entry.artifacts.clone(),
    }
}

fn merge_existing(queue: &mut JobQueue, id: JobId, entry: &HistoryEntry, report: &mut MergeReport) {
    let Some(record) = queue.get_mut(id) else {
        return;
    };
    let before = record.clone();

    record.server_info = Some(file_info(entry));
    record.artifacts = entry.artifacts.clone();

    match entry.classify() {
        HistoryStatus::InProgress { state, progress } => {
            // Only reprocess may move a record back out of a terminal state.
            if record.state.is_terminal() {
                docflow_debug!(
                    "job {} is {} locally, ignoring in-progress history row",
                    id,
                    record.state
                );
            } else {
                record.set_state(state);
                record.advance_progress(progress);
                if !record.polling {
                    record.polling = true;
                    if let Some(server_id) = record.server_id.clone() {
                        report.start_polling.push((id, server_id));
                    }
                }
            }
        }
        HistoryStatus::Finished { state, progress } => {
            // A local failure message is more specific than the listing.
            if record.state != JobState::Error {
                if record.polling {
                    record.polling = false;
                    report.stop_polling.push(id);
                }
                record.set_state(state);
                record.pin_progress(progress);
                if state.is_terminal_success() && record.result.is_none() {
                    record.result = Some(entry.result());
                }
            }
        }
    }

    if *record != before {
        report.updated += 1;
    }
}

fn synthesize(queue: &mut JobQueue, entry: &HistoryEntry, report: &mut MergeReport) {
    let (state, progress) = match entry.classify() {
        HistoryStatus::InProgress { state, progress } => (state, progress),
        HistoryStatus::Finished { state, progress } => (state, progress),
    };
    let source = SourceFile {
        name: format!("{}.pdf", entry.name),
        size: None,
        path: None,
    };
    let draft = JobDraft::from_history(entry.server_id.clone(), source, state, progress);
    let Ok(id) = queue.add(draft) else {
        return;
    };
    report.added += 1;

    let Some(record) = queue.get_mut(id) else {
        return;
    };
    record.server_info = Some(file_info(entry));
    record.artifacts = entry.artifacts.clone();
    if state.is_terminal_success() {
        record.result = Some(entry.result());
    }
    if !state.is_terminal() {
        record.polling = true;
        report.start_polling.push((id, entry.server_id.clone()));
    }
}
