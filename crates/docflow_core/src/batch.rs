//! Multi-job selection plus the stop and reprocess actions.

use std::collections::BTreeSet;

use docflow_logging::docflow_info;

use crate::job::STOPPED_BY_USER;
use crate::{JobId, JobQueue, JobState, ServerId, StopReply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StopOutcome {
    Stopped,
    Refused(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReprocessOutcome {
    /// Record reset; `true` when a new poll loop must be started.
    Restarted { server_id: ServerId, start_poll: bool },
    Rejected(String),
}

pub(crate) fn is_selectable(queue: &JobQueue, id: JobId) -> bool {
    queue
        .get(id)
        .is_some_and(|record| record.state.is_terminal_success() && record.server_id.is_some())
}

/// Flips selection for one record. Returns the new selected flag.
pub(crate) fn toggle(selection: &mut BTreeSet<JobId>, queue: &JobQueue, id: JobId) -> bool {
    if selection.remove(&id) {
        return false;
    }
    if is_selectable(queue, id) {
        selection.insert(id);
        true
    } else {
        false
    }
}

pub(crate) fn select_all(selection: &mut BTreeSet<JobId>, queue: &JobQueue, selected: bool) {
    selection.clear();
    if selected {
        selection.extend(
            queue
                .iter()
                .map(|record| record.id())
                .filter(|id| is_selectable(queue, *id)),
        );
    }
}

/// Drops ids that are gone or no longer eligible.
pub(crate) fn prune(selection: &mut BTreeSet<JobId>, queue: &JobQueue) {
    selection.retain(|id| is_selectable(queue, *id));
}

/// Server ids of the selection, in queue order.
pub(crate) fn selected_server_ids(selection: &BTreeSet<JobId>, queue: &JobQueue) -> Vec<ServerId> {
    queue
        .iter()
        .filter(|record| selection.contains(&record.id()))
        .filter_map(|record| record.server_id().cloned())
        .collect()
}

pub(crate) fn apply_stop(
    queue: &mut JobQueue,
    id: JobId,
    result: Result<StopReply, String>,
) -> StopOutcome {
    let reply = match result {
        Ok(reply) => reply,
        Err(message) => return StopOutcome::Refused(format!("stop request failed: {message}")),
    };
    if !reply.success {
        let message = reply
            .message
            .unwrap_or_else(|| "server refused to stop the job".to_string());
        return StopOutcome::Refused(message);
    }
    let Some(record) = queue.get_mut(id) else {
        return StopOutcome::Refused(format!("unknown job {id}"));
    };
    if record.state.is_terminal() {
        return StopOutcome::Refused(format!("job {id} already finished as {}", record.state));
    }
    docflow_info!("job {} stopped by user", id);
    record.fail(STOPPED_BY_USER);
    StopOutcome::Stopped
}

pub(crate) fn apply_reprocess(
    queue: &mut JobQueue,
    id: JobId,
    result: Result<(), String>,
) -> ReprocessOutcome {
    if let Err(message) = result {
        return ReprocessOutcome::Rejected(message);
    }
    let Some(record) = queue.get_mut(id) else {
        return ReprocessOutcome::Rejected(format!("unknown job {id}"));
    };
    let Some(server_id) = record.server_id.clone() else {
        return ReprocessOutcome::Rejected(format!("job {id} has no server id"));
    };
    docflow_info!("job {} reprocessing as {}", id, server_id);
    record.set_state(JobState::Queued);
    record.pin_progress(0.0);
    record.last_error = None;
    record.result = None;
    let start_poll = !record.polling;
    record.polling = true;
    ReprocessOutcome::Restarted {
        server_id,
        start_poll,
    }
}
