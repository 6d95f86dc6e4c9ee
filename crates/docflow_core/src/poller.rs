//! Per-job progress polling state machine.
//!
//! The IO loop lives in the engine; this module decides what each tick means
//! for the record and when the loop must be torn down.

use docflow_logging::{docflow_debug, docflow_info};

use crate::status::classify;
use crate::{JobId, JobQueue, JobState, ProgressSnapshot, ServerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStart {
    Started(ServerId),
    AlreadyRunning,
    NotEligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Continue,
    /// `complete=true` arrived, with or without an error.
    Finished,
    /// The fetch itself failed.
    TransportFailed,
    Ignored,
}

/// Binds a poll loop to the record. Idempotent.
pub(crate) fn start(queue: &mut JobQueue, id: JobId) -> PollStart {
    let Some(record) = queue.get_mut(id) else {
        return PollStart::NotEligible;
    };
    if record.polling {
        return PollStart::AlreadyRunning;
    }
    let Some(server_id) = record.server_id.clone() else {
        return PollStart::NotEligible;
    };
    if record.state.is_terminal() {
        return PollStart::NotEligible;
    }
    record.polling = true;
    docflow_info!("job {} polling started for {}", id, server_id);
    PollStart::Started(server_id)
}

pub(crate) fn apply_snapshot(
    queue: &mut JobQueue,
    id: JobId,
    snapshot: &ProgressSnapshot,
) -> PollOutcome {
    let Some(record) = queue.get_mut(id) else {
        return PollOutcome::Ignored;
    };
    // Terminal transitions clear `polling`, so late ticks for finished jobs stop here.
    if !record.polling {
        return PollOutcome::Ignored;
    }

    if snapshot.complete {
        match &snapshot.error {
            Some(error) => record.fail(error.clone()),
            None => record.complete(snapshot.result.clone()),
        }
        return PollOutcome::Finished;
    }

    let aggregate = snapshot.stages.aggregate();
    record.advance_progress(aggregate);
    // Any stage movement without a label still means the server picked it up.
    let next = classify(
        snapshot.status.as_deref(),
        snapshot.recognition_status.as_deref(),
    )
    .or_else(|| (aggregate > 0.0).then_some(JobState::Processing));
    if let Some(next) = next {
        record.set_state(next);
    }
    docflow_debug!(
        "job {} progress {:.1}% ({})",
        id,
        record.progress,
        record.state
    );
    PollOutcome::Continue
}

pub(crate) fn apply_failure(queue: &mut JobQueue, id: JobId, message: String) -> PollOutcome {
    match queue.get_mut(id) {
        Some(record) if record.polling => {
            record.fail(message);
            PollOutcome::TransportFailed
        }
        _ => PollOutcome::Ignored,
    }
}
