//! Upload dispatcher: moves a `Waiting` record through its single upload.

use std::path::PathBuf;

use docflow_logging::{docflow_info, docflow_warn};

use crate::queue::QueueError;
use crate::{JobId, JobQueue, JobState, ServerId, UploadOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UploadStart {
    Started { path: PathBuf, file_name: String },
    /// The record had no readable source; it is now in `Error`.
    Rejected,
    NotWaiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UploadFinish {
    /// Cache hit: server already had identical content.
    Cached,
    Queued(ServerId),
    /// The returned id already belonged to `into`; the upload record was folded
    /// into it. `was_polling` tells whether a loop was bound before the merge.
    Merged { into: JobId, was_polling: bool },
    Failed,
    Ignored,
}

pub(crate) fn begin_upload(queue: &mut JobQueue, id: JobId) -> UploadStart {
    let Some(record) = queue.get_mut(id) else {
        return UploadStart::NotWaiting;
    };
    if record.state != JobState::Waiting {
        return UploadStart::NotWaiting;
    }
    let Some(path) = record.source.path.clone() else {
        record.fail("no local file to upload");
        return UploadStart::Rejected;
    };
    record.set_state(JobState::Uploading);
    UploadStart::Started {
        path,
        file_name: record.source.name.clone(),
    }
}

pub(crate) fn finish_upload(
    queue: &mut JobQueue,
    id: JobId,
    result: Result<UploadOutcome, String>,
) -> UploadFinish {
    match queue.get(id) {
        Some(record) if record.state == JobState::Uploading => {}
        _ => return UploadFinish::Ignored,
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(message) => {
            docflow_warn!("upload of job {} failed: {}", id, message);
            if let Some(record) = queue.get_mut(id) {
                record.fail(message);
            }
            return UploadFinish::Failed;
        }
    };

    match queue.upgrade(id, outcome.server_id.clone()) {
        Ok(()) => {}
        Err(QueueError::ServerIdTaken { holder, .. }) => {
            return merge_into_holder(queue, id, holder, outcome);
        }
        Err(err) => {
            docflow_warn!("upload of job {} could not be keyed: {}", id, err);
            if let Some(record) = queue.get_mut(id) {
                record.fail(err.to_string());
            }
            return UploadFinish::Failed;
        }
    }

    let Some(record) = queue.get_mut(id) else {
        return UploadFinish::Ignored;
    };
    if outcome.already_exists {
        docflow_info!("job {} served from cache as {}", id, outcome.server_id);
        record.complete(outcome.result);
        UploadFinish::Cached
    } else {
        docflow_info!("job {} queued on server as {}", id, outcome.server_id);
        record.set_state(JobState::Queued);
        UploadFinish::Queued(outcome.server_id)
    }
}

/// The server returned a hash that another record (usually one reconciled from
/// history) already holds. That record stays the single owner of the hash.
fn merge_into_holder(
    queue: &mut JobQueue,
    id: JobId,
    holder: JobId,
    outcome: UploadOutcome,
) -> UploadFinish {
    if let Err(err) = queue.absorb(id, holder) {
        docflow_warn!("merging job {} into job {} failed: {}", id, holder, err);
        return UploadFinish::Ignored;
    }
    let Some(record) = queue.get_mut(holder) else {
        return UploadFinish::Ignored;
    };
    let was_polling = record.polling;
    if outcome.already_exists {
        docflow_info!("job {} served from cache as job {}", id, holder);
        record.complete(outcome.result);
    } else if record.state.is_terminal() {
        docflow_info!("job {} restarts job {} on the server", id, holder);
        record.set_state(JobState::Queued);
        record.pin_progress(0.0);
        record.result = None;
    } else {
        docflow_info!("job {} joins job {} still in flight", id, holder);
    }
    UploadFinish::Merged {
        into: holder,
        was_polling,
    }
}
