//! Insertion-ordered job store, unique by identity.
//!
//! Every mutation of a record goes through this type or one of the component
//! modules borrowing it, so the uniqueness invariants hold between messages:
//! - no two records share a `(name, size)` pair when the size is known;
//! - no two records share a server id;
//! - a non-terminal record is never removed.

use thiserror::Error;

use crate::{Identity, JobId, JobOrigin, JobRecord, JobState, ServerId, SourceFile};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("already tracked as job {existing}")]
    Duplicate { existing: JobId },
    #[error("server id {server_id} already belongs to job {holder}")]
    ServerIdTaken { server_id: ServerId, holder: JobId },
    #[error("unknown job {0}")]
    UnknownJob(JobId),
}

/// Everything needed to insert a record; the queue assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub source: SourceFile,
    pub server_id: Option<ServerId>,
    pub origin: JobOrigin,
    pub state: JobState,
    pub progress: f64,
}

impl JobDraft {
    pub fn local(source: SourceFile) -> Self {
        Self {
            source,
            server_id: None,
            origin: JobOrigin::Local,
            state: JobState::Waiting,
            progress: 0.0,
        }
    }

    pub fn from_history(
        server_id: ServerId,
        source: SourceFile,
        state: JobState,
        progress: f64,
    ) -> Self {
        Self {
            source,
            server_id: Some(server_id),
            origin: JobOrigin::History,
            state,
            progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobQueue {
    records: Vec<JobRecord>,
    next_id: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.iter()
    }

    /// Inserts unless a record with the same `(name, size)` or server id exists.
    pub fn add(&mut self, draft: JobDraft) -> Result<JobId, QueueError> {
        if let Some(existing) = self.find_duplicate(&draft) {
            return Err(QueueError::Duplicate { existing });
        }
        self.next_id += 1;
        let id = JobId(self.next_id);
        self.records.push(JobRecord {
            id,
            server_id: draft.server_id,
            source: draft.source,
            origin: draft.origin,
            state: draft.state,
            progress: crate::progress::clamp_percent(draft.progress),
            result: None,
            artifacts: Default::default(),
            last_error: None,
            server_info: None,
            polling: false,
        });
        Ok(id)
    }

    /// Re-keys a record in place; its position in the queue is preserved.
    pub fn upgrade(&mut self, id: JobId, server_id: ServerId) -> Result<(), QueueError> {
        if let Some(holder) = self.find_by_server_id(&server_id) {
            if holder.id == id {
                return Ok(());
            }
            return Err(QueueError::ServerIdTaken {
                server_id,
                holder: holder.id,
            });
        }
        let record = self.get_mut(id).ok_or(QueueError::UnknownJob(id))?;
        record.server_id = Some(server_id);
        Ok(())
    }

    /// Folds the record `from` into `into`: the survivor takes over the local
    /// source and origin, and `from` leaves the queue. Used when an upload
    /// returns a server id another record already holds.
    pub(crate) fn absorb(&mut self, from: JobId, into: JobId) -> Result<(), QueueError> {
        if self.get(into).is_none() {
            return Err(QueueError::UnknownJob(into));
        }
        let position = self
            .records
            .iter()
            .position(|record| record.id == from)
            .ok_or(QueueError::UnknownJob(from))?;
        let absorbed = self.records.remove(position);
        if let Some(survivor) = self.get_mut(into) {
            survivor.source = absorbed.source;
            survivor.origin = absorbed.origin;
        }
        Ok(())
    }

    /// `Local` matches the session handle; `Server` matches the assigned hash.
    pub fn find(&self, identity: &Identity) -> Option<&JobRecord> {
        match identity {
            Identity::Local(id) => self.get(*id),
            Identity::Server(server_id) => self.find_by_server_id(server_id),
        }
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    pub fn find_by_server_id(&self, server_id: &ServerId) -> Option<&JobRecord> {
        self.records
            .iter()
            .find(|record| record.server_id.as_ref() == Some(server_id))
    }

    /// Ids of records in `state`, in queue order.
    pub fn ids_in_state(&self, state: JobState) -> Vec<JobId> {
        self.records
            .iter()
            .filter(|record| record.state == state)
            .map(|record| record.id)
            .collect()
    }

    /// Drops terminal records and returns their ids. Records still in flight stay.
    pub fn clear_terminal(&mut self) -> Vec<JobId> {
        let removed = self
            .records
            .iter()
            .filter(|record| record.state.is_terminal() && !record.polling)
            .map(|record| record.id)
            .collect();
        self.records
            .retain(|record| !record.state.is_terminal() || record.polling);
        removed
    }

    fn find_duplicate(&self, draft: &JobDraft) -> Option<JobId> {
        self.records
            .iter()
            .find(|record| {
                let same_file = draft.source.size.is_some()
                    && record.source.name == draft.source.name
                    && record.source.size == draft.source.size;
                let same_server = draft.server_id.is_some() && record.server_id == draft.server_id;
                same_file || same_server
            })
            .map(|record| record.id)
    }
}
