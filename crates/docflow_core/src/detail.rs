//! Detail monitor: a finer-grained view onto one job at a time.
//!
//! It never writes the job record. The record's progress stays owned by the
//! per-job poller; this view only mirrors stage values, status text and log.

use docflow_logging::docflow_info;

use crate::{JobId, JobQueue, ProgressSnapshot, ServerId, StageProgress};

/// Most recent log lines kept for display.
pub const DETAIL_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub job_id: JobId,
    pub server_id: ServerId,
    pub stages: StageProgress,
    pub extract_status: Option<String>,
    pub recognition_status: Option<String>,
    pub generate_status: Option<String>,
    pub log: Vec<String>,
    pub watching: bool,
}

impl DetailView {
    fn new(job_id: JobId, server_id: ServerId) -> Self {
        Self {
            job_id,
            server_id,
            stages: StageProgress::default(),
            extract_status: None,
            recognition_status: None,
            generate_status: None,
            log: Vec::new(),
            watching: true,
        }
    }

    /// Unweighted mean of the three stages; advisory display value.
    pub fn stage_mean(&self) -> f64 {
        self.stages.mean()
    }

    fn push_log(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.log.last().is_some_and(|last| last == line) {
            return;
        }
        self.log.push(line.to_string());
        if self.log.len() > DETAIL_LOG_CAPACITY {
            let excess = self.log.len() - DETAIL_LOG_CAPACITY;
            self.log.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DetailOpen {
    /// New binding. `previous` is the watch that must be torn down first.
    Bound {
        server_id: ServerId,
        previous: Option<JobId>,
    },
    Unchanged,
    NoServerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DetailOutcome {
    Continue,
    Halt,
    Ignored,
}

pub(crate) fn open(current: &mut Option<DetailView>, queue: &JobQueue, id: JobId) -> DetailOpen {
    if let Some(view) = current.as_ref() {
        if view.job_id == id && view.watching {
            return DetailOpen::Unchanged;
        }
    }
    let Some(server_id) = queue.get(id).and_then(|record| record.server_id().cloned()) else {
        return DetailOpen::NoServerId;
    };
    let previous = current
        .take()
        .filter(|view| view.watching)
        .map(|view| view.job_id);
    *current = Some(DetailView::new(id, server_id.clone()));
    DetailOpen::Bound {
        server_id,
        previous,
    }
}

/// Clears the binding. Returns the id whose watch must be torn down.
pub(crate) fn close(current: &mut Option<DetailView>) -> Option<JobId> {
    current
        .take()
        .filter(|view| view.watching)
        .map(|view| view.job_id)
}

pub(crate) fn apply(
    current: &mut Option<DetailView>,
    queue: &JobQueue,
    id: JobId,
    snapshot: &ProgressSnapshot,
) -> DetailOutcome {
    let Some(view) = current.as_mut() else {
        return DetailOutcome::Ignored;
    };
    if view.job_id != id || !view.watching {
        return DetailOutcome::Ignored;
    }

    let terminal = queue
        .get(id)
        .is_some_and(|record| record.state().is_terminal());
    if terminal && snapshot.is_reset() {
        // Server lost its in-memory state (restart); keep what we know.
        docflow_info!("detail for job {} got a reset snapshot, halting", id);
        view.watching = false;
        return DetailOutcome::Halt;
    }

    view.stages = snapshot.stages;
    view.extract_status = snapshot.extract_status.clone();
    view.recognition_status = snapshot.recognition_status.clone();
    view.generate_status = snapshot.generate_status.clone();
    if let Some(line) = snapshot.log.as_deref() {
        view.push_log(line);
    }

    if snapshot.complete {
        view.watching = false;
        return DetailOutcome::Halt;
    }
    DetailOutcome::Continue
}

pub(crate) fn apply_failure(
    current: &mut Option<DetailView>,
    id: JobId,
    message: &str,
) -> DetailOutcome {
    match current.as_mut() {
        Some(view) if view.job_id == id && view.watching => {
            view.watching = false;
            view.push_log(&format!("detail polling failed: {message}"));
            DetailOutcome::Halt
        }
        _ => DetailOutcome::Ignored,
    }
}
