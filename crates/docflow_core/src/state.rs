use std::collections::{BTreeSet, VecDeque};

use crate::detail::DetailView;
use crate::view_model::{DetailViewModel, JobRowView, SelectionStats, TrackerViewModel};
use crate::{JobId, JobQueue, JobState, ProcessMode, ServerInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One-shot user notification, drained by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerState {
    pub(crate) queue: JobQueue,
    pub(crate) selection: BTreeSet<JobId>,
    pub(crate) detail: Option<DetailView>,
    /// Waiting records still to be uploaded by the running batch.
    pub(crate) upload_backlog: VecDeque<JobId>,
    pub(crate) uploading: Option<JobId>,
    pub(crate) batch_mode: ProcessMode,
    pub(crate) server_info: Option<ServerInfo>,
    pub(crate) history_loaded: bool,
    pub(crate) history_in_flight: bool,
    /// Another refresh was requested while one was in flight.
    pub(crate) history_refetch: bool,
    pub(crate) last_selection: Option<SelectionStats>,
    pub(crate) notices: Vec<Notice>,
    dirty: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info
    }

    /// True once the first history merge has landed.
    pub fn history_loaded(&self) -> bool {
        self.history_loaded
    }

    pub fn history_pending(&self) -> bool {
        self.history_in_flight
    }

    pub fn batch_active(&self) -> bool {
        self.uploading.is_some()
    }

    /// Nothing left that would produce further engine events on its own.
    pub fn is_idle(&self) -> bool {
        !self.batch_active()
            && !self.history_in_flight
            && self
                .queue
                .iter()
                .all(|record| !record.is_polling() && record.state() != JobState::Uploading)
    }

    pub fn view(&self) -> TrackerViewModel {
        let jobs = self
            .queue
            .iter()
            .map(|record| JobRowView {
                job_id: record.id(),
                server_id: record.server_id().map(|id| id.as_str().to_string()),
                name: record.source().name.clone(),
                state: record.state(),
                progress: record.progress(),
                selectable: record.state().is_terminal_success() && record.server_id().is_some(),
                selected: self.selection.contains(&record.id()),
                polling: record.is_polling(),
                last_error: record.last_error().map(ToOwned::to_owned),
                result: record.result().cloned(),
                artifacts: record.artifacts().iter().copied().collect(),
            })
            .collect::<Vec<_>>();

        TrackerViewModel {
            job_count: jobs.len(),
            jobs,
            selected_count: self.selection.len(),
            detail: self.detail.as_ref().map(|view| DetailViewModel {
                job_id: view.job_id,
                server_id: view.server_id.as_str().to_string(),
                stages: view.stages,
                stage_mean: view.stage_mean(),
                extract_status: view.extract_status.clone(),
                recognition_status: view.recognition_status.clone(),
                generate_status: view.generate_status.clone(),
                log: view.log.clone(),
                watching: view.watching,
            }),
            server_info: self.server_info,
            batch_active: self.batch_active(),
            last_selection: self.last_selection.clone(),
            dirty: self.dirty,
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
        self.dirty = true;
    }
}
