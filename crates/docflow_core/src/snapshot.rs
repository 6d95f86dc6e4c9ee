use std::collections::BTreeSet;

use crate::{ArtifactKind, JobResult, JobState, ServerId, StageProgress};

/// One status fetch for a job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub stages: StageProgress,
    pub extract_status: Option<String>,
    pub recognition_status: Option<String>,
    pub generate_status: Option<String>,
    pub status: Option<String>,
    pub complete: bool,
    pub error: Option<String>,
    pub log: Option<String>,
    pub result: Option<JobResult>,
}

impl ProgressSnapshot {
    /// What a server returns for a hash it no longer holds in memory.
    pub fn is_reset(&self) -> bool {
        !self.complete && self.stages.is_zero()
    }
}

/// Result of a successful upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub server_id: ServerId,
    /// Server recognized identical content and skipped reprocessing.
    pub already_exists: bool,
    /// Only filled on a cache hit; the record falls back to its file name otherwise.
    pub result: Option<JobResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReply {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    pub max_concurrent_images: u32,
}

/// One row of the server's authoritative job list.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub server_id: ServerId,
    pub name: String,
    pub pages: Option<u32>,
    pub status: Option<String>,
    pub is_processing: bool,
    pub processing_progress: f64,
    pub artifacts: BTreeSet<ArtifactKind>,
}

/// How a history row maps onto local state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryStatus {
    InProgress { state: JobState, progress: f64 },
    Finished { state: JobState, progress: f64 },
}

pub const PARTIAL_PROGRESS: f64 = 75.0;
pub const INCOMPLETE_PROGRESS: f64 = 25.0;

impl HistoryEntry {
    pub fn classify(&self) -> HistoryStatus {
        let label = self
            .status
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase());
        let progress = crate::progress::clamp_percent(self.processing_progress);
        match label.as_deref() {
            _ if self.is_processing => HistoryStatus::InProgress {
                state: if label.as_deref() == Some("queued") {
                    JobState::Queued
                } else {
                    JobState::Processing
                },
                progress,
            },
            Some("processing") => HistoryStatus::InProgress {
                state: JobState::Processing,
                progress,
            },
            Some("queued") => HistoryStatus::InProgress {
                state: JobState::Queued,
                progress,
            },
            // Older servers only list finished jobs and send no status at all.
            None | Some("complete") | Some("completed") => HistoryStatus::Finished {
                state: JobState::Complete,
                progress: 100.0,
            },
            Some("partial") => HistoryStatus::Finished {
                state: JobState::Partial,
                progress: PARTIAL_PROGRESS,
            },
            Some(_) => HistoryStatus::Finished {
                state: JobState::Incomplete,
                progress: INCOMPLETE_PROGRESS,
            },
        }
    }

    pub fn result(&self) -> JobResult {
        JobResult {
            display_name: self.name.clone(),
            total_pages: self.pages,
            processing_time: None,
        }
    }
}
