use std::path::PathBuf;

use crate::{
    ArtifactKind, HistoryEntry, JobId, ProcessMode, ProgressSnapshot, ServerInfo, SourceFile,
    StopReply, UploadOutcome,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Client (re)started; history must be reconciled before user input.
    Started,
    /// User picked files to convert.
    FilesSelected(Vec<SourceFile>),
    /// User started batch processing of every waiting record.
    StartBatchClicked { mode: ProcessMode },
    /// Engine finished one upload call.
    UploadFinished {
        job_id: JobId,
        result: Result<UploadOutcome, String>,
    },
    /// Engine progress poll for a job.
    ProgressPolled {
        job_id: JobId,
        result: Result<ProgressSnapshot, String>,
    },
    /// User asked for a manual history refresh.
    RefreshHistoryClicked,
    HistoryLoaded(Result<Vec<HistoryEntry>, String>),
    ServerInfoLoaded(Result<ServerInfo, String>),
    SaveSettingsClicked { max_concurrent_images: u32 },
    SettingsSaved(Result<ServerInfo, String>),
    SelectionToggled { job_id: JobId },
    SelectAll(bool),
    BatchDownloadClicked,
    BatchDownloadFinished(Result<PathBuf, String>),
    ArtifactDownloadClicked { job_id: JobId, kind: ArtifactKind },
    ArtifactDownloadFinished {
        job_id: JobId,
        kind: ArtifactKind,
        result: Result<PathBuf, String>,
    },
    StopClicked { job_id: JobId },
    StopFinished {
        job_id: JobId,
        result: Result<StopReply, String>,
    },
    ReprocessClicked { job_id: JobId },
    ReprocessFinished {
        job_id: JobId,
        result: Result<(), String>,
    },
    /// User opened the detail view of a job.
    DetailOpened { job_id: JobId },
    /// Engine detail-monitor poll.
    DetailPolled {
        job_id: JobId,
        result: Result<ProgressSnapshot, String>,
    },
    DetailClosed,
    /// User cleared finished records from the list.
    ClearFinishedClicked,
    /// Render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
