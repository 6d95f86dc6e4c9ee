use std::path::PathBuf;

use crate::{ArtifactKind, JobId, ProcessMode, ServerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchServerInfo,
    SaveSettings { max_concurrent_images: u32 },
    FetchHistory,
    Upload {
        job_id: JobId,
        path: PathBuf,
        file_name: String,
        mode: ProcessMode,
    },
    StartPolling { job_id: JobId, server_id: ServerId },
    StopPolling { job_id: JobId },
    RequestStop { job_id: JobId, server_id: ServerId },
    RequestReprocess {
        job_id: JobId,
        server_id: ServerId,
        mode: ProcessMode,
    },
    DownloadBatch { server_ids: Vec<ServerId> },
    DownloadArtifact {
        job_id: JobId,
        server_id: ServerId,
        kind: ArtifactKind,
        file_stem: String,
    },
    WatchDetail { job_id: JobId, server_id: ServerId },
    UnwatchDetail { job_id: JobId },
}
