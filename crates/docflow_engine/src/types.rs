use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// Response of `POST /upload_and_process`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub hash_id: Option<String>,
    #[serde(default)]
    pub already_exists: bool,
    pub filename: Option<String>,
    pub total_pages: Option<u32>,
    pub processing_time: Option<ProcessingTime>,
    pub error: Option<String>,
}

/// The server reports processing time either as seconds or preformatted text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProcessingTime {
    Seconds(f64),
    Text(String),
}

impl fmt::Display for ProcessingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingTime::Seconds(secs) => write!(f, "{secs:.1}s"),
            ProcessingTime::Text(text) => f.write_str(text),
        }
    }
}

/// Response of `GET /progress/{hash_id}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ProgressResponse {
    pub extract_progress: f64,
    pub extract_status: Option<String>,
    pub ocr_progress: f64,
    pub ocr_status: Option<String>,
    pub generate_progress: f64,
    pub generate_status: Option<String>,
    pub status: Option<String>,
    pub complete: bool,
    pub error: Option<String>,
    pub log: Option<String>,
    pub filename: Option<String>,
    pub total_pages: Option<u32>,
    pub processing_time: Option<ProcessingTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// One row of `GET /list_files`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub hash_id: String,
    pub pages: Option<u32>,
    pub status: Option<String>,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub processing_progress: f64,
    #[serde(default)]
    pub has_zip: bool,
    #[serde(default)]
    pub has_docx: bool,
    #[serde(default)]
    pub has_json: bool,
    #[serde(default)]
    pub has_md: bool,
    #[serde(default)]
    pub has_images_zip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub max_concurrent_images: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StopResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AckResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReprocessRequest<'a> {
    pub hash_id: &'a str,
    pub process_mode: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub hash_ids: &'a [String],
}

/// Completion events sent back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ServerInfo(Result<ServerSettings, ApiError>),
    SettingsSaved(Result<ServerSettings, ApiError>),
    History(Result<Vec<FileEntry>, ApiError>),
    Uploaded {
        job_id: JobId,
        result: Result<UploadResponse, ApiError>,
    },
    Progress {
        job_id: JobId,
        result: Result<ProgressResponse, ApiError>,
    },
    Detail {
        job_id: JobId,
        result: Result<ProgressResponse, ApiError>,
    },
    Stopped {
        job_id: JobId,
        result: Result<StopResponse, ApiError>,
    },
    Reprocessed {
        job_id: JobId,
        result: Result<(), ApiError>,
    },
    BatchDownloaded(Result<PathBuf, ApiError>),
    ArtifactDownloaded {
        job_id: JobId,
        artifact: String,
        result: Result<PathBuf, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// The server answered but reported an `error` in the payload.
    Application,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Application => write!(f, "server error"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
