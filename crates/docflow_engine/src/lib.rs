//! Docflow engine: HTTP client for the conversion server and effect execution.
mod api;
mod engine;
mod filename;
mod persist;
mod poll;
mod types;

pub use api::{ApiSettings, ConversionApi, ReqwestApi};
pub use engine::{BatchNamer, EngineCommand, EngineConfig, EngineHandle};
pub use filename::{artifact_filename, batch_filename};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poll::{run_poll_loop, PollKind, PollRegistry, PollSettings};
pub use types::{
    ApiError, EngineEvent, FailureKind, FileEntry, FileListResponse, JobId, ProcessingTime,
    ProgressResponse, ServerSettings, StopResponse, UploadResponse,
};
