//! Docflow core: pure job-tracking state machine for remote document conversion.
//!
//! Every transition goes through [`update`], which returns the effects the
//! engine must run. Nothing in this crate performs IO.
mod batch;
mod detail;
mod dispatcher;
mod effect;
mod job;
mod msg;
mod poller;
mod progress;
mod queue;
mod reconciler;
mod snapshot;
mod state;
mod status;
mod update;
mod view_model;

pub use detail::{DetailView, DETAIL_LOG_CAPACITY};
pub use effect::Effect;
pub use job::{
    ArtifactKind, Identity, JobId, JobOrigin, JobRecord, JobResult, JobState, ProcessMode,
    ServerFileInfo, ServerId, SourceFile, STOPPED_BY_USER,
};
pub use msg::Msg;
pub use progress::{
    clamp_percent, StageProgress, EXTRACT_WEIGHT, GENERATE_WEIGHT, RECOGNITION_WEIGHT,
};
pub use queue::{JobDraft, JobQueue, QueueError};
pub use snapshot::{
    HistoryEntry, HistoryStatus, ProgressSnapshot, ServerInfo, StopReply, UploadOutcome,
    INCOMPLETE_PROGRESS, PARTIAL_PROGRESS,
};
pub use state::{Notice, NoticeLevel, TrackerState};
pub use status::{classify, classify_coarse, recognition_marks_page};
pub use update::{update, MAX_CONCURRENT_IMAGES, MIN_CONCURRENT_IMAGES};
pub use view_model::{DetailViewModel, JobRowView, SelectionStats, TrackerViewModel};
