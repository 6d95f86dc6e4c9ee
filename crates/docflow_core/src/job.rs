use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use docflow_logging::docflow_debug;

use crate::progress::clamp_percent;

/// Sentinel written to `last_error` when the user stops a job.
pub const STOPPED_BY_USER: &str = "Stopped by user";

/// Local, session-scoped handle. Stable for the lifetime of a record, even
/// after the server assigns its content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content hash assigned by the conversion server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical key of a record: the server hash once known, the local handle before.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Local(JobId),
    Server(ServerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Waiting,
    Uploading,
    Queued,
    Processing,
    Complete,
    Partial,
    Incomplete,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Partial | JobState::Incomplete | JobState::Error
        )
    }

    /// Terminal states whose artifacts can be fetched and batch-selected.
    pub fn is_terminal_success(self) -> bool {
        matches!(self, JobState::Complete | JobState::Partial)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Uploading => "uploading",
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Partial => "partial",
            JobState::Incomplete => "incomplete",
            JobState::Error => "error",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    #[default]
    AllPages,
    CurrentPageOnly,
}

impl ProcessMode {
    pub fn wire_value(self) -> &'static str {
        match self {
            ProcessMode::AllPages => "all",
            ProcessMode::CurrentPageOnly => "single",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Archive,
    Document,
    Text,
    Json,
    ImagesArchive,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Archive,
        ArtifactKind::Document,
        ArtifactKind::Text,
        ArtifactKind::Json,
        ArtifactKind::ImagesArchive,
    ];

    /// Segment used in `/download/{hash}/{segment}`.
    pub fn path_segment(self) -> &'static str {
        match self {
            ArtifactKind::Archive => "zip",
            ArtifactKind::Document => "docx",
            ArtifactKind::Text => "txt",
            ArtifactKind::Json => "json",
            ArtifactKind::ImagesArchive => "images_zip",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.path_segment().eq_ignore_ascii_case(segment.trim()))
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Archive | ArtifactKind::ImagesArchive => "zip",
            ArtifactKind::Document => "docx",
            ArtifactKind::Text => "txt",
            ArtifactKind::Json => "json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Summary shown once a job reaches `Complete` or `Partial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub display_name: String,
    pub total_pages: Option<u32>,
    pub processing_time: Option<String>,
}

/// Client-known metadata of the document behind a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    /// `None` for records synthesized from server history.
    pub size: Option<u64>,
    pub path: Option<PathBuf>,
}

impl SourceFile {
    pub fn local(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            size: Some(size),
            path: Some(path),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// Selected by the user in this session.
    Local,
    /// Discovered in the server's history listing.
    History,
}

/// Raw file info from the server's history listing, kept for artifact display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFileInfo {
    pub name: String,
    pub pages: Option<u32>,
    pub status: Option<String>,
    pub artifacts: BTreeSet<ArtifactKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub(crate) id: JobId,
    pub(crate) server_id: Option<ServerId>,
    pub(crate) source: SourceFile,
    pub(crate) origin: JobOrigin,
    pub(crate) state: JobState,
    pub(crate) progress: f64,
    pub(crate) result: Option<JobResult>,
    pub(crate) artifacts: BTreeSet<ArtifactKind>,
    pub(crate) last_error: Option<String>,
    pub(crate) server_info: Option<ServerFileInfo>,
    /// Whether a progress poll loop is currently bound to this record.
    pub(crate) polling: bool,
}

impl JobRecord {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn identity(&self) -> Identity {
        match &self.server_id {
            Some(server_id) => Identity::Server(server_id.clone()),
            None => Identity::Local(self.id),
        }
    }

    pub fn server_id(&self) -> Option<&ServerId> {
        self.server_id.as_ref()
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn origin(&self) -> JobOrigin {
        self.origin
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn artifacts(&self) -> &BTreeSet<ArtifactKind> {
        &self.artifacts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn server_info(&self) -> Option<&ServerFileInfo> {
        self.server_info.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub(crate) fn set_state(&mut self, next: JobState) {
        if self.state != next {
            docflow_debug!("job {} state {} -> {}", self.id, self.state, next);
            self.state = next;
        }
        if next != JobState::Error {
            self.last_error = None;
        }
    }

    /// Raises progress; never lowers it.
    pub(crate) fn advance_progress(&mut self, value: f64) {
        let value = clamp_percent(value);
        if value > self.progress {
            self.progress = value;
        }
    }

    /// Sets progress to a fixed value regardless of direction. Only used on
    /// terminal transitions and reprocess resets.
    pub(crate) fn pin_progress(&mut self, value: f64) {
        self.progress = clamp_percent(value);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.set_state(JobState::Error);
        self.last_error = Some(message.into());
        self.polling = false;
    }

    pub(crate) fn complete(&mut self, result: Option<JobResult>) {
        self.set_state(JobState::Complete);
        self.pin_progress(100.0);
        self.result = Some(result.unwrap_or_else(|| self.fallback_result()));
        self.polling = false;
    }

    pub(crate) fn fallback_result(&self) -> JobResult {
        JobResult {
            display_name: self.source.name.clone(),
            total_pages: self.server_info.as_ref().and_then(|info| info.pages),
            processing_time: None,
        }
    }
}
