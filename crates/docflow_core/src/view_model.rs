use crate::{ArtifactKind, JobId, JobResult, JobState, ServerInfo, StageProgress};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionStats {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerViewModel {
    pub job_count: usize,
    pub jobs: Vec<JobRowView>,
    pub selected_count: usize,
    pub detail: Option<DetailViewModel>,
    pub server_info: Option<ServerInfo>,
    pub batch_active: bool,
    pub last_selection: Option<SelectionStats>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub server_id: Option<String>,
    pub name: String,
    pub state: JobState,
    pub progress: f64,
    pub selectable: bool,
    pub selected: bool,
    pub polling: bool,
    pub last_error: Option<String>,
    pub result: Option<JobResult>,
    pub artifacts: Vec<ArtifactKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailViewModel {
    pub job_id: JobId,
    pub server_id: String,
    pub stages: StageProgress,
    pub stage_mean: f64,
    pub extract_status: Option<String>,
    pub recognition_status: Option<String>,
    pub generate_status: Option<String>,
    pub log: Vec<String>,
    pub watching: bool,
}
