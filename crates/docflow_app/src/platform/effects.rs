use std::collections::BTreeSet;
use std::time::Duration;

use docflow_core::{
    ArtifactKind, Effect, HistoryEntry, JobId, JobResult, Msg, ProgressSnapshot, ServerId,
    ServerInfo, StageProgress, StopReply, UploadOutcome,
};
use docflow_engine::{
    ApiError, EngineCommand, EngineConfig, EngineEvent, EngineHandle, FileEntry,
    ProgressResponse, ServerSettings, UploadResponse,
};
use docflow_logging::{docflow_info, docflow_warn};

/// Turns core effects into engine commands and engine events back into core messages.
pub struct EffectRunner {
    engine: EngineHandle,
    /// One-shot requests submitted whose completion event has not arrived yet.
    pending: usize,
}

impl EffectRunner {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        Ok(Self::with_engine(EngineHandle::new(config)?))
    }

    pub fn with_engine(engine: EngineHandle) -> Self {
        Self { engine, pending: 0 }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            let command = to_command(effect);
            docflow_info!("effect {}", describe(&command));
            if is_request(&command) {
                self.pending += 1;
            }
            self.engine.submit(command);
        }
    }

    /// Waits up to `timeout` for the next engine event.
    pub fn next_msg(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        if !matches!(
            event,
            EngineEvent::Progress { .. } | EngineEvent::Detail { .. }
        ) {
            self.pending = self.pending.saturating_sub(1);
        }
        Some(to_msg(event))
    }

    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}

fn is_request(command: &EngineCommand) -> bool {
    !matches!(
        command,
        EngineCommand::StartPolling { .. }
            | EngineCommand::StopPolling { .. }
            | EngineCommand::WatchDetail { .. }
            | EngineCommand::UnwatchDetail { .. }
    )
}

fn describe(command: &EngineCommand) -> String {
    match command {
        EngineCommand::Upload {
            job_id,
            file_name,
            mode,
            ..
        } => format!("Upload job_id={job_id} file={file_name} mode={mode}"),
        EngineCommand::StartPolling { job_id, hash_id } => {
            format!("StartPolling job_id={job_id} hash={hash_id}")
        }
        EngineCommand::DownloadBatch { hash_ids } => {
            format!("DownloadBatch count={}", hash_ids.len())
        }
        other => format!("{other:?}"),
    }
}

fn to_command(effect: Effect) -> EngineCommand {
    match effect {
        Effect::FetchServerInfo => EngineCommand::FetchServerInfo,
        Effect::SaveSettings {
            max_concurrent_images,
        } => EngineCommand::SaveSettings(ServerSettings {
            max_concurrent_images,
        }),
        Effect::FetchHistory => EngineCommand::FetchHistory,
        Effect::Upload {
            job_id,
            path,
            file_name,
            mode,
        } => EngineCommand::Upload {
            job_id: job_id.0,
            path,
            file_name,
            mode: mode.wire_value().to_string(),
        },
        Effect::StartPolling { job_id, server_id } => EngineCommand::StartPolling {
            job_id: job_id.0,
            hash_id: server_id.as_str().to_string(),
        },
        Effect::StopPolling { job_id } => EngineCommand::StopPolling { job_id: job_id.0 },
        Effect::RequestStop { job_id, server_id } => EngineCommand::Stop {
            job_id: job_id.0,
            hash_id: server_id.as_str().to_string(),
        },
        Effect::RequestReprocess {
            job_id,
            server_id,
            mode,
        } => EngineCommand::Reprocess {
            job_id: job_id.0,
            hash_id: server_id.as_str().to_string(),
            mode: mode.wire_value().to_string(),
        },
        Effect::DownloadBatch { server_ids } => EngineCommand::DownloadBatch {
            hash_ids: server_ids
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
        },
        Effect::DownloadArtifact {
            job_id,
            server_id,
            kind,
            file_stem,
        } => EngineCommand::DownloadArtifact {
            job_id: job_id.0,
            hash_id: server_id.as_str().to_string(),
            artifact: kind.path_segment().to_string(),
            file_stem,
            extension: kind.extension().to_string(),
        },
        Effect::WatchDetail { job_id, server_id } => EngineCommand::WatchDetail {
            job_id: job_id.0,
            hash_id: server_id.as_str().to_string(),
        },
        Effect::UnwatchDetail { job_id } => EngineCommand::UnwatchDetail { job_id: job_id.0 },
    }
}

fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ServerInfo(result) => Msg::ServerInfoLoaded(
            result
                .map(server_info)
                .map_err(|err| err.to_string()),
        ),
        EngineEvent::SettingsSaved(result) => {
            Msg::SettingsSaved(result.map(server_info).map_err(|err| err.to_string()))
        }
        EngineEvent::History(result) => Msg::HistoryLoaded(
            result
                .map(|files| files.into_iter().map(history_entry).collect())
                .map_err(|err| err.to_string()),
        ),
        EngineEvent::Uploaded { job_id, result } => Msg::UploadFinished {
            job_id: JobId(job_id),
            result: result
                .map(upload_outcome)
                .map_err(|err| err.to_string()),
        },
        EngineEvent::Progress { job_id, result } => Msg::ProgressPolled {
            job_id: JobId(job_id),
            result: result.map(snapshot).map_err(|err| err.to_string()),
        },
        EngineEvent::Detail { job_id, result } => Msg::DetailPolled {
            job_id: JobId(job_id),
            result: result.map(snapshot).map_err(|err| err.to_string()),
        },
        EngineEvent::Stopped { job_id, result } => Msg::StopFinished {
            job_id: JobId(job_id),
            result: result
                .map(|reply| StopReply {
                    success: reply.success,
                    message: reply.message,
                })
                .map_err(|err| err.to_string()),
        },
        EngineEvent::Reprocessed { job_id, result } => Msg::ReprocessFinished {
            job_id: JobId(job_id),
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::BatchDownloaded(result) => {
            Msg::BatchDownloadFinished(result.map_err(|err| err.to_string()))
        }
        EngineEvent::ArtifactDownloaded {
            job_id,
            artifact,
            result,
        } => match ArtifactKind::from_path_segment(&artifact) {
            Some(kind) => Msg::ArtifactDownloadFinished {
                job_id: JobId(job_id),
                kind,
                result: result.map_err(|err| err.to_string()),
            },
            None => {
                docflow_warn!("download finished for unknown artifact {}", artifact);
                Msg::NoOp
            }
        },
    }
}

fn server_info(settings: ServerSettings) -> ServerInfo {
    ServerInfo {
        max_concurrent_images: settings.max_concurrent_images,
    }
}

fn upload_outcome(response: UploadResponse) -> UploadOutcome {
    // The api layer already rejects responses without a hash.
    let hash_id = response.hash_id.unwrap_or_default();
    let processing_time = response.processing_time.map(|t| t.to_string());
    UploadOutcome {
        server_id: ServerId::new(hash_id),
        already_exists: response.already_exists,
        result: response.filename.map(|display_name| JobResult {
            display_name,
            total_pages: response.total_pages,
            processing_time,
        }),
    }
}

pub(crate) fn snapshot(response: ProgressResponse) -> ProgressSnapshot {
    let result = response.filename.map(|display_name| JobResult {
        display_name,
        total_pages: response.total_pages,
        processing_time: response.processing_time.map(|t| t.to_string()),
    });
    ProgressSnapshot {
        stages: StageProgress::new(
            response.extract_progress,
            response.ocr_progress,
            response.generate_progress,
        ),
        extract_status: response.extract_status,
        recognition_status: response.ocr_status,
        generate_status: response.generate_status,
        status: response.status,
        complete: response.complete,
        error: response.error,
        log: response.log,
        result,
    }
}

pub(crate) fn history_entry(file: FileEntry) -> HistoryEntry {
    let flags = [
        (file.has_zip, ArtifactKind::Archive),
        (file.has_docx, ArtifactKind::Document),
        (file.has_md, ArtifactKind::Text),
        (file.has_json, ArtifactKind::Json),
        (file.has_images_zip, ArtifactKind::ImagesArchive),
    ];
    let artifacts: BTreeSet<ArtifactKind> = flags
        .into_iter()
        .filter_map(|(present, kind)| present.then_some(kind))
        .collect();
    HistoryEntry {
        server_id: ServerId::new(file.hash_id),
        name: file.name,
        pages: file.pages,
        status: file.status,
        is_processing: file.is_processing,
        processing_progress: file.processing_progress,
        artifacts,
    }
}
