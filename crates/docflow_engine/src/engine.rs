use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use docflow_logging::{docflow_debug, docflow_warn};

use crate::filename::{artifact_filename, batch_filename};
use crate::poll::{run_poll_loop, PollKind, PollRegistry, PollSettings};
use crate::{
    ApiError, ApiSettings, AtomicFileWriter, ConversionApi, EngineEvent, FailureKind, JobId,
    ReqwestApi, ServerSettings,
};

/// Produces the file name of the next batch archive.
pub type BatchNamer = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct EngineConfig {
    pub api: ApiSettings,
    pub poll: PollSettings,
    pub output_dir: PathBuf,
    pub batch_name: BatchNamer,
}

impl EngineConfig {
    pub fn default_with_output(output_dir: PathBuf) -> Self {
        Self {
            api: ApiSettings::default(),
            poll: PollSettings::default(),
            output_dir,
            batch_name: Arc::new(|| {
                let millis = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or_default();
                batch_filename(millis)
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    FetchServerInfo,
    SaveSettings(ServerSettings),
    FetchHistory,
    Upload {
        job_id: JobId,
        path: PathBuf,
        file_name: String,
        mode: String,
    },
    StartPolling { job_id: JobId, hash_id: String },
    StopPolling { job_id: JobId },
    Stop { job_id: JobId, hash_id: String },
    Reprocess {
        job_id: JobId,
        hash_id: String,
        mode: String,
    },
    DownloadBatch { hash_ids: Vec<String> },
    DownloadArtifact {
        job_id: JobId,
        hash_id: String,
        artifact: String,
        file_stem: String,
        extension: String,
    },
    WatchDetail { job_id: JobId, hash_id: String },
    UnwatchDetail { job_id: JobId },
}

enum Control {
    Run(EngineCommand),
    Shutdown,
}

struct RequestContext {
    api: Arc<dyn ConversionApi>,
    writer: AtomicFileWriter,
    batch_name: BatchNamer,
}

/// Owns the tokio runtime on a background thread. Commands go in, completion
/// events come out; the caller never blocks on IO.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Control>,
    event_rx: mpsc::Receiver<EngineEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        let api = ReqwestApi::new(config.api.clone())?;
        Self::with_api(Arc::new(api), config)
            .map_err(|err| ApiError::new(FailureKind::Io, format!("engine runtime: {err}")))
    }

    /// Builds an engine over any `ConversionApi`; tests pass an in-memory fake.
    pub fn with_api(api: Arc<dyn ConversionApi>, config: EngineConfig) -> io::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel::<Control>();
        let (event_tx, event_rx) = mpsc::channel();
        let context = Arc::new(RequestContext {
            api,
            writer: AtomicFileWriter::new(config.output_dir),
            batch_name: config.batch_name,
        });
        let poll_settings = config.poll;

        let worker = thread::spawn(move || {
            let mut registry = PollRegistry::default();
            while let Ok(Control::Run(command)) = cmd_rx.recv() {
                match command {
                    EngineCommand::StartPolling { job_id, hash_id } => {
                        spawn_loop(
                            &runtime,
                            &mut registry,
                            PollKind::Progress,
                            job_id,
                            hash_id,
                            &context,
                            &poll_settings,
                            &event_tx,
                        );
                    }
                    EngineCommand::WatchDetail { job_id, hash_id } => {
                        spawn_loop(
                            &runtime,
                            &mut registry,
                            PollKind::Detail,
                            job_id,
                            hash_id,
                            &context,
                            &poll_settings,
                            &event_tx,
                        );
                    }
                    EngineCommand::StopPolling { job_id } => {
                        registry.stop(PollKind::Progress, job_id);
                    }
                    EngineCommand::UnwatchDetail { job_id } => {
                        registry.stop(PollKind::Detail, job_id);
                    }
                    command => {
                        let context = context.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let event = handle_request(&context, command).await;
                            if let Some(event) = event {
                                let _ = event_tx.send(event);
                            }
                        });
                    }
                }
            }
            registry.stop_all();
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        Ok(Self {
            cmd_tx,
            event_rx,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, command: EngineCommand) {
        docflow_debug!("engine command {:?}", command);
        let _ = self.cmd_tx.send(Control::Run(command));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Cancels every loop and waits for the worker thread to wind down.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let _ = self.cmd_tx.send(Control::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                docflow_warn!("engine worker panicked during shutdown");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_loop(
    runtime: &tokio::runtime::Runtime,
    registry: &mut PollRegistry,
    kind: PollKind,
    job_id: JobId,
    hash_id: String,
    context: &Arc<RequestContext>,
    settings: &PollSettings,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let token = registry.start(kind, job_id);
    runtime.spawn(run_poll_loop(
        kind,
        context.api.clone(),
        job_id,
        hash_id,
        settings.clone(),
        token,
        event_tx.clone(),
    ));
}

async fn handle_request(context: &RequestContext, command: EngineCommand) -> Option<EngineEvent> {
    let api = context.api.as_ref();
    let event = match command {
        EngineCommand::FetchServerInfo => EngineEvent::ServerInfo(api.server_info().await),
        EngineCommand::SaveSettings(settings) => {
            EngineEvent::SettingsSaved(api.save_settings(settings).await)
        }
        EngineCommand::FetchHistory => EngineEvent::History(api.list_files().await),
        EngineCommand::Upload {
            job_id,
            path,
            file_name,
            mode,
        } => EngineEvent::Uploaded {
            job_id,
            result: api.upload(&path, &file_name, &mode).await,
        },
        EngineCommand::Stop { job_id, hash_id } => EngineEvent::Stopped {
            job_id,
            result: api.stop(&hash_id).await,
        },
        EngineCommand::Reprocess {
            job_id,
            hash_id,
            mode,
        } => EngineEvent::Reprocessed {
            job_id,
            result: api.reprocess(&hash_id, &mode).await,
        },
        EngineCommand::DownloadBatch { hash_ids } => {
            let result = match api.download_batch(&hash_ids).await {
                Ok(bytes) => persist(&context.writer, (context.batch_name)(), bytes).await,
                Err(err) => Err(err),
            };
            EngineEvent::BatchDownloaded(result)
        }
        EngineCommand::DownloadArtifact {
            job_id,
            hash_id,
            artifact,
            file_stem,
            extension,
        } => {
            let result = match api.download_artifact(&hash_id, &artifact).await {
                Ok(bytes) => {
                    let name = artifact_filename(&file_stem, &hash_id, &extension);
                    persist(&context.writer, name, bytes).await
                }
                Err(err) => Err(err),
            };
            EngineEvent::ArtifactDownloaded {
                job_id,
                artifact,
                result,
            }
        }
        EngineCommand::StartPolling { .. }
        | EngineCommand::StopPolling { .. }
        | EngineCommand::WatchDetail { .. }
        | EngineCommand::UnwatchDetail { .. } => return None,
    };
    Some(event)
}

async fn persist(
    writer: &AtomicFileWriter,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<PathBuf, ApiError> {
    let writer = writer.clone();
    tokio::task::spawn_blocking(move || writer.write(&file_name, &bytes))
        .await
        .map_err(|err| ApiError::new(FailureKind::Io, err.to_string()))?
        .map_err(ApiError::from)
}
