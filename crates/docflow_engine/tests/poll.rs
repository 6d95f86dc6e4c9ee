use std::collections::VecDeque;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use docflow_engine::{
    run_poll_loop, ApiError, ConversionApi, EngineCommand, EngineConfig, EngineEvent,
    EngineHandle, FailureKind, FileEntry, PollKind, PollRegistry, PollSettings,
    ProgressResponse, ServerSettings, StopResponse, UploadResponse,
};
use tokio_util::sync::CancellationToken;

/// Serves scripted progress replies; once exhausted, repeats the last one.
#[derive(Default)]
struct ScriptedApi {
    replies: Mutex<VecDeque<Result<ProgressResponse, ApiError>>>,
    calls: Mutex<usize>,
}

impl ScriptedApi {
    fn new(replies: Vec<Result<ProgressResponse, ApiError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn unsupported<T>() -> Result<T, ApiError> {
    Err(ApiError {
        kind: FailureKind::Network,
        message: "not scripted".to_string(),
    })
}

#[async_trait::async_trait]
impl ConversionApi for ScriptedApi {
    async fn server_info(&self) -> Result<ServerSettings, ApiError> {
        Ok(ServerSettings {
            max_concurrent_images: 2,
        })
    }

    async fn save_settings(&self, settings: ServerSettings) -> Result<ServerSettings, ApiError> {
        Ok(settings)
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        Ok(Vec::new())
    }

    async fn upload(&self, _: &Path, _: &str, _: &str) -> Result<UploadResponse, ApiError> {
        unsupported()
    }

    async fn progress(&self, _hash_id: &str) -> Result<ProgressResponse, ApiError> {
        *self.calls.lock().unwrap() += 1;
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or_else(unsupported)
        }
    }

    async fn stop(&self, _: &str) -> Result<StopResponse, ApiError> {
        Ok(StopResponse {
            success: true,
            message: None,
        })
    }

    async fn reprocess(&self, _: &str, _: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn download_batch(&self, _: &[String]) -> Result<Vec<u8>, ApiError> {
        Ok(b"PK".to_vec())
    }

    async fn download_artifact(&self, _: &str, _: &str) -> Result<Vec<u8>, ApiError> {
        Ok(b"docx-bytes".to_vec())
    }
}

fn running(ocr: f64) -> Result<ProgressResponse, ApiError> {
    Ok(ProgressResponse {
        ocr_progress: ocr,
        ..ProgressResponse::default()
    })
}

fn fast() -> PollSettings {
    PollSettings {
        progress_interval: Duration::from_millis(5),
        detail_interval: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn loop_ends_after_complete_snapshot() {
    let api = Arc::new(ScriptedApi::new(vec![
        running(10.0),
        running(50.0),
        Ok(ProgressResponse {
            complete: true,
            ..ProgressResponse::default()
        }),
    ]));
    let (tx, rx) = mpsc::channel();

    run_poll_loop(
        PollKind::Progress,
        api.clone(),
        7,
        "abc".to_string(),
        fast(),
        CancellationToken::new(),
        tx,
    )
    .await;

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events.last(),
        Some(EngineEvent::Progress { job_id: 7, result: Ok(p) }) if p.complete
    ));
    assert_eq!(api.calls(), 3);
}

#[tokio::test]
async fn loop_ends_after_transport_failure() {
    let api = Arc::new(ScriptedApi::new(vec![
        running(10.0),
        Err(ApiError {
            kind: FailureKind::Network,
            message: "connection refused".to_string(),
        }),
    ]));
    let (tx, rx) = mpsc::channel();

    run_poll_loop(
        PollKind::Detail,
        api,
        3,
        "abc".to_string(),
        fast(),
        CancellationToken::new(),
        tx,
    )
    .await;

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        EngineEvent::Detail { job_id: 3, result: Err(err) } if err.message == "connection refused"
    ));
}

#[tokio::test]
async fn cancelled_loop_stops_fetching() {
    let api = Arc::new(ScriptedApi::new(vec![running(1.0)]));
    let (tx, rx) = mpsc::channel();
    let token = CancellationToken::new();

    let handle = tokio::spawn(run_poll_loop(
        PollKind::Progress,
        api.clone(),
        1,
        "abc".to_string(),
        fast(),
        token.clone(),
        tx,
    ));
    tokio::time::sleep(Duration::from_millis(40)).await;
    token.cancel();
    handle.await.unwrap();

    let calls = api.calls();
    assert!(calls >= 1);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(api.calls(), calls);
    assert_eq!(rx.try_iter().count(), calls);
}

#[test]
fn registry_keeps_one_loop_per_job() {
    let mut registry = PollRegistry::default();
    let first = registry.start(PollKind::Progress, 1);
    let second = registry.start(PollKind::Progress, 1);
    let detail = registry.start(PollKind::Detail, 1);

    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert!(!detail.is_cancelled());
    assert_eq!(registry.active(PollKind::Progress), 1);

    assert!(registry.stop(PollKind::Progress, 1));
    assert!(!registry.stop(PollKind::Progress, 1));
    assert!(second.is_cancelled());

    registry.stop_all();
    assert!(detail.is_cancelled());
    assert_eq!(registry.active(PollKind::Detail), 0);
}

fn wait_for<F>(engine: &EngineHandle, mut matches: F) -> EngineEvent
where
    F: FnMut(&EngineEvent) -> bool,
{
    for _ in 0..200 {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(25)) {
            if matches(&event) {
                return event;
            }
        }
    }
    panic!("expected engine event did not arrive");
}

#[test]
fn engine_polls_until_complete_and_writes_artifacts() {
    let temp = tempfile::TempDir::new().unwrap();
    let api = Arc::new(ScriptedApi::new(vec![
        running(40.0),
        Ok(ProgressResponse {
            complete: true,
            ..ProgressResponse::default()
        }),
    ]));
    let mut config = EngineConfig::default_with_output(temp.path().to_path_buf());
    config.poll = fast();
    config.batch_name = Arc::new(|| "batch_download_1.zip".to_string());
    let engine = EngineHandle::with_api(api, config).unwrap();

    engine.submit(EngineCommand::StartPolling {
        job_id: 1,
        hash_id: "abc".to_string(),
    });
    let done = wait_for(&engine, |event| {
        matches!(event, EngineEvent::Progress { result: Ok(p), .. } if p.complete)
    });
    assert!(matches!(done, EngineEvent::Progress { job_id: 1, .. }));

    engine.submit(EngineCommand::DownloadArtifact {
        job_id: 1,
        hash_id: "abc".to_string(),
        artifact: "docx".to_string(),
        file_stem: "report".to_string(),
        extension: "docx".to_string(),
    });
    let written = wait_for(&engine, |event| {
        matches!(event, EngineEvent::ArtifactDownloaded { .. })
    });
    let EngineEvent::ArtifactDownloaded { artifact, result, .. } = written else {
        unreachable!();
    };
    assert_eq!(artifact, "docx");
    let path = result.expect("artifact written");
    assert_eq!(path, temp.path().join("report_abc.docx"));
    assert_eq!(std::fs::read(&path).unwrap(), b"docx-bytes");

    engine.submit(EngineCommand::DownloadBatch {
        hash_ids: vec!["abc".to_string()],
    });
    let batch = wait_for(&engine, |event| {
        matches!(event, EngineEvent::BatchDownloaded(_))
    });
    assert_eq!(
        batch,
        EngineEvent::BatchDownloaded(Ok(temp.path().join("batch_download_1.zip")))
    );

    engine.shutdown();
}

#[test]
fn stop_polling_silences_the_loop() {
    let temp = tempfile::TempDir::new().unwrap();
    let api = Arc::new(ScriptedApi::new(vec![running(5.0)]));
    let mut config = EngineConfig::default_with_output(temp.path().to_path_buf());
    config.poll = fast();
    let engine = EngineHandle::with_api(api.clone(), config).unwrap();

    engine.submit(EngineCommand::StartPolling {
        job_id: 9,
        hash_id: "abc".to_string(),
    });
    wait_for(&engine, |event| matches!(event, EngineEvent::Progress { .. }));
    engine.submit(EngineCommand::StopPolling { job_id: 9 });
    std::thread::sleep(Duration::from_millis(50));
    while engine.try_recv().is_some() {}

    let calls = api.calls();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(api.calls(), calls);
    assert!(engine.try_recv().is_none());
}
