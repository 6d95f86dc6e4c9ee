//! Cancellable polling loops: the per-job progress poller and the detail monitor.
//!
//! Each loop sleeps, fetches once, reports, and repeats. Ticks within one loop
//! are strictly sequential; loops of different jobs are independent.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use docflow_logging::{docflow_debug, docflow_info};
use tokio_util::sync::CancellationToken;

use crate::{ApiError, ConversionApi, EngineEvent, JobId, ProgressResponse};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub progress_interval: Duration,
    pub detail_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(1000),
            detail_interval: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    Progress,
    Detail,
}

impl PollKind {
    fn interval(self, settings: &PollSettings) -> Duration {
        match self {
            PollKind::Progress => settings.progress_interval,
            PollKind::Detail => settings.detail_interval,
        }
    }

    fn event(self, job_id: JobId, result: Result<ProgressResponse, ApiError>) -> EngineEvent {
        match self {
            PollKind::Progress => EngineEvent::Progress { job_id, result },
            PollKind::Detail => EngineEvent::Detail { job_id, result },
        }
    }
}

/// One cancellation token per running loop.
#[derive(Debug, Default)]
pub struct PollRegistry {
    tokens: HashMap<(PollKind, JobId), CancellationToken>,
}

impl PollRegistry {
    /// Registers a fresh loop. A loop already bound to the same key is cancelled,
    /// so at most one runs per job and kind.
    pub fn start(&mut self, kind: PollKind, job_id: JobId) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.insert((kind, job_id), token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn stop(&mut self, kind: PollKind, job_id: JobId) -> bool {
        match self.tokens.remove(&(kind, job_id)) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
    }

    /// Loops not yet cancelled. Loops that ended on their own still count
    /// until stopped.
    pub fn active(&self, kind: PollKind) -> usize {
        self.tokens
            .iter()
            .filter(|((k, _), token)| *k == kind && !token.is_cancelled())
            .count()
    }
}

/// Runs until cancelled, until the server reports `complete`, or until a
/// fetch fails. Every fetch result is forwarded as one event.
pub async fn run_poll_loop(
    kind: PollKind,
    api: Arc<dyn ConversionApi>,
    job_id: JobId,
    hash_id: String,
    settings: PollSettings,
    token: CancellationToken,
    events: mpsc::Sender<EngineEvent>,
) {
    let interval = kind.interval(&settings);
    docflow_info!("{:?} loop for job {} ({}) started", kind, job_id, hash_id);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = api.progress(&hash_id) => result,
        };
        let finished = match &result {
            Ok(progress) => progress.complete,
            Err(err) => {
                docflow_debug!("{:?} fetch for job {} failed: {}", kind, job_id, err);
                true
            }
        };
        if events.send(kind.event(job_id, result)).is_err() || finished {
            break;
        }
    }
    docflow_info!("{:?} loop for job {} ({}) ended", kind, job_id, hash_id);
}
