use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use docflow_core::{
    update, ArtifactKind, JobId, Msg, ProcessMode, ServerId, SourceFile, TrackerState,
};
use docflow_logging::{docflow_debug, docflow_info};

use super::effects::EffectRunner;
use super::render::{format_notice, format_row, Renderer};

/// How long one wait for an engine event blocks before the loop re-checks its condition.
const EVENT_WAIT: Duration = Duration::from_millis(75);

/// One client session: the tracker state, its effect runner and the renderer.
pub struct Session {
    state: TrackerState,
    runner: EffectRunner,
    renderer: Renderer,
}

impl Session {
    pub fn new(runner: EffectRunner) -> Self {
        Self {
            state: TrackerState::new(),
            runner,
            renderer: Renderer::default(),
        }
    }

    pub fn dispatch(&mut self, msg: Msg) {
        docflow_debug!("dispatch {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);

        if self.state.consume_dirty() {
            let view = self.state.view();
            for line in self.renderer.render(&view) {
                println!("{line}");
            }
        }
        for notice in self.state.take_notices() {
            println!("{}", format_notice(&notice));
        }
    }

    /// Feeds engine events into the state until `done` holds.
    pub fn run_until(&mut self, done: impl Fn(&TrackerState, usize) -> bool) {
        while !done(&self.state, self.runner.pending()) {
            match self.runner.next_msg(EVENT_WAIT) {
                Some(msg) => self.dispatch(msg),
                None => self.dispatch(Msg::Tick),
            }
        }
    }

    /// Loads server settings and reconciles history; every command starts here.
    pub fn bootstrap(&mut self) {
        self.dispatch(Msg::Started);
        self.run_until(|state, pending| !state.history_pending() && pending == 0);
    }

    /// Waits for every one-shot request to report back.
    pub fn settle(&mut self) {
        self.run_until(|_, pending| pending == 0);
    }

    pub fn print_info(&self) {
        match self.state.server_info() {
            Some(info) => println!("max concurrent images: {}", info.max_concurrent_images),
            None => println!("server settings unavailable"),
        }
    }

    pub fn print_history(&self) {
        let view = self.state.view();
        if view.jobs.is_empty() {
            println!("no jobs on the server");
        }
        for row in &view.jobs {
            println!("{}", format_row(row));
        }
    }

    pub fn save_settings(&mut self, max_concurrent_images: u32) {
        self.dispatch(Msg::SaveSettingsClicked {
            max_concurrent_images,
        });
        self.settle();
    }

    pub fn submit(
        &mut self,
        files: &[PathBuf],
        mode: ProcessMode,
        wait: bool,
    ) -> anyhow::Result<()> {
        let mut sources = Vec::with_capacity(files.len());
        for path in files {
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            if !metadata.is_file() {
                bail!("{} is not a file", path.display());
            }
            sources.push(SourceFile::local(path.clone(), metadata.len()));
        }
        docflow_info!("submitting {} file(s) in {:?} mode", sources.len(), mode);

        self.dispatch(Msg::FilesSelected(sources));
        self.dispatch(Msg::StartBatchClicked { mode });
        if wait {
            self.watch();
        } else {
            self.run_until(|state, pending| !state.batch_active() && pending == 0);
        }
        Ok(())
    }

    /// Follows every in-flight job until it reaches a terminal state.
    pub fn watch(&mut self) {
        self.run_until(|state, pending| state.is_idle() && pending == 0);
    }

    pub fn detail(&mut self, hash_id: &str) -> anyhow::Result<()> {
        let job_id = self.job_for(hash_id)?;
        self.dispatch(Msg::DetailOpened { job_id });
        self.run_until(|state, _| !state.detail().is_some_and(|detail| detail.watching));
        Ok(())
    }

    pub fn stop(&mut self, hash_id: &str) -> anyhow::Result<()> {
        let job_id = self.job_for(hash_id)?;
        self.dispatch(Msg::StopClicked { job_id });
        self.settle();
        Ok(())
    }

    pub fn reprocess(&mut self, hash_id: &str, wait: bool) -> anyhow::Result<()> {
        let job_id = self.job_for(hash_id)?;
        self.dispatch(Msg::ReprocessClicked { job_id });
        if wait {
            self.watch();
        } else {
            self.settle();
        }
        Ok(())
    }

    pub fn download(&mut self, hash_id: &str, kind: ArtifactKind) -> anyhow::Result<()> {
        let job_id = self.job_for(hash_id)?;
        self.dispatch(Msg::ArtifactDownloadClicked { job_id, kind });
        self.settle();
        Ok(())
    }

    pub fn download_batch(&mut self, hash_ids: &[String]) -> anyhow::Result<()> {
        if self.select_for_batch(hash_ids)? == 0 {
            bail!("none of the given jobs has finished output to download");
        }
        self.dispatch(Msg::BatchDownloadClicked);
        self.settle();
        Ok(())
    }

    /// Replaces the selection with the given jobs; returns how many were eligible.
    fn select_for_batch(&mut self, hash_ids: &[String]) -> anyhow::Result<usize> {
        let mut job_ids = BTreeSet::new();
        for hash_id in hash_ids {
            job_ids.insert(self.job_for(hash_id)?);
        }
        self.dispatch(Msg::SelectAll(false));
        for job_id in job_ids {
            self.dispatch(Msg::SelectionToggled { job_id });
        }
        Ok(self.state.view().selected_count)
    }

    fn job_for(&self, hash_id: &str) -> anyhow::Result<JobId> {
        match self
            .state
            .queue()
            .find_by_server_id(&ServerId::new(hash_id))
        {
            Some(record) => Ok(record.id()),
            None => bail!("no job with id {hash_id} on the server"),
        }
    }

    pub fn shutdown(self) {
        self.runner.shutdown();
    }
}
