//! Plain-text rendering of the tracker view model.

use std::collections::HashMap;

use docflow_core::{
    DetailViewModel, JobId, JobRowView, JobState, Notice, NoticeLevel, TrackerViewModel,
};

/// Prints rows only when their visible content changed since the last render.
#[derive(Debug, Default)]
pub struct Renderer {
    rows: HashMap<JobId, String>,
    last_log_line: Option<String>,
    detail_job: Option<JobId>,
}

impl Renderer {
    pub fn render(&mut self, view: &TrackerViewModel) -> Vec<String> {
        let mut out = Vec::new();
        for row in &view.jobs {
            let line = format_row(row);
            if self.rows.get(&row.job_id) != Some(&line) {
                out.push(line.clone());
                self.rows.insert(row.job_id, line);
            }
        }
        self.rows
            .retain(|id, _| view.jobs.iter().any(|row| row.job_id == *id));

        match &view.detail {
            Some(detail) => out.extend(self.render_detail(detail)),
            None => {
                self.detail_job = None;
                self.last_log_line = None;
            }
        }
        out
    }

    fn render_detail(&mut self, detail: &DetailViewModel) -> Vec<String> {
        if self.detail_job != Some(detail.job_id) {
            self.detail_job = Some(detail.job_id);
            self.last_log_line = None;
        }
        let mut out = vec![format!(
            "  detail {}: extract {:.0}% | ocr {:.0}% | generate {:.0}% | overall {:.1}%{}",
            detail.server_id,
            detail.stages.extract,
            detail.stages.recognition,
            detail.stages.generate,
            detail.stage_mean,
            stage_text(detail),
        )];
        // The log is a capped window, so resume after the last line printed.
        let start = self
            .last_log_line
            .as_ref()
            .and_then(|last| detail.log.iter().rposition(|line| line == last))
            .map_or(0, |index| index + 1);
        out.extend(detail.log[start..].iter().map(|line| format!("  | {line}")));
        if let Some(last) = detail.log.last() {
            self.last_log_line = Some(last.clone());
        }
        out
    }
}

fn stage_text(detail: &DetailViewModel) -> String {
    [
        &detail.extract_status,
        &detail.recognition_status,
        &detail.generate_status,
    ]
    .into_iter()
    .flatten()
    .map(|status| format!(" [{status}]"))
    .collect()
}

pub fn format_row(row: &JobRowView) -> String {
    let id = row.server_id.as_deref().unwrap_or("-");
    let mut line = format!(
        "#{:<3} {:<11} {:>5.1}%  {}  ({})",
        row.job_id.0,
        row.state.label(),
        row.progress,
        row.name,
        id
    );
    match row.state {
        JobState::Error => {
            if let Some(err) = &row.last_error {
                line.push_str(&format!("  error: {err}"));
            }
        }
        JobState::Complete | JobState::Partial => {
            if let Some(result) = &row.result {
                if let Some(pages) = result.total_pages {
                    line.push_str(&format!("  {pages} pages"));
                }
                if let Some(time) = &result.processing_time {
                    line.push_str(&format!("  in {time}"));
                }
            }
            if !row.artifacts.is_empty() {
                let kinds: Vec<String> = row.artifacts.iter().map(|k| k.to_string()).collect();
                line.push_str(&format!("  [{}]", kinds.join(", ")));
            }
        }
        _ => {}
    }
    line
}

pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    format!("{tag}: {}", notice.message)
}
