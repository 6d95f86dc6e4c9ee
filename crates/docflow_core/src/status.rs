//! Best-effort classification of the server's free-text status fields.
//!
//! Kept as explicit rule tables so each heuristic can be tested on its own.

use crate::JobState;

/// Coarse `status` labels that may override the local state while a job is
/// in flight. Terminal transitions only ever come from the `complete` flag.
const COARSE_LABELS: &[(&str, JobState)] = &[
    ("waiting", JobState::Queued),
    ("pending", JobState::Queued),
    ("queued", JobState::Queued),
    ("processing", JobState::Processing),
    ("running", JobState::Processing),
];

/// Markers in the recognition-stage status meaning a specific page is being worked.
/// The marker must be followed by a page number, e.g. `Page 3/12`.
const PAGE_MARKERS: &[&str] = &["page"];

pub fn classify_coarse(label: &str) -> Option<JobState> {
    let normalized = label.trim().to_ascii_lowercase();
    COARSE_LABELS
        .iter()
        .find(|(pattern, _)| *pattern == normalized)
        .map(|(_, state)| *state)
}

pub fn recognition_marks_page(status: &str) -> bool {
    let lowered = status.to_ascii_lowercase();
    PAGE_MARKERS.iter().any(|marker| {
        lowered.match_indices(marker).any(|(idx, _)| {
            lowered[idx + marker.len()..]
                .trim_start()
                .starts_with(|c: char| c.is_ascii_digit())
        })
    })
}

/// State implied by one progress snapshot, if any. A page marker in the
/// recognition status wins over the coarse label.
pub fn classify(coarse: Option<&str>, recognition_status: Option<&str>) -> Option<JobState> {
    if recognition_status.is_some_and(recognition_marks_page) {
        return Some(JobState::Processing);
    }
    coarse.and_then(classify_coarse)
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_coarse, recognition_marks_page};
    use crate::JobState;

    #[test]
    fn coarse_labels_are_case_normalized() {
        assert_eq!(classify_coarse("Queued"), Some(JobState::Queued));
        assert_eq!(classify_coarse("  PROCESSING "), Some(JobState::Processing));
        assert_eq!(classify_coarse("complete"), None);
        assert_eq!(classify_coarse("mystery"), None);
    }

    #[test]
    fn page_marker_requires_a_number() {
        assert!(recognition_marks_page("Page 3/12"));
        assert!(recognition_marks_page("working on page 7"));
        assert!(!recognition_marks_page("Starting OCR..."));
        assert!(!recognition_marks_page("Waiting..."));
        assert!(!recognition_marks_page("Paged layout"));
    }

    #[test]
    fn page_marker_overrides_coarse_label() {
        assert_eq!(
            classify(Some("queued"), Some("Page 1/4")),
            Some(JobState::Processing)
        );
        assert_eq!(classify(Some("queued"), Some("Waiting...")), Some(JobState::Queued));
        assert_eq!(classify(None, None), None);
    }
}
