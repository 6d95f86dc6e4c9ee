//! Aggregation of the three conversion stages into one percentage.
//!
//! Recognition (OCR) dominates the cost of the pipeline, so the weights are
//! fixed protocol constants rather than anything the server can tune.

pub const EXTRACT_WEIGHT: f64 = 0.10;
pub const RECOGNITION_WEIGHT: f64 = 0.80;
pub const GENERATE_WEIGHT: f64 = 0.10;

/// Progress of each pipeline stage, every value in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageProgress {
    pub extract: f64,
    pub recognition: f64,
    pub generate: f64,
}

impl StageProgress {
    pub fn new(extract: f64, recognition: f64, generate: f64) -> Self {
        Self {
            extract: clamp_percent(extract),
            recognition: clamp_percent(recognition),
            generate: clamp_percent(generate),
        }
    }

    /// Weighted aggregate owned by the per-job poller.
    pub fn aggregate(&self) -> f64 {
        self.extract * EXTRACT_WEIGHT
            + self.recognition * RECOGNITION_WEIGHT
            + self.generate * GENERATE_WEIGHT
    }

    /// Unweighted mean shown by the detail monitor. Advisory only.
    pub fn mean(&self) -> f64 {
        (self.extract + self.recognition + self.generate) / 3.0
    }

    /// All three stages report zero.
    pub fn is_zero(&self) -> bool {
        self.extract == 0.0 && self.recognition == 0.0 && self.generate == 0.0
    }
}

/// Clamps to `[0, 100]`; NaN becomes 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
