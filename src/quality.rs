//! Recording quality gate
//!
//! Screens a raw RR interval sequence before any statistic is trusted. Two
//! artifact checks are applied:
//!
//! - **Range check**: intervals outside the RR window implied by the
//!   physiological heart rate bounds (default 30-200 bpm, i.e. 300-2000 ms)
//! - **Successive difference check**: jumps larger than 300 ms between
//!   neighbouring intervals, typically missed or ectopic beats
//!
//! A single beat can trip both checks; the counts are summed as-is.
//! The gate never fails: callers receive a [`QualityReport`] and decide
//! whether to proceed.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Successive differences above this many milliseconds are flagged
pub const MAX_SUCCESSIVE_DIFF_MS: f64 = 300.0;

/// Artifact rate (%) at or above which a recording is rejected
pub const MAX_ARTIFACT_PERCENTAGE: f64 = 5.0;

/// Minimum number of intervals for a usable recording
pub const MIN_INTERVALS: usize = 60;

/// Physiological heart rate bounds used to derive the valid RR window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBounds {
    /// Maximum plausible heart rate (bpm)
    pub max_hr: f64,

    /// Minimum plausible heart rate (bpm)
    pub min_hr: f64,
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self {
            max_hr: 200.0,
            min_hr: 30.0,
        }
    }
}

impl QualityBounds {
    /// Shortest acceptable interval (ms)
    pub fn min_rri(&self) -> f64 {
        60_000.0 / self.max_hr
    }

    /// Longest acceptable interval (ms)
    pub fn max_rri(&self) -> f64 {
        60_000.0 / self.min_hr
    }
}

/// Outcome of a quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Whether the recording is usable
    pub is_valid: bool,

    /// Number of flagged artifacts (range and jump checks combined)
    pub artifact_count: usize,

    /// Artifacts as a percentage of all intervals
    pub artifact_percentage: f64,

    /// Number of intervals inspected
    pub total_intervals: usize,

    /// Human-readable findings
    pub issues: Vec<String>,
}

/// Validates RR interval sequences for plausibility and artifact rate
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    bounds: QualityBounds,
}

impl QualityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounds(bounds: QualityBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &QualityBounds {
        &self.bounds
    }

    /// Inspect a recording and report artifacts
    pub fn check(&self, rr_intervals: &[f64]) -> QualityReport {
        let mut issues = Vec::new();
        let valid_range = self.bounds.min_rri()..=self.bounds.max_rri();

        // Non-finite values fall outside any range and are counted here
        let out_of_range = rr_intervals
            .iter()
            .filter(|rr| !valid_range.contains(*rr))
            .count();
        if out_of_range > 0 {
            issues.push(format!(
                "Found {} physiologically impossible RR intervals",
                out_of_range
            ));
        }

        let extreme_diffs = rr_intervals
            .windows(2)
            .filter(|pair| (pair[1] - pair[0]).abs() > MAX_SUCCESSIVE_DIFF_MS)
            .count();
        if extreme_diffs > 0 {
            issues.push(format!(
                "Found {} extreme successive differences",
                extreme_diffs
            ));
        }

        let artifact_count = out_of_range + extreme_diffs;
        let total_intervals = rr_intervals.len();
        let artifact_percentage = if total_intervals > 0 {
            artifact_count as f64 / total_intervals as f64 * 100.0
        } else {
            0.0
        };

        let is_valid =
            artifact_percentage < MAX_ARTIFACT_PERCENTAGE && total_intervals >= MIN_INTERVALS;

        if artifact_percentage >= MAX_ARTIFACT_PERCENTAGE {
            issues.push(format!("High artifact rate: {:.1}%", artifact_percentage));
        }
        if total_intervals < MIN_INTERVALS {
            issues.push(format!(
                "Insufficient data: only {} intervals",
                total_intervals
            ));
        }

        debug!(
            total_intervals,
            artifact_count,
            artifact_percentage,
            is_valid,
            "Recording quality checked"
        );

        QualityReport {
            is_valid,
            artifact_count,
            artifact_percentage,
            total_intervals,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_series(len: usize) -> Vec<f64> {
        vec![800.0; len]
    }

    #[test]
    fn test_default_bounds_to_rr_window() {
        let bounds = QualityBounds::default();
        assert!((bounds.min_rri() - 300.0).abs() < 1e-9);
        assert!((bounds.max_rri() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_clean_recording_is_valid() {
        let report = QualityGate::new().check(&steady_series(300));

        assert!(report.is_valid);
        assert_eq!(report.artifact_count, 0);
        assert_eq!(report.artifact_percentage, 0.0);
        assert_eq!(report.total_intervals, 300);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_out_of_range_intervals_fail() {
        // 60000 ms per beat is 1 bpm, far below the 30 bpm floor
        let report = QualityGate::new().check(&vec![60_000.0; 300]);

        assert!(!report.is_valid);
        assert_eq!(report.artifact_count, 300);
        assert_eq!(report.artifact_percentage, 100.0);
        assert!(report.issues[0].contains("300 physiologically impossible"));
        assert!(report.issues.iter().any(|i| i.starts_with("High artifact rate")));
    }

    #[test]
    fn test_single_jump_stays_valid() {
        let mut rr = vec![800.0; 150];
        rr.extend(vec![1200.0; 150]);

        let report = QualityGate::new().check(&rr);

        assert_eq!(report.artifact_count, 1);
        assert!(report.artifact_percentage < MAX_ARTIFACT_PERCENTAGE);
        assert!(report.is_valid);
        assert_eq!(report.issues, vec!["Found 1 extreme successive differences"]);
    }

    #[test]
    fn test_spike_is_double_counted() {
        let mut rr = steady_series(100);
        rr[50] = 2500.0;

        let report = QualityGate::new().check(&rr);

        // One range violation plus the jump into and out of the spike
        assert_eq!(report.artifact_count, 3);
        assert!(report.is_valid);
    }

    #[test]
    fn test_short_recording_is_invalid() {
        let report = QualityGate::new().check(&steady_series(59));

        assert!(!report.is_valid);
        assert_eq!(report.artifact_count, 0);
        assert_eq!(report.issues, vec!["Insufficient data: only 59 intervals"]);
    }

    #[test]
    fn test_empty_recording() {
        let report = QualityGate::new().check(&[]);

        assert!(!report.is_valid);
        assert_eq!(report.artifact_percentage, 0.0);
        assert_eq!(report.total_intervals, 0);
    }

    #[test]
    fn test_non_finite_values_are_artifacts() {
        let mut rr = steady_series(100);
        rr[10] = f64::NAN;
        rr[20] = -5.0;

        let report = QualityGate::new().check(&rr);
        assert!(report.artifact_count >= 2);
    }

    #[test]
    fn test_artifact_rate_threshold() {
        // 5 out-of-range beats, the first has only one neighbour
        let mut rr = steady_series(100);
        for i in 0..5 {
            rr[i * 20] = 250.0;
        }

        let report = QualityGate::new().check(&rr);
        assert_eq!(report.artifact_count, 5 + 9);
        assert!((report.artifact_percentage - 14.0).abs() < 1e-9);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_custom_bounds() {
        let gate = QualityGate::with_bounds(QualityBounds {
            max_hr: 100.0,
            min_hr: 40.0,
        });

        // 500 ms is 120 bpm, above the custom ceiling
        let report = gate.check(&vec![500.0; 80]);
        assert_eq!(report.artifact_count, 80);
        assert!(!report.is_valid);
    }
}
