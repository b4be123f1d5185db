//! Rolling personal baseline and z-score normalization
//!
//! A baseline is the reference distribution of a user's own recent readings,
//! 28 days by default. New readings are expressed as z-scores against it:
//!
//! - **HRV**: computed on ln(RMSSD), which is closer to normally distributed
//!   than raw RMSSD. Positive z means higher HRV than usual, i.e. better
//!   recovery.
//! - **Heart rate**: computed on raw bpm. Positive z means an elevated heart
//!   rate, i.e. worse.
//!
//! Z-scores are mapped onto six fixed interpretation buckets. Independently
//! of any baseline, absolute values can be compared against published
//! population references for the condition (sleep RMSSD ~51 ms and HR ~71 bpm
//! in patients versus ~67 ms and ~65 bpm in healthy controls).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::{DatabaseError, HrvStore};
use crate::models::{Baseline, HrvReading};

/// Baseline calculation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BaselineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Baseline lacks required data: {0}")]
    MissingBaselineData(String),
}

/// Baseline window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Rolling window length in days (default: 28)
    pub window_days: i64,

    /// Minimum readings with RMSSD required inside the window (default: 7)
    pub min_readings: usize,

    /// Short-term trend window in days (default: 7)
    pub trend_days: i64,

    /// Minimum readings for a short-term trend (default: 3)
    pub trend_min_readings: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 28,
            min_readings: 7,
            trend_days: 7,
            trend_min_readings: 3,
        }
    }
}

/// Reference distribution computed over a trailing window of readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// Window start (inclusive)
    pub start_date: DateTime<Utc>,

    /// Window end (inclusive)
    pub end_date: DateTime<Utc>,

    /// Window length in days
    pub days_count: i64,

    /// Readings that fell inside the window
    pub readings_count: usize,

    /// Mean of ln(RMSSD)
    pub mean_ln_rmssd: f64,

    /// Sample standard deviation of ln(RMSSD); 0 for a single value
    pub sd_ln_rmssd: f64,

    /// Mean RMSSD (ms)
    pub mean_rmssd: f64,

    /// Mean heart rate (bpm)
    pub mean_hr: Option<f64>,

    /// Heart rate standard deviation, present with two or more samples
    pub sd_hr: Option<f64>,

    pub mean_total_power: Option<f64>,
    pub mean_hf_power: Option<f64>,
    pub mean_lf_power: Option<f64>,
}

/// Traffic-light color attached to an interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusColor::Green => write!(f, "green"),
            StatusColor::Yellow => write!(f, "yellow"),
            StatusColor::Orange => write!(f, "orange"),
            StatusColor::Red => write!(f, "red"),
        }
    }
}

/// HRV status relative to the personal baseline, best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HrvStatus {
    /// z >= 0.5
    Excellent,
    /// 0 <= z < 0.5
    Good,
    /// -0.5 <= z < 0
    Fair,
    /// -1.0 <= z < -0.5
    Low,
    /// -1.5 <= z < -1.0
    Warning,
    /// z < -1.5
    Critical,
}

impl HrvStatus {
    /// Bucket a z-score; thresholds are fixed policy
    pub fn from_z_score(z_score: f64) -> Self {
        if z_score >= 0.5 {
            HrvStatus::Excellent
        } else if z_score >= 0.0 {
            HrvStatus::Good
        } else if z_score >= -0.5 {
            HrvStatus::Fair
        } else if z_score >= -1.0 {
            HrvStatus::Low
        } else if z_score >= -1.5 {
            HrvStatus::Warning
        } else {
            HrvStatus::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HrvStatus::Excellent => "excellent",
            HrvStatus::Good => "good",
            HrvStatus::Fair => "fair",
            HrvStatus::Low => "low",
            HrvStatus::Warning => "warning",
            HrvStatus::Critical => "critical",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HrvStatus::Excellent => "Well above baseline - excellent recovery",
            HrvStatus::Good => "Above baseline - good recovery",
            HrvStatus::Fair => "Slightly below baseline - monitor closely",
            HrvStatus::Low => "Below baseline - consider reducing activity",
            HrvStatus::Warning => "Significantly below baseline - rest recommended",
            HrvStatus::Critical => "Critically low - prioritize rest and recovery",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            HrvStatus::Excellent | HrvStatus::Good => StatusColor::Green,
            HrvStatus::Fair => StatusColor::Yellow,
            HrvStatus::Low => StatusColor::Orange,
            HrvStatus::Warning | HrvStatus::Critical => StatusColor::Red,
        }
    }
}

impl fmt::Display for HrvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Interpretation of an HRV z-score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvInterpretation {
    pub z_score: f64,
    pub status: HrvStatus,
    pub interpretation: String,
    pub color: StatusColor,
}

/// Absolute-value flags against literature population references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationFlag {
    /// RMSSD below 30 ms
    RmssdCritical,
    /// RMSSD below 50 ms
    RmssdLow,
    /// Heart rate above 75 bpm
    HeartRateElevatedHigh,
    /// Heart rate above 70 bpm
    HeartRateElevated,
}

impl PopulationFlag {
    pub fn label(&self) -> &'static str {
        match self {
            PopulationFlag::RmssdCritical => "critical",
            PopulationFlag::RmssdLow => "low",
            PopulationFlag::HeartRateElevatedHigh => "elevated-high",
            PopulationFlag::HeartRateElevated => "elevated",
        }
    }

    pub fn warning(&self) -> &'static str {
        match self {
            PopulationFlag::RmssdCritical => {
                "RMSSD critically low (<30ms) - similar to severe CFS cases"
            }
            PopulationFlag::RmssdLow => "RMSSD low (<50ms) - within CFS patient range",
            PopulationFlag::HeartRateElevatedHigh => {
                "Heart rate elevated (>75 bpm) - above CFS patient mean"
            }
            PopulationFlag::HeartRateElevated => {
                "Heart rate elevated (>70 bpm) - within CFS patient range"
            }
        }
    }
}

/// Advisory comparison against population references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationCheck {
    pub rmssd: f64,
    pub mean_hr: f64,
    pub flags: Vec<PopulationFlag>,
    pub warnings: Vec<String>,
}

impl PopulationCheck {
    pub fn has_concerns(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Metric tracked by the short-term trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Rmssd,
    MeanHr,
    TotalPower,
}

impl TrendMetric {
    fn value(&self, reading: &HrvReading) -> Option<f64> {
        match self {
            TrendMetric::Rmssd => reading.rmssd,
            TrendMetric::MeanHr => reading.mean_hr,
            TrendMetric::TotalPower => reading.total_power,
        }
    }
}

impl std::str::FromStr for TrendMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rmssd" => Ok(TrendMetric::Rmssd),
            "hr" | "mean_hr" => Ok(TrendMetric::MeanHr),
            "total_power" | "power" => Ok(TrendMetric::TotalPower),
            _ => Err(format!("Invalid trend metric: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Short-term moving summary of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub metric: TrendMetric,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Increasing when the latest value exceeds the earliest
    pub direction: TrendDirection,
    pub readings_count: usize,
}

/// Builds personal baselines and normalizes readings against them
#[derive(Debug, Clone, Default)]
pub struct BaselineTracker {
    config: BaselineConfig,
}

impl BaselineTracker {
    /// Create tracker with the default 28-day window
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BaselineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Compute a baseline over `[now - window_days, now]`
    ///
    /// Returns `None` when fewer than `min_readings` readings in the window
    /// carry an RMSSD value, or when none of them is positive.
    pub fn compute_baseline(
        &self,
        history: &[HrvReading],
        now: DateTime<Utc>,
    ) -> Option<BaselineSnapshot> {
        let start_date = now - Duration::days(self.config.window_days);
        let window: Vec<&HrvReading> = history
            .iter()
            .filter(|r| r.recorded_at >= start_date && r.recorded_at <= now)
            .collect();

        let rmssd_values: Vec<f64> = window.iter().filter_map(|r| r.rmssd).collect();
        if rmssd_values.len() < self.config.min_readings {
            warn!(
                readings = window.len(),
                with_rmssd = rmssd_values.len(),
                required = self.config.min_readings,
                "Insufficient data for baseline"
            );
            return None;
        }

        let ln_rmssd: Vec<f64> = rmssd_values
            .iter()
            .filter(|v| **v > 0.0)
            .map(|v| v.ln())
            .collect();
        if ln_rmssd.is_empty() {
            warn!("No positive RMSSD values in baseline window");
            return None;
        }

        let hr_values: Vec<f64> = window.iter().filter_map(|r| r.mean_hr).collect();

        Some(BaselineSnapshot {
            start_date,
            end_date: now,
            days_count: self.config.window_days,
            readings_count: window.len(),
            mean_ln_rmssd: ln_rmssd.iter().mean(),
            sd_ln_rmssd: sample_std_dev(&ln_rmssd),
            mean_rmssd: rmssd_values.iter().mean(),
            mean_hr: optional_mean(&hr_values),
            sd_hr: (hr_values.len() >= 2).then(|| hr_values.iter().std_dev()),
            mean_total_power: optional_mean(
                &window.iter().filter_map(|r| r.total_power).collect::<Vec<_>>(),
            ),
            mean_hf_power: optional_mean(
                &window.iter().filter_map(|r| r.hf_power).collect::<Vec<_>>(),
            ),
            mean_lf_power: optional_mean(
                &window.iter().filter_map(|r| r.lf_power).collect::<Vec<_>>(),
            ),
        })
    }

    /// Persist a snapshot as the user's single active baseline
    ///
    /// Deactivation of the previous baseline and insertion of the new one
    /// happen in one store transaction.
    pub fn activate<S: HrvStore>(
        &self,
        store: &mut S,
        user_id: &str,
        snapshot: BaselineSnapshot,
        calculated_at: DateTime<Utc>,
    ) -> Result<Baseline, DatabaseError> {
        let mut baseline = Baseline::new(user_id, snapshot, calculated_at);
        store.activate_baseline(&baseline)?;
        baseline.is_active = true;

        info!(
            user_id,
            baseline_id = %baseline.id,
            readings = baseline.snapshot.readings_count,
            "Activated new baseline"
        );

        Ok(baseline)
    }

    /// (value - mean) / sd, or 0 when sd is 0
    pub fn z_score(value: f64, mean: f64, sd: f64) -> f64 {
        if sd == 0.0 {
            return 0.0;
        }

        (value - mean) / sd
    }

    /// HRV z-score on the ln(RMSSD) scale; positive means better recovery
    pub fn hrv_z_score(rmssd: f64, baseline: &BaselineSnapshot) -> Result<f64, BaselineError> {
        if !(rmssd > 0.0) {
            return Err(BaselineError::InvalidInput(format!(
                "RMSSD must be positive, got {}",
                rmssd
            )));
        }

        Ok(Self::z_score(
            rmssd.ln(),
            baseline.mean_ln_rmssd,
            baseline.sd_ln_rmssd,
        ))
    }

    /// Heart rate z-score; positive means elevated heart rate
    pub fn hr_z_score(heart_rate: f64, baseline: &BaselineSnapshot) -> Result<f64, BaselineError> {
        match (baseline.mean_hr, baseline.sd_hr) {
            (Some(mean), Some(sd)) => Ok(Self::z_score(heart_rate, mean, sd)),
            _ => Err(BaselineError::MissingBaselineData(
                "baseline lacks heart rate statistics".to_string(),
            )),
        }
    }

    /// Map an HRV z-score onto its interpretation bucket
    pub fn interpret(z_score: f64) -> HrvInterpretation {
        let status = HrvStatus::from_z_score(z_score);

        HrvInterpretation {
            z_score,
            status,
            interpretation: status.description().to_string(),
            color: status.color(),
        }
    }

    /// Compare absolute RMSSD and heart rate against population references
    pub fn check_population_reference(rmssd: f64, mean_hr: f64) -> PopulationCheck {
        let mut flags = Vec::new();

        if rmssd < 30.0 {
            flags.push(PopulationFlag::RmssdCritical);
        } else if rmssd < 50.0 {
            flags.push(PopulationFlag::RmssdLow);
        }

        if mean_hr > 75.0 {
            flags.push(PopulationFlag::HeartRateElevatedHigh);
        } else if mean_hr > 70.0 {
            flags.push(PopulationFlag::HeartRateElevated);
        }

        PopulationCheck {
            rmssd,
            mean_hr,
            warnings: flags.iter().map(|f| f.warning().to_string()).collect(),
            flags,
        }
    }

    /// Short-term summary of a metric over the trailing `trend_days`
    ///
    /// Readings are taken in chronological order; `None` when fewer than
    /// `trend_min_readings` readings (or metric values) are available.
    pub fn metric_trend(
        &self,
        readings: &[HrvReading],
        now: DateTime<Utc>,
        metric: TrendMetric,
    ) -> Option<MetricTrend> {
        let start_date = now - Duration::days(self.config.trend_days);
        let mut window: Vec<&HrvReading> = readings
            .iter()
            .filter(|r| r.recorded_at >= start_date && r.recorded_at <= now)
            .collect();

        if window.len() < self.config.trend_min_readings {
            return None;
        }

        window.sort_by_key(|r| r.recorded_at);
        let values: Vec<f64> = window.iter().filter_map(|r| metric.value(r)).collect();

        if values.len() < self.config.trend_min_readings {
            return None;
        }

        let first = values[0];
        let last = values[values.len() - 1];

        Some(MetricTrend {
            metric,
            mean: values.iter().mean(),
            std_dev: sample_std_dev(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            direction: if last > first {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            },
            readings_count: values.len(),
        })
    }
}

/// Sample standard deviation; a single value has no spread
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        values.iter().std_dev()
    }
}

fn optional_mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
    }

    fn reading(days_ago: i64, rmssd: Option<f64>, hr: Option<f64>) -> HrvReading {
        HrvReading {
            rmssd,
            mean_hr: hr,
            ..HrvReading::new("user-1", now() - Duration::days(days_ago))
        }
    }

    fn snapshot(mean_ln: f64, sd_ln: f64, hr: Option<(f64, f64)>) -> BaselineSnapshot {
        BaselineSnapshot {
            start_date: now() - Duration::days(28),
            end_date: now(),
            days_count: 28,
            readings_count: 14,
            mean_ln_rmssd: mean_ln,
            sd_ln_rmssd: sd_ln,
            mean_rmssd: mean_ln.exp(),
            mean_hr: hr.map(|(m, _)| m),
            sd_hr: hr.map(|(_, s)| s),
            mean_total_power: None,
            mean_hf_power: None,
            mean_lf_power: None,
        }
    }

    #[test]
    fn test_baseline_from_window() {
        let history: Vec<HrvReading> = (1..=10)
            .map(|d| reading(d, Some(40.0 + d as f64), Some(60.0 + d as f64)))
            .collect();

        let baseline = BaselineTracker::new()
            .compute_baseline(&history, now())
            .unwrap();

        assert_eq!(baseline.readings_count, 10);
        assert_eq!(baseline.days_count, 28);
        assert_eq!(baseline.end_date, now());
        assert!((baseline.mean_rmssd - 45.5).abs() < 1e-9);
        assert!((baseline.mean_hr.unwrap() - 65.5).abs() < 1e-9);
        assert!(baseline.sd_hr.unwrap() > 0.0);

        let expected_ln: f64 = (41..=50).map(|v| (v as f64).ln()).sum::<f64>() / 10.0;
        assert!((baseline.mean_ln_rmssd - expected_ln).abs() < 1e-12);
        assert!(baseline.sd_ln_rmssd > 0.0);
        assert!(baseline.mean_hf_power.is_none());
    }

    #[test]
    fn test_readings_outside_window_ignored() {
        let mut history: Vec<HrvReading> = (1..=6).map(|d| reading(d, Some(40.0), None)).collect();
        history.push(reading(29, Some(40.0), None));
        history.push(reading(40, Some(40.0), None));

        assert!(BaselineTracker::new().compute_baseline(&history, now()).is_none());
    }

    #[test]
    fn test_readings_without_rmssd_do_not_count() {
        let mut history: Vec<HrvReading> = (1..=6).map(|d| reading(d, Some(40.0), Some(60.0))).collect();
        history.push(reading(7, None, Some(60.0)));

        assert!(BaselineTracker::new().compute_baseline(&history, now()).is_none());
    }

    #[test]
    fn test_single_positive_rmssd_has_zero_sd() {
        let mut history: Vec<HrvReading> = (1..=6).map(|d| reading(d, Some(0.0), None)).collect();
        history.push(reading(7, Some(42.0), Some(58.0)));

        let baseline = BaselineTracker::new()
            .compute_baseline(&history, now())
            .unwrap();

        assert_eq!(baseline.sd_ln_rmssd, 0.0);
        assert!((baseline.mean_ln_rmssd - 42.0_f64.ln()).abs() < 1e-12);
        // Plain RMSSD mean still covers every reading with a value
        assert!((baseline.mean_rmssd - 6.0).abs() < 1e-9);
        // One HR sample: mean but no SD
        assert_eq!(baseline.mean_hr, Some(58.0));
        assert_eq!(baseline.sd_hr, None);
    }

    #[test]
    fn test_all_zero_rmssd_is_insufficient() {
        let history: Vec<HrvReading> = (1..=8).map(|d| reading(d, Some(0.0), None)).collect();
        assert!(BaselineTracker::new().compute_baseline(&history, now()).is_none());
    }

    #[test]
    fn test_custom_window() {
        let tracker = BaselineTracker::with_config(BaselineConfig {
            window_days: 7,
            min_readings: 3,
            ..BaselineConfig::default()
        });
        let history: Vec<HrvReading> = (1..=10).map(|d| reading(d, Some(50.0), None)).collect();

        let baseline = tracker.compute_baseline(&history, now()).unwrap();
        assert_eq!(baseline.readings_count, 7);
        assert_eq!(baseline.days_count, 7);
    }

    #[test]
    fn test_z_score() {
        assert_eq!(BaselineTracker::z_score(12.0, 10.0, 2.0), 1.0);
        assert_eq!(BaselineTracker::z_score(8.0, 10.0, 2.0), -1.0);
        assert_eq!(BaselineTracker::z_score(1000.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_hrv_z_score_uses_log_scale() {
        let baseline = snapshot(40.0_f64.ln(), 0.2, None);

        let z = BaselineTracker::hrv_z_score(40.0, &baseline).unwrap();
        assert!(z.abs() < 1e-12);

        let z = BaselineTracker::hrv_z_score(40.0 * 0.2_f64.exp(), &baseline).unwrap();
        assert!((z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hrv_z_score_rejects_non_positive() {
        let baseline = snapshot(3.5, 0.2, None);

        assert!(matches!(
            BaselineTracker::hrv_z_score(0.0, &baseline),
            Err(BaselineError::InvalidInput(_))
        ));
        assert!(matches!(
            BaselineTracker::hrv_z_score(-3.0, &baseline),
            Err(BaselineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_hr_z_score() {
        let baseline = snapshot(3.5, 0.2, Some((60.0, 4.0)));
        assert_eq!(BaselineTracker::hr_z_score(68.0, &baseline).unwrap(), 2.0);

        let without_hr = snapshot(3.5, 0.2, None);
        assert!(matches!(
            BaselineTracker::hr_z_score(68.0, &without_hr),
            Err(BaselineError::MissingBaselineData(_))
        ));
    }

    #[test]
    fn test_interpretation_boundaries() {
        let status = |z| BaselineTracker::interpret(z).status;

        assert_eq!(status(0.5), HrvStatus::Excellent);
        assert_eq!(status(0.49999), HrvStatus::Good);
        assert_eq!(status(0.0), HrvStatus::Good);
        assert_eq!(status(-0.1), HrvStatus::Fair);
        assert_eq!(status(-0.5), HrvStatus::Fair);
        assert_eq!(status(-0.50001), HrvStatus::Low);
        assert_eq!(status(-1.0), HrvStatus::Low);
        assert_eq!(status(-1.00001), HrvStatus::Warning);
        assert_eq!(status(-1.5), HrvStatus::Warning);
        assert_eq!(status(-1.50001), HrvStatus::Critical);
    }

    #[test]
    fn test_interpretation_details() {
        let interpretation = BaselineTracker::interpret(-0.7);

        assert_eq!(interpretation.status.label(), "low");
        assert_eq!(interpretation.color, StatusColor::Orange);
        assert!(interpretation.interpretation.contains("reducing activity"));
        assert_eq!(BaselineTracker::interpret(-2.0).color, StatusColor::Red);
        assert_eq!(BaselineTracker::interpret(1.0).color, StatusColor::Green);
    }

    #[test]
    fn test_population_reference() {
        let check = BaselineTracker::check_population_reference(25.0, 78.0);
        assert_eq!(
            check.flags,
            vec![PopulationFlag::RmssdCritical, PopulationFlag::HeartRateElevatedHigh]
        );
        assert_eq!(check.warnings.len(), 2);
        assert!(check.has_concerns());

        let check = BaselineTracker::check_population_reference(45.0, 72.0);
        assert_eq!(check.flags[0].label(), "low");
        assert_eq!(check.flags[1].label(), "elevated");

        let check = BaselineTracker::check_population_reference(65.0, 60.0);
        assert!(!check.has_concerns());
    }

    #[test]
    fn test_metric_trend() {
        let tracker = BaselineTracker::new();
        let readings = vec![
            reading(1, Some(48.0), Some(60.0)),
            reading(5, Some(40.0), Some(62.0)),
            reading(3, Some(44.0), Some(61.0)),
            reading(20, Some(10.0), Some(90.0)),
        ];

        let trend = tracker
            .metric_trend(&readings, now(), TrendMetric::Rmssd)
            .unwrap();

        assert_eq!(trend.readings_count, 3);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.min, 40.0);
        assert_eq!(trend.max, 48.0);
        assert!((trend.mean - 44.0).abs() < 1e-9);
        assert!((trend.std_dev - 4.0).abs() < 1e-9);

        let hr_trend = tracker
            .metric_trend(&readings, now(), TrendMetric::MeanHr)
            .unwrap();
        assert_eq!(hr_trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_metric_trend_needs_three_values() {
        let tracker = BaselineTracker::new();
        let readings = vec![
            reading(1, Some(48.0), None),
            reading(2, Some(40.0), None),
            reading(3, None, None),
        ];

        assert!(tracker.metric_trend(&readings, now(), TrendMetric::Rmssd).is_none());
        assert!(tracker.metric_trend(&readings[..2], now(), TrendMetric::Rmssd).is_none());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_z_score_monotonic(
            a in -1000.0f64..1000.0,
            b in -1000.0f64..1000.0,
            mean in -100.0f64..100.0,
            sd in 0.01f64..50.0
        ) {
            prop_assume!(a < b);
            prop_assert!(BaselineTracker::z_score(a, mean, sd) < BaselineTracker::z_score(b, mean, sd));
        }

        #[test]
        fn test_z_score_zero_sd(value in -1e6f64..1e6, mean in -1e3f64..1e3) {
            prop_assert_eq!(BaselineTracker::z_score(value, mean, 0.0), 0.0);
        }
    }
}
