//! Readiness (energy budget) scoring and PEM risk assessment
//!
//! Combines the current reading, the active baseline and recent score history
//! into a 0-100 energy budget. Four components contribute:
//!
//! | Component | Weight | Source                                        |
//! |-----------|--------|-----------------------------------------------|
//! | HRV       | 0.40   | ln(RMSSD) z-score, blended with HF power ratio |
//! | RHR       | 0.30   | heart rate z-score (inverted)                 |
//! | Sleep     | 0.20   | device sleep quality or sleep duration        |
//! | Stress    | 0.10   | LF/HF ratio                                   |
//!
//! PEM (post-exertional malaise) risk is driven by sustained HRV depression:
//! consecutive days with an HRV z-score below -1.0.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::baseline::{BaselineError, BaselineSnapshot, BaselineTracker};
use crate::models::{EnergyBudgetRecord, HrvReading};

/// HRV z-score below which a day counts towards the PEM streak
pub const LOW_HRV_Z_THRESHOLD: f64 = -1.0;

/// Readiness scoring errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadinessError {
    #[error("Invalid component weights: {0}")]
    InvalidWeights(String),
    #[error("Reading lacks required data: {0}")]
    MissingReadingData(String),
    #[error(transparent)]
    Baseline(#[from] BaselineError),
}

/// Component weights for the overall energy budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadinessWeights {
    pub hrv: f64,
    pub rhr: f64,
    pub sleep: f64,
    pub stress: f64,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self {
            hrv: 0.40,
            rhr: 0.30,
            sleep: 0.20,
            stress: 0.10,
        }
    }
}

impl ReadinessWeights {
    /// Validated weights: non-negative and summing to 1.0
    pub fn new(hrv: f64, rhr: f64, sleep: f64, stress: f64) -> Result<Self, ReadinessError> {
        let weights = Self {
            hrv,
            rhr,
            sleep,
            stress,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ReadinessError> {
        let all = [self.hrv, self.rhr, self.sleep, self.stress];

        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ReadinessError::InvalidWeights(format!(
                "weights must be finite and non-negative: {:?}",
                all
            )));
        }

        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ReadinessError::InvalidWeights(format!(
                "weights must sum to 1.0, got {}",
                sum
            )));
        }

        Ok(())
    }
}

/// PEM risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PemRiskLevel {
    Low,
    Moderate,
    High,
}

impl PemRiskLevel {
    /// Ordered cascade; the first matching rule wins
    pub fn assess(consecutive_low_days: u32, hrv_zscore: f64, rhr_zscore: Option<f64>) -> Self {
        if consecutive_low_days >= 3 {
            PemRiskLevel::High
        } else if consecutive_low_days >= 2 {
            PemRiskLevel::Moderate
        } else if hrv_zscore < -1.5 || rhr_zscore.is_some_and(|z| z > 1.4) {
            PemRiskLevel::Moderate
        } else if hrv_zscore < LOW_HRV_Z_THRESHOLD {
            PemRiskLevel::Moderate
        } else {
            PemRiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PemRiskLevel::Low => "low",
            PemRiskLevel::Moderate => "moderate",
            PemRiskLevel::High => "high",
        }
    }
}

impl fmt::Display for PemRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PemRiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(PemRiskLevel::Low),
            "moderate" => Ok(PemRiskLevel::Moderate),
            "high" => Ok(PemRiskLevel::High),
            _ => Err(format!("Invalid PEM risk level: {}", s)),
        }
    }
}

/// Suggested activity level for the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityRecommendation {
    Normal,
    Light,
    Reduced,
    Rest,
}

impl ActivityRecommendation {
    /// High PEM risk always means rest; otherwise banded on the energy budget
    pub fn recommend(energy_budget: f64, pem_risk: PemRiskLevel) -> Self {
        if pem_risk == PemRiskLevel::High {
            return ActivityRecommendation::Rest;
        }

        if energy_budget >= 70.0 {
            ActivityRecommendation::Normal
        } else if energy_budget >= 50.0 {
            ActivityRecommendation::Light
        } else if energy_budget >= 30.0 {
            ActivityRecommendation::Reduced
        } else {
            ActivityRecommendation::Rest
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityRecommendation::Normal => "normal",
            ActivityRecommendation::Light => "light",
            ActivityRecommendation::Reduced => "reduced",
            ActivityRecommendation::Rest => "rest",
        }
    }
}

impl fmt::Display for ActivityRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityRecommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(ActivityRecommendation::Normal),
            "light" => Ok(ActivityRecommendation::Light),
            "reduced" => Ok(ActivityRecommendation::Reduced),
            "rest" => Ok(ActivityRecommendation::Rest),
            _ => Err(format!("Invalid activity recommendation: {}", s)),
        }
    }
}

/// Component breakdown of one readiness score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessBreakdown {
    /// Weighted overall score (0-100)
    pub energy_budget: f64,

    pub hrv_score: f64,
    pub rhr_score: f64,
    pub sleep_score: f64,
    pub stress_score: f64,

    /// HRV z-score against the baseline (positive is better)
    pub hrv_zscore: f64,

    /// Heart rate z-score; absent when either side lacks heart rate data
    pub rhr_zscore: Option<f64>,

    pub pem_risk_level: PemRiskLevel,
    pub consecutive_low_days: u32,
    pub activity_recommendation: ActivityRecommendation,
}

/// One point of a readiness time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessTrendPoint {
    pub date: DateTime<Utc>,
    pub energy_budget: f64,
    pub hrv_score: f64,
    pub rhr_score: f64,
    pub pem_risk_level: PemRiskLevel,
    pub activity_recommendation: ActivityRecommendation,
}

/// Weighted readiness scorer
#[derive(Debug, Clone, Default)]
pub struct ReadinessEngine {
    weights: ReadinessWeights,
}

impl ReadinessEngine {
    /// Create an engine, rejecting weights that do not sum to 1.0
    pub fn new(weights: ReadinessWeights) -> Result<Self, ReadinessError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ReadinessWeights {
        &self.weights
    }

    /// Score a reading against a baseline
    ///
    /// `recent_history` must already be limited to the trailing window and
    /// ordered most recent first (see [`recent_history`]).
    pub fn score(
        &self,
        reading: &HrvReading,
        baseline: &BaselineSnapshot,
        recent_history: &[EnergyBudgetRecord],
    ) -> Result<ReadinessBreakdown, ReadinessError> {
        let rmssd = reading.rmssd.ok_or_else(|| {
            ReadinessError::MissingReadingData(format!("reading {} has no RMSSD", reading.id))
        })?;

        let hrv_zscore = BaselineTracker::hrv_z_score(rmssd, baseline)?;
        let rhr_zscore = match reading.mean_hr {
            Some(hr) => BaselineTracker::hr_z_score(hr, baseline).ok(),
            None => None,
        };

        let hrv_score = Self::hrv_component(hrv_zscore, reading.hf_power, baseline.mean_hf_power);
        let rhr_score = rhr_zscore.map_or(50.0, |z| clamp_score(50.0 - 20.0 * z));
        let sleep_score = Self::sleep_component(reading.sleep_quality, reading.sleep_duration);
        let stress_score = Self::stress_component(reading.lf_hf_ratio);

        let energy_budget = self.weights.hrv * hrv_score
            + self.weights.rhr * rhr_score
            + self.weights.sleep * sleep_score
            + self.weights.stress * stress_score;

        let consecutive_low_days = consecutive_low_days(recent_history);
        let pem_risk_level = PemRiskLevel::assess(consecutive_low_days, hrv_zscore, rhr_zscore);
        let activity_recommendation = ActivityRecommendation::recommend(energy_budget, pem_risk_level);

        if pem_risk_level == PemRiskLevel::High {
            warn!(
                user_id = %reading.user_id,
                consecutive_low_days,
                "High PEM risk: sustained HRV depression"
            );
        }

        debug!(
            reading_id = %reading.id,
            energy_budget,
            hrv_score,
            rhr_score,
            sleep_score,
            stress_score,
            pem_risk = %pem_risk_level,
            "Readiness scored"
        );

        Ok(ReadinessBreakdown {
            energy_budget,
            hrv_score,
            rhr_score,
            sleep_score,
            stress_score,
            hrv_zscore,
            rhr_zscore,
            pem_risk_level,
            consecutive_low_days,
            activity_recommendation,
        })
    }

    fn hrv_component(z_score: f64, hf_power: Option<f64>, baseline_hf: Option<f64>) -> f64 {
        let rmssd_score = clamp_score(50.0 + 20.0 * z_score);

        match (hf_power, baseline_hf) {
            (Some(hf), Some(mean_hf)) if hf > 0.0 && mean_hf > 0.0 => {
                let hf_score = clamp_score(50.0 + 50.0 * (hf / mean_hf - 1.0));
                0.7 * rmssd_score + 0.3 * hf_score
            }
            _ => rmssd_score,
        }
    }

    fn sleep_component(sleep_quality: Option<f64>, sleep_duration: Option<f64>) -> f64 {
        if let Some(quality) = sleep_quality {
            return clamp_score(quality);
        }

        match sleep_duration {
            // Zero means the device reported no sleep
            Some(hours) if hours != 0.0 => {
                if (7.0..=9.0).contains(&hours) {
                    80.0
                } else if (6.0..=10.0).contains(&hours) {
                    60.0
                } else if (5.0..=11.0).contains(&hours) {
                    40.0
                } else {
                    30.0
                }
            }
            _ => 50.0,
        }
    }

    fn stress_component(lf_hf_ratio: Option<f64>) -> f64 {
        match lf_hf_ratio {
            Some(ratio) => {
                if ratio <= 1.5 {
                    90.0
                } else if ratio <= 2.5 {
                    70.0
                } else if ratio <= 4.0 {
                    50.0
                } else if ratio <= 6.0 {
                    30.0
                } else {
                    15.0
                }
            }
            None => 50.0,
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Length of the leading run of low-HRV records (most recent first)
pub fn consecutive_low_days(history: &[EnergyBudgetRecord]) -> u32 {
    history
        .iter()
        .take_while(|record| record.breakdown.hrv_zscore < LOW_HRV_Z_THRESHOLD)
        .count() as u32
}

/// Records dated within `[as_of - days, as_of]`, most recent first
pub fn recent_history(
    records: &[EnergyBudgetRecord],
    as_of: DateTime<Utc>,
    days: i64,
) -> Vec<EnergyBudgetRecord> {
    let start = as_of - Duration::days(days);
    let mut recent: Vec<EnergyBudgetRecord> = records
        .iter()
        .filter(|r| r.date >= start && r.date <= as_of)
        .cloned()
        .collect();

    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent
}

/// Readiness time series over `[now - days, now]`, oldest first
pub fn readiness_trend(
    records: &[EnergyBudgetRecord],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<ReadinessTrendPoint> {
    let mut points: Vec<ReadinessTrendPoint> = recent_history(records, now, days)
        .into_iter()
        .map(|r| ReadinessTrendPoint {
            date: r.date,
            energy_budget: r.breakdown.energy_budget,
            hrv_score: r.breakdown.hrv_score,
            rhr_score: r.breakdown.rhr_score,
            pem_risk_level: r.breakdown.pem_risk_level,
            activity_recommendation: r.breakdown.activity_recommendation,
        })
        .collect();

    points.reverse();
    points
}
