use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baseline::BaselineSnapshot;
use crate::metrics::HrvMetrics;
use crate::readiness::ReadinessBreakdown;

/// Successive heartbeat intervals (milliseconds) for one recording session
///
/// The series is kept raw: out-of-range or malformed values are reported by the
/// quality gate rather than rejected on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RrIntervalSeries {
    intervals: Vec<f64>,
}

impl RrIntervalSeries {
    pub fn new(intervals: Vec<f64>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Total recording length in minutes (sum of all intervals)
    pub fn duration_minutes(&self) -> f64 {
        self.intervals.iter().sum::<f64>() / 60_000.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.intervals
    }
}

impl From<Vec<f64>> for RrIntervalSeries {
    fn from(intervals: Vec<f64>) -> Self {
        Self::new(intervals)
    }
}

impl AsRef<[f64]> for RrIntervalSeries {
    fn as_ref(&self) -> &[f64] {
        &self.intervals
    }
}

/// Context recorded alongside a recording, supplied by the device or the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingContext {
    /// Sleep duration in hours
    pub sleep_duration: Option<f64>,

    /// Device-reported sleep quality (0-100)
    pub sleep_quality: Option<f64>,

    /// Recording length in minutes
    pub recording_duration: Option<f64>,

    /// Share of intervals flagged as artifacts (%)
    pub artifact_percentage: Option<f64>,
}

/// Metrics derived from one recording session
///
/// Readings are created once per submitted recording and never mutated.
/// Metric fields are optional so that readings from partial sources
/// (e.g. a device exporting RMSSD and heart rate only) stay representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvReading {
    /// Unique identifier for the reading
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// When the recording was taken
    pub recorded_at: DateTime<Utc>,

    // Time domain
    pub mean_rri: Option<f64>,
    pub mean_hr: Option<f64>,
    pub sdnn: Option<f64>,
    pub rmssd: Option<f64>,
    pub pnn50: Option<f64>,

    // Frequency domain (ms²)
    pub vlf_power: Option<f64>,
    pub lf_power: Option<f64>,
    pub hf_power: Option<f64>,
    pub total_power: Option<f64>,
    pub lf_hf_ratio: Option<f64>,
    pub lf_nu: Option<f64>,
    pub hf_nu: Option<f64>,

    /// Sleep duration in hours
    pub sleep_duration: Option<f64>,

    /// Sleep quality score (0-100)
    pub sleep_quality: Option<f64>,

    /// Recording length in minutes
    pub recording_duration: Option<f64>,

    /// Percentage of intervals flagged as artifacts
    pub artifact_percentage: Option<f64>,
}

impl HrvReading {
    /// Create an empty reading with a fresh identifier
    ///
    /// The timestamp is truncated to the millisecond precision of the store.
    pub fn new(user_id: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            recorded_at: recorded_at.trunc_subsecs(3),
            mean_rri: None,
            mean_hr: None,
            sdnn: None,
            rmssd: None,
            pnn50: None,
            vlf_power: None,
            lf_power: None,
            hf_power: None,
            total_power: None,
            lf_hf_ratio: None,
            lf_nu: None,
            hf_nu: None,
            sleep_duration: None,
            sleep_quality: None,
            recording_duration: None,
            artifact_percentage: None,
        }
    }

    /// Build a reading from a full metrics computation
    pub fn from_metrics(
        user_id: impl Into<String>,
        recorded_at: DateTime<Utc>,
        metrics: &HrvMetrics,
        context: RecordingContext,
    ) -> Self {
        let time = &metrics.time_domain;
        let freq = &metrics.frequency_domain;

        Self {
            mean_rri: Some(time.mean_rri),
            mean_hr: Some(time.mean_hr),
            sdnn: Some(time.sdnn),
            rmssd: Some(time.rmssd),
            pnn50: Some(time.pnn50),
            vlf_power: Some(freq.vlf_power),
            lf_power: Some(freq.lf_power),
            hf_power: Some(freq.hf_power),
            total_power: Some(freq.total_power),
            lf_hf_ratio: Some(freq.lf_hf_ratio),
            lf_nu: Some(freq.lf_nu),
            hf_nu: Some(freq.hf_nu),
            sleep_duration: context.sleep_duration,
            sleep_quality: context.sleep_quality,
            recording_duration: context.recording_duration,
            artifact_percentage: context.artifact_percentage,
            ..Self::new(user_id, recorded_at)
        }
    }
}

/// Persisted baseline with identity and activation state
///
/// At most one baseline per user is active; activation is owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub id: String,
    pub user_id: String,
    pub calculated_at: DateTime<Utc>,
    pub is_active: bool,

    #[serde(flatten)]
    pub snapshot: BaselineSnapshot,
}

impl Baseline {
    /// Wrap a freshly computed snapshot; the store decides activation
    ///
    /// Timestamps are truncated to milliseconds, as stored.
    pub fn new(
        user_id: impl Into<String>,
        mut snapshot: BaselineSnapshot,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        snapshot.start_date = snapshot.start_date.trunc_subsecs(3);
        snapshot.end_date = snapshot.end_date.trunc_subsecs(3);

        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            calculated_at: calculated_at.trunc_subsecs(3),
            is_active: false,
            snapshot,
        }
    }
}

/// Daily readiness score tied to one reading and the baseline it was scored against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyBudgetRecord {
    pub id: String,
    pub user_id: String,
    pub reading_id: String,
    pub baseline_id: String,

    /// Date of the underlying reading
    pub date: DateTime<Utc>,

    #[serde(flatten)]
    pub breakdown: ReadinessBreakdown,
}

impl EnergyBudgetRecord {
    pub fn new(reading: &HrvReading, baseline: &Baseline, breakdown: ReadinessBreakdown) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: reading.user_id.clone(),
            reading_id: reading.id.clone(),
            baseline_id: baseline.id.clone(),
            date: reading.recorded_at.trunc_subsecs(3),
            breakdown,
        }
    }
}
