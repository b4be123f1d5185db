//! Orchestration of the core components against a store
//!
//! The components themselves are pure; this layer loads their inputs from an
//! [`HrvStore`], runs them, and persists what they produce. Operations that
//! depend on the current time take it as a parameter so a retry can reuse the
//! same timestamp.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::baseline::{
    BaselineTracker, HrvInterpretation, MetricTrend, PopulationCheck, TrendMetric,
};
use crate::config::AppConfig;
use crate::database::HrvStore;
use crate::error::{HrvBudgetError, Result};
use crate::metrics::HrvMetricsEngine;
use crate::models::{Baseline, EnergyBudgetRecord, HrvReading, RecordingContext, RrIntervalSeries};
use crate::quality::{QualityGate, QualityReport};
use crate::readiness::{self, ReadinessEngine, ReadinessTrendPoint};

/// A stored reading together with the quality report that admitted it
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub reading: HrvReading,
    pub quality: QualityReport,
}

/// Ad-hoc interpretation of RMSSD and heart rate against the active baseline
#[derive(Debug, Clone, Serialize)]
pub struct Interpretation {
    pub baseline_id: String,
    pub hrv: HrvInterpretation,

    /// Present when the baseline carries heart rate statistics
    pub hr_zscore: Option<f64>,

    pub population: PopulationCheck,
}

pub struct HrvService<S: HrvStore> {
    store: S,
    gate: QualityGate,
    engine: HrvMetricsEngine,
    tracker: BaselineTracker,
    readiness: ReadinessEngine,
    pem_history_days: i64,
}

impl<S: HrvStore> HrvService<S> {
    /// Service with default settings
    pub fn new(store: S) -> Self {
        Self {
            store,
            gate: QualityGate::new(),
            engine: HrvMetricsEngine::new(),
            tracker: BaselineTracker::new(),
            readiness: ReadinessEngine::default(),
            pem_history_days: 7,
        }
    }

    /// Service configured from an application config
    ///
    /// The config is validated first; any rejected setting is reported as
    /// `Configuration`.
    pub fn from_config(store: S, config: &AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HrvBudgetError::Configuration(format!("{:#}", e)))?;
        let readiness = ReadinessEngine::new(config.readiness.weights)?;

        Ok(Self {
            store,
            gate: QualityGate::with_bounds(config.quality),
            engine: HrvMetricsEngine::with_config(config.spectral.clone()),
            tracker: BaselineTracker::with_config(config.baseline.clone()),
            readiness,
            pem_history_days: config.readiness.pem_history_days,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn tracker(&self) -> &BaselineTracker {
        &self.tracker
    }

    /// Quality-check a recording, compute its metrics and store the reading
    ///
    /// Recordings the quality gate rejects are not stored.
    pub fn submit_recording(
        &mut self,
        user_id: &str,
        recorded_at: DateTime<Utc>,
        rr: &RrIntervalSeries,
        sleep_duration: Option<f64>,
        sleep_quality: Option<f64>,
    ) -> Result<Submission> {
        let quality = self.gate.check(rr.intervals());
        if !quality.is_valid {
            warn!(
                user_id,
                artifact_percentage = quality.artifact_percentage,
                intervals = quality.total_intervals,
                "Recording rejected by quality gate"
            );
            return Err(HrvBudgetError::RejectedRecording {
                issues: quality.issues,
            });
        }

        let metrics = self.engine.compute_all(rr.intervals())?;
        let context = RecordingContext {
            sleep_duration,
            sleep_quality,
            recording_duration: Some(rr.duration_minutes()),
            artifact_percentage: Some(quality.artifact_percentage),
        };

        let reading = HrvReading::from_metrics(user_id, recorded_at, &metrics, context);
        self.store.insert_reading(&reading)?;

        info!(
            user_id,
            reading_id = %reading.id,
            rmssd = metrics.time_domain.rmssd,
            mean_hr = metrics.time_domain.mean_hr,
            "Stored HRV reading"
        );

        Ok(Submission { reading, quality })
    }

    /// Store an already-computed reading, e.g. from a device export
    pub fn import_reading(&mut self, reading: &HrvReading) -> Result<()> {
        self.store.insert_reading(reading)?;
        Ok(())
    }

    /// Recompute the baseline over the window ending at `now` and activate it
    pub fn recalculate_baseline(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<Baseline> {
        let window_days = self.tracker.config().window_days;
        let history =
            self.store
                .readings_between(user_id, now - Duration::days(window_days), now)?;

        let snapshot = self.tracker.compute_baseline(&history, now).ok_or_else(|| {
            HrvBudgetError::InsufficientBaselineData {
                user_id: user_id.to_string(),
                window_days,
            }
        })?;

        Ok(self.tracker.activate(&mut self.store, user_id, snapshot, now)?)
    }

    pub fn active_baseline(&self, user_id: &str) -> Result<Baseline> {
        self.store
            .active_baseline(user_id)?
            .ok_or_else(|| HrvBudgetError::NoActiveBaseline {
                user_id: user_id.to_string(),
            })
    }

    /// Score a stored reading against the active baseline and persist the result
    ///
    /// The PEM streak is read from score history in the trailing window that
    /// ends at the reading's own timestamp.
    pub fn score_reading(&mut self, user_id: &str, reading_id: &str) -> Result<EnergyBudgetRecord> {
        let reading = self
            .store
            .get_reading(user_id, reading_id)?
            .ok_or_else(|| HrvBudgetError::NotFound {
                entity: "HRV reading",
                id: reading_id.to_string(),
            })?;

        let baseline = self.active_baseline(user_id)?;

        let as_of = reading.recorded_at;
        let history = self.store.energy_budgets_between(
            user_id,
            as_of - Duration::days(self.pem_history_days),
            as_of,
        )?;

        let breakdown = self
            .readiness
            .score(&reading, &baseline.snapshot, &history)?;
        let record = EnergyBudgetRecord::new(&reading, &baseline, breakdown);
        self.store.insert_energy_budget(&record)?;

        info!(
            user_id,
            reading_id,
            energy_budget = record.breakdown.energy_budget,
            pem_risk = %record.breakdown.pem_risk_level,
            recommendation = %record.breakdown.activity_recommendation,
            "Stored energy budget"
        );

        Ok(record)
    }

    /// Interpret arbitrary RMSSD and heart rate values for a user
    pub fn interpret(&self, user_id: &str, rmssd: f64, mean_hr: f64) -> Result<Interpretation> {
        let baseline = self.active_baseline(user_id)?;

        let z_score = BaselineTracker::hrv_z_score(rmssd, &baseline.snapshot)?;
        let hr_zscore = BaselineTracker::hr_z_score(mean_hr, &baseline.snapshot).ok();

        Ok(Interpretation {
            baseline_id: baseline.id,
            hrv: BaselineTracker::interpret(z_score),
            hr_zscore,
            population: BaselineTracker::check_population_reference(rmssd, mean_hr),
        })
    }

    /// Short-term trend of one metric over the configured trend window
    pub fn metric_trend(
        &self,
        user_id: &str,
        metric: TrendMetric,
        now: DateTime<Utc>,
    ) -> Result<Option<MetricTrend>> {
        let trend_days = self.tracker.config().trend_days;
        let readings = self
            .store
            .readings_between(user_id, now - Duration::days(trend_days), now)?;

        Ok(self.tracker.metric_trend(&readings, now, metric))
    }

    /// Readiness over `[now - days, now]`, oldest first
    pub fn readiness_trend(
        &self,
        user_id: &str,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReadinessTrendPoint>> {
        let records = self
            .store
            .energy_budgets_between(user_id, now - Duration::days(days), now)?;

        Ok(readiness::readiness_trend(&records, now, days))
    }

    /// Latest readings, most recent first
    pub fn recent_readings(&self, user_id: &str, limit: usize) -> Result<Vec<HrvReading>> {
        Ok(self.store.recent_readings(user_id, limit)?)
    }

    /// Latest energy budgets, most recent first
    pub fn recent_energy_budgets(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<EnergyBudgetRecord>> {
        Ok(self.store.recent_energy_budgets(user_id, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::TimeZone;

    fn service() -> HrvService<Database> {
        HrvService::new(Database::open_in_memory().unwrap())
    }

    fn morning(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 7, 0, 0).unwrap()
    }

    fn recording(amplitude: f64) -> RrIntervalSeries {
        RrIntervalSeries::new(
            (0..120)
                .map(|i| 900.0 + amplitude * (i as f64 * 1.4).sin())
                .collect(),
        )
    }

    #[test]
    fn test_returned_values_match_stored_rows() {
        let mut service = service();
        let sub_millis = Duration::nanoseconds(456_789);

        let mut last = None;
        for day in 1..=7 {
            let submission = service
                .submit_recording(
                    "alice",
                    morning(day) + sub_millis,
                    &recording(20.0 + day as f64),
                    Some(7.5),
                    None,
                )
                .unwrap();
            last = Some(submission.reading);
        }

        let returned = last.unwrap();
        let stored = service.store().get_reading("alice", &returned.id).unwrap();
        assert_eq!(stored, Some(returned));

        let baseline = service
            .recalculate_baseline("alice", morning(8) + sub_millis)
            .unwrap();
        assert_eq!(service.active_baseline("alice").unwrap(), baseline);
    }

    #[test]
    fn test_short_recording_rejected_and_not_stored() {
        let mut service = service();
        let rr = RrIntervalSeries::new(vec![800.0; 30]);

        let result = service.submit_recording("alice", morning(1), &rr, None, None);
        match result {
            Err(HrvBudgetError::RejectedRecording { issues }) => {
                assert!(issues.iter().any(|i| i.contains("only 30 intervals")));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(service.recent_readings("alice", 10).unwrap().is_empty());
    }

    #[test]
    fn test_score_unknown_reading() {
        let mut service = service();
        assert!(matches!(
            service.score_reading("alice", "missing"),
            Err(HrvBudgetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_interpret_requires_baseline() {
        let service = service();
        assert!(matches!(
            service.interpret("alice", 45.0, 62.0),
            Err(HrvBudgetError::NoActiveBaseline { .. })
        ));
    }

    #[test]
    fn test_baseline_requires_readings() {
        let mut service = service();
        assert!(matches!(
            service.recalculate_baseline("alice", morning(20)),
            Err(HrvBudgetError::InsufficientBaselineData { window_days: 28, .. })
        ));
    }

    #[test]
    fn test_from_config_rejects_bad_weights() {
        let mut config = AppConfig::default();
        config.readiness.weights.stress = 0.5;

        let result = HrvService::from_config(Database::open_in_memory().unwrap(), &config);
        match result {
            Err(err @ HrvBudgetError::Configuration(_)) => {
                assert!(err.to_string().contains("Invalid readiness weights"));
                assert_eq!(err.severity(), crate::error::ErrorSeverity::Critical);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("invalid weights accepted"),
        }
    }

    #[test]
    fn test_from_config_rejects_bad_windows() {
        let mut config = AppConfig::default();
        config.readiness.pem_history_days = 0;

        let result = HrvService::from_config(Database::open_in_memory().unwrap(), &config);
        assert!(matches!(result, Err(HrvBudgetError::Configuration(_))));
    }
}
