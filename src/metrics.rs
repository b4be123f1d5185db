//! HRV metrics engine
//!
//! Turns a cleaned RR interval sequence into time-domain and frequency-domain
//! heart rate variability parameters.
//!
//! # Time domain
//!
//! - **Mean RRI**: average interval (ms)
//! - **Mean HR**: 60000 / mean RRI (bpm)
//! - **SDNN**: sample standard deviation of all intervals (ms)
//! - **RMSSD**: root mean square of successive differences (ms), the standard
//!   marker of parasympathetic (vagal) activity
//! - **pNN50**: percentage of successive differences larger than 50 ms
//!
//! # Frequency domain
//!
//! Band powers (ms²) come from a Welch PSD of the 4 Hz resampled tachogram; see
//! [`crate::spectral`]. Normalized units express LF and HF as a share of
//! total power excluding VLF.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

use crate::spectral::{self, HF_BAND, LF_BAND, VLF_BAND};

/// Minimum intervals for time-domain analysis
pub const MIN_TIME_DOMAIN_INTERVALS: usize = 2;

/// Minimum intervals for frequency-domain analysis
pub const MIN_FREQUENCY_DOMAIN_INTERVALS: usize = 60;

/// Successive differences above this threshold count toward pNN50 (ms)
const NN50_THRESHOLD_MS: f64 = 50.0;

/// HRV metric calculation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Insufficient data for {analysis} analysis: need at least {required} RR intervals, got {actual}")]
    InsufficientData {
        analysis: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Spectral method not supported: {0}")]
    NotSupported(SpectralMethod),
}

/// Power spectral density estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralMethod {
    /// Averaged overlapping periodograms
    Welch,
    /// Autoregressive model fit (not available)
    Autoregressive,
}

impl fmt::Display for SpectralMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralMethod::Welch => write!(f, "welch"),
            SpectralMethod::Autoregressive => write!(f, "autoregressive"),
        }
    }
}

impl std::str::FromStr for SpectralMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "welch" => Ok(SpectralMethod::Welch),
            "ar" | "autoregressive" => Ok(SpectralMethod::Autoregressive),
            _ => Err(format!("Invalid spectral method: {}", s)),
        }
    }
}

/// Frequency-domain analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// PSD estimation method
    pub method: SpectralMethod,

    /// Uniform resampling rate in Hz (default: 4)
    pub resample_hz: f64,

    /// Upper bound on the Welch segment length (default: 256)
    pub max_segment_len: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            method: SpectralMethod::Welch,
            resample_hz: 4.0,
            max_segment_len: 256,
        }
    }
}

/// Time-domain HRV parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeDomainMetrics {
    /// Mean RR interval (ms)
    pub mean_rri: f64,

    /// Mean heart rate (bpm)
    pub mean_hr: f64,

    /// Standard deviation of NN intervals (ms)
    pub sdnn: f64,

    /// Root mean square of successive differences (ms)
    pub rmssd: f64,

    /// Successive differences above 50 ms (%)
    pub pnn50: f64,
}

/// Frequency-domain HRV parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyDomainMetrics {
    /// Very low frequency power (ms²)
    pub vlf_power: f64,

    /// Low frequency power (ms²)
    pub lf_power: f64,

    /// High frequency power (ms²)
    pub hf_power: f64,

    /// VLF + LF + HF (ms²)
    pub total_power: f64,

    /// LF / HF, 0 when HF is 0
    pub lf_hf_ratio: f64,

    /// LF in normalized units
    pub lf_nu: f64,

    /// HF in normalized units
    pub hf_nu: f64,
}

/// Complete metric set for one recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub time_domain: TimeDomainMetrics,
    pub frequency_domain: FrequencyDomainMetrics,
}

/// Computes HRV parameters from RR interval sequences
#[derive(Debug, Clone, Default)]
pub struct HrvMetricsEngine {
    config: SpectralConfig,
}

impl HrvMetricsEngine {
    /// Create engine with default spectral settings (Welch, 4 Hz, 256 samples)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SpectralConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Time-domain parameters; requires at least 2 intervals
    pub fn time_domain(&self, rr_intervals: &[f64]) -> Result<TimeDomainMetrics, MetricsError> {
        require_intervals(rr_intervals, MIN_TIME_DOMAIN_INTERVALS, "time-domain")?;

        let mean_rri = rr_intervals.iter().mean();
        let mean_hr = 60_000.0 / mean_rri;
        let sdnn = rr_intervals.iter().std_dev();

        let diffs: Vec<f64> = rr_intervals.windows(2).map(|w| w[1] - w[0]).collect();
        let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();

        let nn50 = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_MS).count();
        let pnn50 = nn50 as f64 / diffs.len() as f64 * 100.0;

        Ok(TimeDomainMetrics {
            mean_rri,
            mean_hr,
            sdnn,
            rmssd,
            pnn50,
        })
    }

    /// Frequency-domain parameters; requires at least 60 intervals
    pub fn frequency_domain(
        &self,
        rr_intervals: &[f64],
    ) -> Result<FrequencyDomainMetrics, MetricsError> {
        require_intervals(rr_intervals, MIN_FREQUENCY_DOMAIN_INTERVALS, "frequency-domain")?;

        match self.config.method {
            SpectralMethod::Welch => {}
            method => return Err(MetricsError::NotSupported(method)),
        }

        if !(self.config.resample_hz > 0.0) || self.config.max_segment_len == 0 {
            return Err(MetricsError::InvalidInput(format!(
                "resample rate {} Hz and segment length {} must be positive",
                self.config.resample_hz, self.config.max_segment_len
            )));
        }

        let resampled = spectral::resample_uniform(rr_intervals, self.config.resample_hz);
        let psd = spectral::welch(&resampled, self.config.resample_hz, self.config.max_segment_len);

        let vlf_power = spectral::band_power(&psd, VLF_BAND);
        let lf_power = spectral::band_power(&psd, LF_BAND);
        let hf_power = spectral::band_power(&psd, HF_BAND);
        let total_power = vlf_power + lf_power + hf_power;

        let lf_hf_ratio = if hf_power > 0.0 { lf_power / hf_power } else { 0.0 };

        let total_minus_vlf = total_power - vlf_power;
        let (lf_nu, hf_nu) = if total_minus_vlf > 0.0 {
            (
                lf_power / total_minus_vlf * 100.0,
                hf_power / total_minus_vlf * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        debug!(
            samples = resampled.len(),
            vlf_power, lf_power, hf_power, "Spectral analysis complete"
        );

        Ok(FrequencyDomainMetrics {
            vlf_power,
            lf_power,
            hf_power,
            total_power,
            lf_hf_ratio,
            lf_nu,
            hf_nu,
        })
    }

    /// Time-domain then frequency-domain; the first failure is returned as-is
    pub fn compute_all(&self, rr_intervals: &[f64]) -> Result<HrvMetrics, MetricsError> {
        let time_domain = self.time_domain(rr_intervals).map_err(|e| {
            error!("Error calculating time domain metrics: {}", e);
            e
        })?;

        let frequency_domain = self.frequency_domain(rr_intervals).map_err(|e| {
            error!("Error calculating frequency domain metrics: {}", e);
            e
        })?;

        Ok(HrvMetrics {
            time_domain,
            frequency_domain,
        })
    }
}

fn require_intervals(
    rr_intervals: &[f64],
    required: usize,
    analysis: &'static str,
) -> Result<(), MetricsError> {
    if rr_intervals.len() < required {
        return Err(MetricsError::InsufficientData {
            analysis,
            required,
            actual: rr_intervals.len(),
        });
    }

    if let Some((index, value)) = rr_intervals
        .iter()
        .enumerate()
        .find(|(_, rr)| !(rr.is_finite() && **rr > 0.0))
    {
        return Err(MetricsError::InvalidInput(format!(
            "RR interval {} at position {} must be a positive number of milliseconds",
            value, index
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn modulated_series(beats: usize, frequency_hz: f64, amplitude: f64) -> Vec<f64> {
        let mut elapsed = 0.0;
        (0..beats)
            .map(|_| {
                let rr = 1000.0 + amplitude * (2.0 * PI * frequency_hz * elapsed).sin();
                elapsed += rr / 1000.0;
                rr
            })
            .collect()
    }

    #[test]
    fn test_time_domain_known_values() {
        let engine = HrvMetricsEngine::new();
        let metrics = engine
            .time_domain(&[800.0, 810.0, 790.0, 850.0, 800.0])
            .unwrap();

        assert!((metrics.mean_rri - 810.0).abs() < 1e-9);
        assert!((metrics.mean_hr - 60_000.0 / 810.0).abs() < 1e-9);
        assert!((metrics.sdnn - 550.0_f64.sqrt()).abs() < 1e-9);
        assert!((metrics.rmssd - 1650.0_f64.sqrt()).abs() < 1e-9);
        // Only the 60 ms jump exceeds 50 ms; exactly 50 does not count
        assert!((metrics.pnn50 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series() {
        let engine = HrvMetricsEngine::new();
        let metrics = engine.time_domain(&[800.0; 120]).unwrap();

        assert_eq!(metrics.rmssd, 0.0);
        assert_eq!(metrics.sdnn, 0.0);
        assert_eq!(metrics.pnn50, 0.0);
        assert_eq!(metrics.mean_hr, 75.0);
    }

    #[test]
    fn test_time_domain_requires_two_intervals() {
        let engine = HrvMetricsEngine::new();
        let err = engine.time_domain(&[800.0]).unwrap_err();

        assert_eq!(
            err,
            MetricsError::InsufficientData {
                analysis: "time-domain",
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_intervals() {
        let engine = HrvMetricsEngine::new();

        assert!(matches!(
            engine.time_domain(&[800.0, 0.0, 810.0]),
            Err(MetricsError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.time_domain(&[800.0, f64::NAN]),
            Err(MetricsError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_frequency_domain_requires_sixty_intervals() {
        let engine = HrvMetricsEngine::new();
        let err = engine.frequency_domain(&[800.0; 59]).unwrap_err();

        assert!(matches!(
            err,
            MetricsError::InsufficientData { required: 60, actual: 59, .. }
        ));
    }

    #[test]
    fn test_autoregressive_not_supported() {
        let engine = HrvMetricsEngine::with_config(SpectralConfig {
            method: SpectralMethod::Autoregressive,
            ..SpectralConfig::default()
        });

        let err = engine.frequency_domain(&[800.0; 120]).unwrap_err();
        assert_eq!(err, MetricsError::NotSupported(SpectralMethod::Autoregressive));
    }

    #[test]
    fn test_constant_series_has_no_spectral_power() {
        let engine = HrvMetricsEngine::new();
        let metrics = engine.frequency_domain(&[800.0; 300]).unwrap();

        assert_eq!(metrics.total_power, 0.0);
        assert_eq!(metrics.lf_hf_ratio, 0.0);
        assert_eq!(metrics.lf_nu, 0.0);
        assert_eq!(metrics.hf_nu, 0.0);
    }

    #[test]
    fn test_respiratory_modulation_dominates_hf() {
        let engine = HrvMetricsEngine::new();
        let rr = modulated_series(400, 0.25, 40.0);
        let metrics = engine.frequency_domain(&rr).unwrap();

        assert!(metrics.hf_power > metrics.lf_power);
        assert!(metrics.hf_power > metrics.vlf_power);
        assert!(metrics.lf_hf_ratio < 1.0);
        assert!(metrics.hf_nu > 50.0);
        assert!((metrics.lf_nu + metrics.hf_nu - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_baroreflex_modulation_dominates_lf() {
        let engine = HrvMetricsEngine::new();
        let rr = modulated_series(400, 0.1, 40.0);
        let metrics = engine.frequency_domain(&rr).unwrap();

        assert!(metrics.lf_power > metrics.hf_power);
        assert!(metrics.lf_hf_ratio > 1.0);
        assert!(metrics.lf_nu > 50.0);
    }

    #[test]
    fn test_compute_all_merges_both_domains() {
        let engine = HrvMetricsEngine::new();
        let rr = modulated_series(300, 0.25, 30.0);
        let metrics = engine.compute_all(&rr).unwrap();

        assert!(metrics.time_domain.rmssd > 0.0);
        assert!(metrics.frequency_domain.hf_power > 0.0);
    }

    #[test]
    fn test_compute_all_propagates_first_failure() {
        let engine = HrvMetricsEngine::new();

        let err = engine.compute_all(&[800.0]).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::InsufficientData { analysis: "time-domain", .. }
        ));

        // Enough for time domain, not for frequency domain
        let err = engine.compute_all(&[800.0; 30]).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::InsufficientData { analysis: "frequency-domain", .. }
        ));
    }

    #[test]
    fn test_spectral_method_parsing() {
        assert_eq!("welch".parse::<SpectralMethod>().unwrap(), SpectralMethod::Welch);
        assert_eq!("AR".parse::<SpectralMethod>().unwrap(), SpectralMethod::Autoregressive);
        assert!("burg".parse::<SpectralMethod>().is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_rmssd_offset_invariant(
            rr in prop::collection::vec(600.0f64..1200.0, 2..200),
            offset in 0.0f64..300.0
        ) {
            let engine = HrvMetricsEngine::new();
            let shifted: Vec<f64> = rr.iter().map(|v| v + offset).collect();

            let base = engine.time_domain(&rr).unwrap();
            let moved = engine.time_domain(&shifted).unwrap();

            prop_assert!((base.rmssd - moved.rmssd).abs() <= 1e-6 * base.rmssd.max(1.0));
            prop_assert!((base.sdnn - moved.sdnn).abs() <= 1e-6 * base.sdnn.max(1.0));
        }

        #[test]
        fn test_band_powers_non_negative_and_sum(
            rr in prop::collection::vec(600.0f64..1100.0, 60..250)
        ) {
            let engine = HrvMetricsEngine::new();
            let metrics = engine.frequency_domain(&rr).unwrap();

            prop_assert!(metrics.vlf_power >= 0.0);
            prop_assert!(metrics.lf_power >= 0.0);
            prop_assert!(metrics.hf_power >= 0.0);

            let sum = metrics.vlf_power + metrics.lf_power + metrics.hf_power;
            prop_assert!((sum - metrics.total_power).abs() <= 1e-6 * metrics.total_power.max(1e-12));
        }

        #[test]
        fn test_constant_series_properties(c in 300.0f64..2000.0, len in 2usize..150) {
            let engine = HrvMetricsEngine::new();
            let metrics = engine.time_domain(&vec![c; len]).unwrap();

            prop_assert!(metrics.rmssd == 0.0);
            prop_assert!(metrics.sdnn.abs() < 1e-9);
            prop_assert!((metrics.mean_hr - 60_000.0 / c).abs() < 1e-9);
        }
    }
}
