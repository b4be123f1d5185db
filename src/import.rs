//! RR interval file import and parallel batch analysis
//!
//! Supported layouts, all in milliseconds:
//!
//! - CSV with a header row; the RR column is found by name (`rr`, `rr_ms`,
//!   `rri`, `interval`, `ibi`, case-insensitive)
//! - Headerless CSV or plain text; the first column of each line is used
//! - JSON array of numbers (`.json` extension)
//!
//! Lines starting with `#` are comments.

use csv::{ReaderBuilder, StringRecord, Trim};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::{HrvMetrics, HrvMetricsEngine, MetricsError};
use crate::models::RrIntervalSeries;
use crate::quality::{QualityGate, QualityReport};

/// Column names recognised as the RR interval column
const RR_COLUMN_NAMES: &[&str] = &["rr", "rr_ms", "rri", "interval", "ibi"];

/// File extensions picked up by directory scans
const RECORDING_EXTENSIONS: &[&str] = &["csv", "txt", "json"];

/// Recording file errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No RR column in {} (expected one of: {})", .path.display(), RR_COLUMN_NAMES.join(", "))]
    MissingColumn { path: PathBuf },

    #[error("Invalid RR value {value:?} on line {line}")]
    InvalidValue { line: u64, value: String },

    #[error("No RR intervals in {}", .path.display())]
    Empty { path: PathBuf },

    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    #[error("Invalid progress bar template: {0}")]
    ProgressTemplate(String),
}

/// Read an RR interval recording from disk
pub fn read_rr_file<P: AsRef<Path>>(path: P) -> Result<RrIntervalSeries, ImportError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ImportError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let intervals = if is_json {
        serde_json::from_str::<Vec<f64>>(&fs::read_to_string(path)?)?
    } else {
        read_delimited(path)?
    };

    if intervals.is_empty() {
        return Err(ImportError::Empty {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), intervals = intervals.len(), "Read RR recording");
    Ok(RrIntervalSeries::new(intervals))
}

fn read_delimited(path: &Path) -> Result<Vec<f64>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut records = reader.records();
    let first = match records.next() {
        Some(record) => record?,
        None => return Ok(Vec::new()),
    };

    let mut intervals = Vec::new();
    let column = match first.get(0).map(|f| f.parse::<f64>()) {
        Some(Ok(value)) => {
            intervals.push(value);
            0
        }
        _ => rr_column(&first).ok_or_else(|| ImportError::MissingColumn {
            path: path.to_path_buf(),
        })?,
    };

    for record in records {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let raw = record.get(column).unwrap_or_default();
        if raw.is_empty() {
            continue;
        }

        let value = raw.parse::<f64>().map_err(|_| ImportError::InvalidValue {
            line,
            value: raw.to_string(),
        })?;
        intervals.push(value);
    }

    Ok(intervals)
}

fn rr_column(header: &StringRecord) -> Option<usize> {
    header
        .iter()
        .position(|name| RR_COLUMN_NAMES.contains(&name.to_lowercase().as_str()))
}

/// Short name shown next to the progress bar
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Batch analysis settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads; None uses the rayon default (one per CPU)
    pub num_threads: Option<usize>,

    /// Show a progress bar on stderr
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            show_progress: true,
        }
    }
}

/// Outcome category of one analyzed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Passed the quality gate and metrics were computed
    Valid,
    /// Read successfully but rejected by the quality gate
    Invalid,
    /// Could not be read or analyzed
    Failed,
}

/// Analysis of a single recording file
#[derive(Debug, Clone, Serialize)]
pub struct RecordingAnalysis {
    pub path: PathBuf,
    pub quality: Option<QualityReport>,
    pub metrics: Option<HrvMetrics>,
    pub error: Option<String>,
    pub duration_ms: u128,
}

impl RecordingAnalysis {
    pub fn status(&self) -> AnalysisStatus {
        match (&self.error, &self.metrics) {
            (Some(_), _) => AnalysisStatus::Failed,
            (None, Some(_)) => AnalysisStatus::Valid,
            (None, None) => AnalysisStatus::Invalid,
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub failed: usize,

    /// Mean RMSSD over valid recordings
    pub mean_rmssd: Option<f64>,

    pub total_duration_ms: u128,
}

impl BatchSummary {
    fn from_results(results: &[RecordingAnalysis], total_duration_ms: u128) -> Self {
        let mut summary = BatchSummary {
            total_files: results.len(),
            total_duration_ms,
            ..BatchSummary::default()
        };

        for result in results {
            match result.status() {
                AnalysisStatus::Valid => summary.valid += 1,
                AnalysisStatus::Invalid => summary.invalid += 1,
                AnalysisStatus::Failed => summary.failed += 1,
            }
        }

        let rmssd: Vec<f64> = results
            .iter()
            .filter_map(|r| r.metrics.map(|m| m.time_domain.rmssd))
            .collect();
        if !rmssd.is_empty() {
            summary.mean_rmssd = Some(rmssd.iter().sum::<f64>() / rmssd.len() as f64);
        }

        summary
    }

    /// Files per second
    pub fn throughput(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        self.total_files as f64 / self.total_duration_ms as f64 * 1000.0
    }
}

/// Runs the quality gate and metrics engine over many files in parallel
pub struct BatchAnalyzer {
    config: BatchConfig,
    gate: QualityGate,
    engine: HrvMetricsEngine,
}

impl BatchAnalyzer {
    pub fn new(gate: QualityGate, engine: HrvMetricsEngine) -> Self {
        Self::with_config(gate, engine, BatchConfig::default())
    }

    pub fn with_config(gate: QualityGate, engine: HrvMetricsEngine, config: BatchConfig) -> Self {
        Self {
            config,
            gate,
            engine,
        }
    }

    /// Read, quality-check and (when valid) analyze one file
    pub fn analyze_file(&self, path: &Path) -> RecordingAnalysis {
        let start = Instant::now();
        let mut analysis = RecordingAnalysis {
            path: path.to_path_buf(),
            quality: None,
            metrics: None,
            error: None,
            duration_ms: 0,
        };

        match read_rr_file(path) {
            Ok(series) => {
                let report = self.gate.check(series.intervals());
                if report.is_valid {
                    match self.engine.compute_all(series.intervals()) {
                        Ok(metrics) => analysis.metrics = Some(metrics),
                        Err(e) => analysis.error = Some(e.to_string()),
                    }
                }
                analysis.quality = Some(report);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read recording");
                analysis.error = Some(e.to_string());
            }
        }

        analysis.duration_ms = start.elapsed().as_millis();
        analysis
    }

    /// Quality report and metrics for one in-memory recording
    ///
    /// The gate runs first and metrics are attempted regardless of its
    /// verdict, so a rejected recording still comes with its report.
    pub fn analyze_series(
        &self,
        series: &RrIntervalSeries,
    ) -> (QualityReport, Result<HrvMetrics, MetricsError>) {
        let report = self.gate.check(series.intervals());
        let metrics = self.engine.compute_all(series.intervals());
        (report, metrics)
    }

    /// Analyze files in parallel; results keep the input order
    pub fn analyze_files(
        &self,
        paths: &[PathBuf],
    ) -> Result<(Vec<RecordingAnalysis>, BatchSummary), ImportError> {
        let start = Instant::now();
        info!("Starting batch analysis of {} files", paths.len());

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(paths.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
                    .map_err(|e| ImportError::ProgressTemplate(e.to_string()))?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let run = || -> Vec<RecordingAnalysis> {
            paths
                .par_iter()
                .map(|path| {
                    let analysis = self.analyze_file(path);
                    if let Some(pb) = &progress {
                        pb.set_message(file_label(path));
                        pb.inc(1);
                    }
                    analysis
                })
                .collect()
        };

        let results = match self.config.num_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ImportError::ThreadPool(e.to_string()))?
                .install(run),
            None => run(),
        };

        if let Some(pb) = progress {
            pb.finish_with_message("Complete");
        }

        let summary = BatchSummary::from_results(&results, start.elapsed().as_millis());
        info!(
            total = summary.total_files,
            valid = summary.valid,
            invalid = summary.invalid,
            failed = summary.failed,
            "Batch analysis finished"
        );

        Ok((results, summary))
    }

    /// Analyze every recording file directly inside `dir`
    pub fn analyze_directory(
        &self,
        dir: &Path,
    ) -> Result<(Vec<RecordingAnalysis>, BatchSummary), ImportError> {
        if !dir.is_dir() {
            return Err(ImportError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_recording = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| RECORDING_EXTENSIONS.contains(&e.to_lowercase().as_str()));

            if path.is_file() && is_recording {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            warn!("No recording files found in {}", dir.display());
        }

        self.analyze_files(&files)
    }
}
