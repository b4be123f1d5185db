// Library interface for the HRV budget modules
// This allows integration tests and benches to access the core functionality

pub mod baseline;
pub mod config;
pub mod database;
pub mod error;
pub mod import;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod quality;
pub mod readiness;
pub mod service;
pub mod spectral;

// Re-export commonly used types for convenience
pub use models::*;
pub use baseline::{BaselineConfig, BaselineSnapshot, BaselineTracker, HrvStatus};
pub use metrics::{HrvMetrics, HrvMetricsEngine, MetricsError, SpectralConfig};
pub use quality::{QualityBounds, QualityGate, QualityReport};
pub use readiness::{
    ActivityRecommendation, PemRiskLevel, ReadinessBreakdown, ReadinessEngine, ReadinessWeights,
};
pub use database::{Database, HrvStore};
pub use service::HrvService;
pub use error::{HrvBudgetError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
