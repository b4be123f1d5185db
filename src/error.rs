//! Unified error hierarchy for HRV Budget
//!
//! Each component keeps its own error enum; `HrvBudgetError` wraps them for
//! the service layer and the CLI, adding the failures that only exist once
//! persistence is involved.

use thiserror::Error;

use crate::baseline::BaselineError;
use crate::database::DatabaseError;
use crate::import::ImportError;
use crate::metrics::MetricsError;
use crate::readiness::ReadinessError;

/// Top-level error type for all HRV Budget operations
#[derive(Debug, Error)]
pub enum HrvBudgetError {
    /// HRV metric computation errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Baseline normalization errors
    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),

    /// Readiness scoring errors
    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Recording file errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// The quality gate rejected a submitted recording
    #[error("Recording rejected: {}", .issues.join("; "))]
    RejectedRecording { issues: Vec<String> },

    #[error("No active baseline for user {user_id}")]
    NoActiveBaseline { user_id: String },

    /// Too few readings in the baseline window
    #[error("Insufficient data for a {window_days}-day baseline (user {user_id})")]
    InsufficientBaselineData { user_id: String, window_days: i64 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Settings rejected when building the service
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for HRV Budget operations
pub type Result<T> = std::result::Result<T, HrvBudgetError>;

impl HrvBudgetError {
    /// Check if error is retryable
    ///
    /// Only transient storage conditions qualify; the computations are pure
    /// and fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            HrvBudgetError::Database(DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(
                e,
                _,
            ))) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HrvBudgetError::RejectedRecording { .. } => ErrorSeverity::Warning,
            HrvBudgetError::InsufficientBaselineData { .. } => ErrorSeverity::Warning,
            HrvBudgetError::NoActiveBaseline { .. } => ErrorSeverity::Warning,
            HrvBudgetError::NotFound { .. } => ErrorSeverity::Warning,
            HrvBudgetError::Metrics(MetricsError::InsufficientData { .. }) => {
                ErrorSeverity::Warning
            }
            HrvBudgetError::Readiness(ReadinessError::InvalidWeights(_)) => {
                ErrorSeverity::Critical
            }
            HrvBudgetError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HrvBudgetError::RejectedRecording { issues } => format!(
                "The recording did not pass quality checks: {}. Try recording again while lying still.",
                issues.join("; ")
            ),
            HrvBudgetError::NoActiveBaseline { .. } => {
                "No baseline yet. Record at least 7 mornings, then run `hrvbudget baseline`."
                    .to_string()
            }
            HrvBudgetError::InsufficientBaselineData { window_days, .. } => format!(
                "Not enough readings in the last {} days to build a baseline.",
                window_days
            ),
            HrvBudgetError::Metrics(MetricsError::InsufficientData {
                analysis,
                required,
                actual,
            }) => format!(
                "Recording too short for {} analysis: {} intervals, {} required.",
                analysis, actual, required
            ),
            HrvBudgetError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find recording file: {}", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error, usually misconfiguration
    Critical,
    /// Error that prevents the operation
    Error,
    /// Expected condition the user can act on
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
