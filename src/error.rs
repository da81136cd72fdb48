//! Error handling for the screening engine
//!
//! Batch-level failures (validation, configuration) reject the whole call.
//! Record-level scoring faults are contained and never surface here; they
//! degrade the affected record to a needs-review result instead.

use ob_screening_types::ScreeningErrorResponse;
use thiserror::Error;

/// Batch-level error returned by `ScreeningEngine::screen_batch`
#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Invalid batch: {0}")]
    Validation(#[from] ValidationError),

    /// No live list survived resolution and demo data was not allowed.
    ///
    /// Distinct from validation so callers can answer "service not ready"
    /// instead of "bad request".
    #[error("No data sources configured (requested: {requested:?}, unavailable: {unavailable:?})")]
    NoDataSources {
        requested: Vec<String>,
        unavailable: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScreeningError {
    /// Stable machine-readable reason code
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.reason_code(),
            Self::NoDataSources { .. } => "no_data_sources",
            Self::Config(_) => "configuration",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn to_response(&self) -> ScreeningErrorResponse {
        ScreeningErrorResponse {
            code: self.reason_code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Input validation failures. Any one of these rejects the entire batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("batch is empty")]
    EmptyBatch,

    #[error("batch size {size} exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("record {index} ('{id}') name must be at least {min} characters")]
    NameTooShort {
        index: usize,
        id: String,
        min: usize,
    },

    #[error("record {index} ('{id}') has unparseable dob '{value}', expected YYYY-MM-DD")]
    InvalidDob {
        index: usize,
        id: String,
        value: String,
    },
}

impl ValidationError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::EmptyBatch => "empty_batch",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::NameTooShort { .. } => "name_too_short",
            Self::InvalidDob { .. } => "invalid_dob",
        }
    }
}

/// Failure while scoring a single (record, list) work unit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("non-finite score for entry '{entry_id}'")]
    NonFiniteScore { entry_id: String },

    #[error("scoring panicked: {0}")]
    Panicked(String),

    #[error("scoring fault: {0}")]
    Fault(String),
}

/// Errors loading watchlist source files
#[derive(Error, Debug)]
pub enum ListLoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Duplicate list code '{0}'")]
    DuplicateCode(String),

    #[error("Unsupported list file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ScreeningError>;
