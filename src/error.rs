//! Error types for seeing-science.
//!
//! Every fallible operation returns `Result<T, StageError>` instead of
//! panicking. Statistically degenerate samples are not errors: the
//! statistics functions return finite sentinel values for them, and
//! `DegenerateInput` is only raised by callers that explicitly ask for it.

use thiserror::Error;

/// Result type alias for seeing-science operations.
pub type StageResult<T> = Result<T, StageError>;

/// Unified error type for all engine operations.
///
/// Errors are local to a single call. None of them is worth retrying:
/// every computation is deterministic, so the caller has to fix its input
/// and call again.
#[derive(Debug, Error)]
pub enum StageError {
    // ===== Configuration Errors =====
    /// Invalid generation or engine parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Field-level validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Statistics Errors =====
    /// Sample cannot support the requested comparison (e.g. one group).
    #[error("Degenerate input: {message}")]
    DegenerateInput {
        /// What made the input degenerate.
        message: String,
    },

    /// A derived value came out NaN or infinite.
    #[error("Non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location of the offending value (e.g. "groups[A].variance").
        location: String,
    },

    // ===== Navigation Errors =====
    /// Stage name is not a member of the enumeration.
    #[error("Invalid stage '{name}'")]
    InvalidStage {
        /// The rejected stage name.
        name: String,
    },

    /// Reveal step arrived out of generation order.
    #[error("Out-of-order reveal: expected index {expected}, got {found}")]
    OutOfOrderReveal {
        /// Next index the engine would accept.
        expected: usize,
        /// Index that was requested.
        found: usize,
    },
}

impl StageError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a degenerate-input error with a message.
    #[must_use]
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateInput {
            message: message.into(),
        }
    }

    /// Create an invalid-stage error.
    #[must_use]
    pub fn invalid_stage(name: impl Into<String>) -> Self {
        Self::InvalidStage { name: name.into() }
    }

    /// Whether the calling UI should show this error as a validation message.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::YamlParse(_)
                | Self::Validation(_)
                | Self::InvalidStage { .. }
        )
    }
}
