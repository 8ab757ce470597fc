//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use thiserror::Error;

/// Main error type for Rafter operations
#[derive(Error, Debug)]
pub enum RafterError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed VCF header row
    #[error("header error: {message}")]
    Header { message: String },

    /// Unparseable position, genotype field, or FORMAT column
    #[error("format error{}: {message}", fmt_line(.line))]
    Format { message: String, line: Option<u64> },

    /// Record with the wrong number of columns
    #[error("row shape error{}: {message}", fmt_line(.line))]
    RowShape { message: String, line: Option<u64> },

    /// Target variant absent from the window at prediction time
    #[error("no training data: {message}")]
    NoTrainingData { message: String },

    /// Invalid data errors (bad configuration values, internal invariant violations)
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// Host requested abort
    #[error("parsing cancelled by host")]
    Cancelled,
}

fn fmt_line(line: &Option<u64>) -> String {
    match line {
        Some(n) => format!(" at line {n}"),
        None => String::new(),
    }
}

/// Type alias for Results using RafterError
pub type Result<T> = std::result::Result<T, RafterError>;

impl RafterError {
    /// Create a header error
    pub fn header(message: impl Into<String>) -> Self {
        Self::Header {
            message: message.into(),
        }
    }

    /// Create a format error with no line attached yet
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            line: None,
        }
    }

    /// Create a row shape error with no line attached yet
    pub fn row_shape(message: impl Into<String>) -> Self {
        Self::RowShape {
            message: message.into(),
            line: None,
        }
    }

    /// Create a missing-training-data error
    pub fn no_training_data(message: impl Into<String>) -> Self {
        Self::NoTrainingData {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Attach the input line number where the error surfaced.
    ///
    /// Only per-record error kinds carry a line; others pass through unchanged.
    pub fn at_line(self, line_num: u64) -> Self {
        match self {
            Self::Format { message, line } => Self::Format {
                message,
                line: line.or(Some(line_num)),
            },
            Self::RowShape { message, line } => Self::RowShape {
                message,
                line: line.or(Some(line_num)),
            },
            other => other,
        }
    }

    /// Whether the parser may continue with the next record after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::RowShape { .. })
    }
}
