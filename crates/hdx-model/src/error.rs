//! Error taxonomy shared by the engine crates.
//!
//! Resolution misses are deliberately absent: they are tracked in the
//! [`AuditBundle`](crate::AuditBundle) and never propagate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HdxError {
    /// Bad reference data or dataset schema. Not retryable without a config fix.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Unparseable date or value in an input row. Aborts the dataset pass.
    #[error("data format error in column '{column}' (value '{value}'): {message}")]
    DataFormat {
        /// Column holding the bad value.
        column: String,
        /// The offending value as text.
        value: String,
        /// Description of the parse failure.
        message: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HdxError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn data_format(
        column: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DataFormat {
            column: column.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_data_format(&self) -> bool {
        matches!(self, Self::DataFormat { .. })
    }
}

pub type Result<T> = std::result::Result<T, HdxError>;
