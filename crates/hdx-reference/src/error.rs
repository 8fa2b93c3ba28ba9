#![deny(unsafe_code)]

use std::path::PathBuf;

use hdx_model::HdxError;

/// Problems with reference data. All of them are configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("missing column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("subdivision {code} references unknown country {country}")]
    UnknownCountry { code: String, country: String },

    #[error("country {country} has subdivisions but no registered code length")]
    MissingCodeLength { country: String },

    #[error("duplicate admin code: {code}")]
    DuplicateCode { code: String },

    #[error(
        "subdivision {code} has length {actual} but country {country} registers length {expected}"
    )]
    InconsistentCodeLength {
        code: String,
        country: String,
        expected: usize,
        actual: usize,
    },

    #[error("empty {field} in reference record")]
    EmptyField { field: &'static str },
}

impl ReferenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, error: &csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<ReferenceError> for HdxError {
    fn from(error: ReferenceError) -> Self {
        match error {
            ReferenceError::Io { path, source } => HdxError::io(path, source),
            other => HdxError::configuration(other.to_string()),
        }
    }
}
