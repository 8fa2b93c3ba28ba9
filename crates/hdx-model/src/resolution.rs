//! Outcome of resolving one raw location token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;

/// How a token was resolved, ordered from most to least certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// Override table, canonical code, or exact normalized name.
    Exact,
    /// Code-format conversion (ISO2/ISO3 substitution, zero padding).
    LengthConverted,
    /// Token is a substring of an indexed name.
    Substring,
    /// Phonetic distance within threshold.
    Phonetic,
    Unresolved,
}

impl ResolutionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::LengthConverted => "length-converted",
            Self::Substring => "substring",
            Self::Phonetic => "phonetic",
            Self::Unresolved => "unresolved",
        }
    }

    /// True for the approximate tiers that must appear in the match log.
    pub fn is_fuzzy(self) -> bool {
        matches!(self, Self::Substring | Self::Phonetic)
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one `resolve` call.
///
/// The audit event, if any, travels with the result; callers fold it into
/// their own [`AuditBundle`](crate::AuditBundle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// The raw input token, untrimmed.
    pub token: String,
    pub code: Option<String>,
    pub method: ResolutionMethod,
    pub audit: Option<AuditRecord>,
}

impl ResolutionResult {
    pub fn resolved(
        token: impl Into<String>,
        code: impl Into<String>,
        method: ResolutionMethod,
    ) -> Self {
        Self {
            token: token.into(),
            code: Some(code.into()),
            method,
            audit: None,
        }
    }

    pub fn unresolved(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            code: None,
            method: ResolutionMethod::Unresolved,
            audit: None,
        }
    }

    #[must_use]
    pub fn with_audit(mut self, record: AuditRecord) -> Self {
        self.audit = Some(record);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.code.is_some()
    }
}
