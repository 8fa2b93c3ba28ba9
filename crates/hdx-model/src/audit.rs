//! Audit trail of admin resolution.
//!
//! Resolution misses are not errors: rows that cannot be placed on the admin
//! hierarchy are dropped silently and only show up here. Callers inspect the
//! bundle to detect systemic failures, e.g. a source with zero resolvable rows.
//!
//! Records are kept in ordered sets so that emitting them is deterministic and
//! merging bundles from independent workers is a plain set union.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::resolution::{ResolutionMethod, ResolutionResult};

/// An accepted approximate match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatchRecord {
    pub source: String,
    pub country: String,
    pub token: String,
    pub resolved_name: String,
    pub method: ResolutionMethod,
}

/// An ignored token or a failed lookup.
///
/// `token` is `None` when a whole country was skipped (for example because it
/// is not on the fuzzy-matching allow-list).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AuditEntry {
    pub source: String,
    pub country: String,
    pub token: Option<String>,
}

impl AuditEntry {
    pub fn new(
        source: impl Into<String>,
        country: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            source: source.into(),
            country: country.into(),
            token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Match(MatchRecord),
    Ignored(AuditEntry),
    Error(AuditEntry),
}

/// Sorted match/ignored/error records for one run, source or worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditBundle {
    matches: BTreeSet<MatchRecord>,
    ignored: BTreeSet<AuditEntry>,
    errors: BTreeSet<AuditEntry>,
}

impl AuditBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: AuditRecord) {
        match record {
            AuditRecord::Match(entry) => {
                self.matches.insert(entry);
            }
            AuditRecord::Ignored(entry) => {
                self.ignored.insert(entry);
            }
            AuditRecord::Error(entry) => {
                self.errors.insert(entry);
            }
        }
    }

    /// Records the audit event carried by a resolution result, if any.
    pub fn record_result(&mut self, result: &ResolutionResult) {
        if let Some(record) = &result.audit {
            self.record(record.clone());
        }
    }

    /// Folds another bundle into this one.
    pub fn merge(&mut self, other: AuditBundle) {
        self.matches.extend(other.matches);
        self.ignored.extend(other.ignored);
        self.errors.extend(other.errors);
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.ignored.clear();
        self.errors.clear();
    }

    pub fn matches(&self) -> impl Iterator<Item = &MatchRecord> {
        self.matches.iter()
    }

    pub fn ignored(&self) -> impl Iterator<Item = &AuditEntry> {
        self.ignored.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &AuditEntry> {
        self.errors.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.ignored.is_empty() && self.errors.is_empty()
    }

    /// Number of ignored plus error records attributed to `source`.
    pub fn miss_count(&self, source: &str) -> usize {
        self.ignored
            .iter()
            .chain(self.errors.iter())
            .filter(|entry| entry.source == source)
            .count()
    }

    /// Match log lines, sorted lexicographically.
    pub fn match_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .matches
            .iter()
            .map(|m| {
                format!(
                    "{} - {}: matching ({}) {} to {} on map",
                    m.source, m.country, m.method, m.token, m.resolved_name
                )
            })
            .collect();
        lines.sort();
        lines
    }

    /// Ignored log lines, sorted lexicographically.
    pub fn ignored_lines(&self) -> Vec<String> {
        entry_lines(&self.ignored, "ignored")
    }

    /// Error log lines, sorted lexicographically.
    pub fn error_lines(&self) -> Vec<String> {
        entry_lines(&self.errors, "could not find")
    }

    /// Emits every record through `tracing`, matches and ignores at info,
    /// errors at warn.
    pub fn log_summary(&self) {
        for line in self.match_lines() {
            info!("{line}");
        }
        for line in self.ignored_lines() {
            info!("{line}");
        }
        for line in self.error_lines() {
            warn!("{line}");
        }
    }
}

fn entry_lines(entries: &BTreeSet<AuditEntry>, verb: &str) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .map(|entry| match &entry.token {
            Some(token) => format!("{} - {}: {verb} {token}", entry.source, entry.country),
            None => format!("{} - {}: {verb}", entry.source, entry.country),
        })
        .collect();
    lines.sort();
    lines
}
