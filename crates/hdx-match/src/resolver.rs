//! Raw location token → canonical admin code.

use std::collections::{BTreeMap, HashSet};

use hdx_model::{
    AdminLevel, AuditBundle, AuditEntry, AuditRecord, HdxError, MatchRecord, ResolutionMethod,
    ResolutionResult,
};
use hdx_reference::{AdminIndex, NameIndex, normalize_name};
use regex::Regex;
use tracing::{debug, trace};

use crate::config::ResolverConfig;
use crate::pcode::{convert_code_length, convert_country_code};
use crate::phonetic::PhoneticMatcher;

/// Applies the configured name replacements in one pass, longest key first.
#[derive(Debug, Clone)]
struct Replacements {
    pattern: Option<Regex>,
    table: BTreeMap<String, String>,
}

impl Replacements {
    fn new(table: &BTreeMap<String, String>) -> Result<Self, HdxError> {
        let table: BTreeMap<String, String> = table
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
            .collect();
        if table.is_empty() {
            return Ok(Self {
                pattern: None,
                table,
            });
        }
        let mut keys: Vec<&String> = table.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&alternation).map_err(|e| {
            HdxError::configuration(format!("invalid name replacement table: {e}"))
        })?;
        Ok(Self {
            pattern: Some(pattern),
            table,
        })
    }

    fn apply(&self, normalized: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return normalized.to_string();
        };
        let replaced = pattern.replace_all(normalized, |caps: &regex::Captures<'_>| {
            self.table.get(&caps[0]).cloned().unwrap_or_default()
        });
        replaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Resolves location tokens against a frozen [`AdminIndex`].
///
/// Resolution never mutates the resolver: the audit event of each call is
/// returned inside the [`ResolutionResult`], so one resolver can be shared by
/// concurrent aggregations, each folding events into its own
/// [`AuditBundle`].
#[derive(Debug, Clone)]
pub struct AdminResolver<'a> {
    index: &'a AdminIndex,
    config: ResolverConfig,
    phonetics: PhoneticMatcher,
    replacements: Replacements,
    ignore: HashSet<String>,
}

impl<'a> AdminResolver<'a> {
    pub fn new(index: &'a AdminIndex, config: ResolverConfig) -> Result<Self, HdxError> {
        let replacements = Replacements::new(&config.name_replacements)?;
        let ignore = config
            .fuzzy_ignore
            .iter()
            .map(|token| normalize_name(token))
            .filter(|token| !token.is_empty())
            .collect();
        let phonetics =
            PhoneticMatcher::new(config.phonetic_threshold, config.prefix_variants.clone());
        Ok(Self {
            index,
            config,
            phonetics,
            replacements,
            ignore,
        })
    }

    pub fn index(&self) -> &'a AdminIndex {
        self.index
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `token` at `level`.
    ///
    /// For the subdivision level `country` scopes the lookup; for the country
    /// level it is only used to label audit records. The chain stops at the
    /// first success: override table, canonical code, code conversion, exact
    /// normalized name, substring, phonetic.
    pub fn resolve(
        &self,
        country: &str,
        token: &str,
        level: AdminLevel,
        source: &str,
    ) -> ResolutionResult {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return ResolutionResult::unresolved(token)
                .with_audit(AuditRecord::Ignored(AuditEntry::new(source, country, None)));
        }

        if let Some(code) = self.override_for(country, trimmed, level) {
            return ResolutionResult::resolved(token, code, ResolutionMethod::Exact);
        }

        if self.index.contains(trimmed, level) {
            return ResolutionResult::resolved(token, trimmed, ResolutionMethod::Exact);
        }
        let upper = trimmed.to_ascii_uppercase();
        if self.index.contains(&upper, level) {
            return ResolutionResult::resolved(token, upper, ResolutionMethod::Exact);
        }

        let converted = match level {
            AdminLevel::Country => convert_country_code(self.index, trimmed),
            AdminLevel::Subdivision => convert_code_length(self.index, country, trimmed),
        };
        if let Some(code) = converted {
            debug!(source, country, token = trimmed, code = %code, "code converted");
            let record = self.match_record(
                source,
                country,
                trimmed,
                &code,
                ResolutionMethod::LengthConverted,
            );
            return ResolutionResult::resolved(token, code, ResolutionMethod::LengthConverted)
                .with_audit(record);
        }

        self.resolve_name(country, token, level, source)
    }

    /// Resolves and folds the audit event into `audit`, returning the code.
    pub fn resolve_into(
        &self,
        country: &str,
        token: &str,
        level: AdminLevel,
        source: &str,
        audit: &mut AuditBundle,
    ) -> Option<String> {
        let result = self.resolve(country, token, level, source);
        audit.record_result(&result);
        result.code
    }

    fn override_for(&self, country: &str, token: &str, level: AdminLevel) -> Option<String> {
        let code = self.config.mapping_for(country, token)?;
        let accepted = match level {
            AdminLevel::Country => self.index.contains(code, level),
            AdminLevel::Subdivision => self.index.parent_country(code) == Some(country),
        };
        if !accepted {
            debug!(country, token, code, "override ignored: code outside country");
            return None;
        }
        Some(code.to_string())
    }

    fn names_for(&self, country: &str, level: AdminLevel) -> Option<&'a NameIndex> {
        match level {
            AdminLevel::Country => {
                Some(self.index.country_name_index()).filter(|names| !names.is_empty())
            }
            AdminLevel::Subdivision => self.index.name_index(country),
        }
    }

    fn resolve_name(
        &self,
        country: &str,
        token: &str,
        level: AdminLevel,
        source: &str,
    ) -> ResolutionResult {
        let trimmed = token.trim();
        let ignored = || {
            ResolutionResult::unresolved(token).with_audit(AuditRecord::Ignored(AuditEntry::new(
                source,
                country,
                Some(trimmed.to_string()),
            )))
        };

        let Some(names) = self.names_for(country, level) else {
            return ResolutionResult::unresolved(token)
                .with_audit(AuditRecord::Ignored(AuditEntry::new(source, country, None)));
        };

        let normalized = normalize_name(trimmed);
        if normalized.is_empty() || self.ignore.contains(&normalized) {
            return ignored();
        }
        let alternative = self.replacements.apply(&normalized);
        let variants: Vec<&str> = if alternative == normalized || alternative.is_empty() {
            vec![normalized.as_str()]
        } else {
            vec![normalized.as_str(), alternative.as_str()]
        };

        for variant in &variants {
            if let Some(code) = names.get(variant) {
                return ResolutionResult::resolved(token, code, ResolutionMethod::Exact);
            }
        }

        if !self.config.is_fuzzy_country(country) {
            return ignored();
        }

        for variant in &variants {
            if let Some((name, code)) = names.iter().find(|(name, _)| name.contains(variant)) {
                trace!(source, country, token = trimmed, name, "substring hit");
                let record =
                    self.match_record(source, country, trimmed, code, ResolutionMethod::Substring);
                return ResolutionResult::resolved(token, code, ResolutionMethod::Substring)
                    .with_audit(record);
            }
        }

        let found = self
            .phonetics
            .find(names.names(), &normalized, variants.get(1).copied());
        match found.and_then(|m| names.entry(m.index).map(|entry| (m, entry))) {
            Some((m, (_, code))) => {
                debug!(
                    source,
                    country,
                    token = trimmed,
                    code,
                    distance = m.distance,
                    "phonetic match"
                );
                let record =
                    self.match_record(source, country, trimmed, code, ResolutionMethod::Phonetic);
                ResolutionResult::resolved(token, code, ResolutionMethod::Phonetic)
                    .with_audit(record)
            }
            None => ResolutionResult::unresolved(token).with_audit(AuditRecord::Error(
                AuditEntry::new(source, country, Some(trimmed.to_string())),
            )),
        }
    }

    fn match_record(
        &self,
        source: &str,
        country: &str,
        token: &str,
        code: &str,
        method: ResolutionMethod,
    ) -> AuditRecord {
        let resolved_name = self.index.display_name(code).unwrap_or(code).to_string();
        AuditRecord::Match(MatchRecord {
            source: source.to_string(),
            country: country.to_string(),
            token: token.to_string(),
            resolved_name,
            method,
        })
    }
}
