//! Operator-maintained tables that steer admin resolution.

use std::collections::BTreeMap;

use hdx_model::HdxError;
use serde::{Deserialize, Serialize};

use crate::phonetic::{DEFAULT_THRESHOLD, PrefixVariant};

/// Resolver configuration, usually the `[resolver]` table of a run config.
///
/// ```toml
/// phonetic_threshold = 2
/// fuzzy_ignore = ["unknown", "nationwide"]
///
/// [name_mappings]
/// "Kabul City" = "AF0101"
/// "AFG|Hirat" = "AF0201"
///
/// [name_replacements]
/// "sheikh" = "shaikh"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Raw token → canonical code. Keys may be scoped as `COUNTRY|token`.
    pub name_mappings: BTreeMap<String, String>,
    /// Substring replacements producing the alternative normalized token.
    pub name_replacements: BTreeMap<String, String>,
    /// Tokens known not to be admin names (compared case-insensitively).
    pub fuzzy_ignore: Vec<String>,
    /// When set, substring and phonetic matching only run for these countries.
    pub fuzzy_countries: Option<Vec<String>>,
    /// Alternate spellings of indexed names probed by phonetic matching.
    pub prefix_variants: Vec<PrefixVariant>,
    pub phonetic_threshold: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name_mappings: BTreeMap::new(),
            name_replacements: BTreeMap::new(),
            fuzzy_ignore: Vec::new(),
            fuzzy_countries: None,
            prefix_variants: vec![PrefixVariant::arabic_article()],
            phonetic_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, HdxError> {
        toml::from_str(text)
            .map_err(|e| HdxError::configuration(format!("invalid resolver config: {e}")))
    }

    /// Looks up an override for `token`, preferring the country-scoped key.
    pub fn mapping_for(&self, country: &str, token: &str) -> Option<&str> {
        self.name_mappings
            .get(&format!("{country}|{token}"))
            .or_else(|| self.name_mappings.get(token))
            .map(String::as_str)
    }

    pub fn is_fuzzy_country(&self, country: &str) -> bool {
        self.fuzzy_countries
            .as_ref()
            .is_none_or(|countries| countries.iter().any(|c| c == country))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_article_rule() {
        let config = ResolverConfig::from_toml_str("").expect("empty config");
        assert_eq!(config.phonetic_threshold, 2);
        assert_eq!(config.prefix_variants, vec![PrefixVariant::arabic_article()]);
        assert!(config.is_fuzzy_country("AFG"));
    }

    #[test]
    fn scoped_mapping_wins() {
        let config = ResolverConfig::from_toml_str(
            r#"
            fuzzy_countries = ["SYR"]

            [name_mappings]
            "Hirat" = "XX01"
            "AFG|Hirat" = "AF0201"
            "#,
        )
        .expect("parse config");
        assert_eq!(config.mapping_for("AFG", "Hirat"), Some("AF0201"));
        assert_eq!(config.mapping_for("SYR", "Hirat"), Some("XX01"));
        assert!(!config.is_fuzzy_country("AFG"));
    }

    #[test]
    fn bad_toml_is_a_configuration_error() {
        let err = ResolverConfig::from_toml_str("phonetic_threshold = \"two\"").unwrap_err();
        assert!(err.is_configuration());
    }
}
