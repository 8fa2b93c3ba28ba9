#![deny(unsafe_code)]

//! The frozen admin hierarchy.
//!
//! [`AdminIndex::build`] validates reference data once; the resulting index
//! has no mutating methods and is shared by reference across resolvers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use hdx_model::{AdminLevel, AdminUnit};
use tracing::{debug, info};

use crate::error::ReferenceError;
use crate::name_index::NameIndex;
use crate::records::ReferenceData;

#[derive(Debug, Clone)]
struct CountryEntry {
    unit: AdminUnit,
    iso2: Option<String>,
    code_length: Option<usize>,
    regions: Vec<String>,
    /// Subdivision codes in reference order.
    subdivisions: Vec<String>,
}

/// Canonical country → subdivision hierarchy with name and code lookups.
#[derive(Debug, Clone, Default)]
pub struct AdminIndex {
    countries: BTreeMap<String, CountryEntry>,
    subdivisions: BTreeMap<String, AdminUnit>,
    country_codes: BTreeSet<String>,
    subdivision_codes: BTreeSet<String>,
    iso2_to_iso3: HashMap<String, String>,
    name_indexes: HashMap<String, NameIndex>,
    country_names: NameIndex,
    regions: BTreeMap<String, BTreeSet<String>>,
}

impl AdminIndex {
    /// Validates `data` and freezes it into an index.
    ///
    /// Fails when a code is duplicated, a subdivision references an unknown
    /// country, a country with subdivisions has no registered code length, or
    /// a subdivision code disagrees with its country's registered length.
    pub fn build(data: ReferenceData) -> Result<Self, ReferenceError> {
        let mut index = Self::default();

        for record in data.countries {
            let code = record.code.trim().to_string();
            if code.is_empty() {
                return Err(ReferenceError::EmptyField {
                    field: "country code",
                });
            }
            if index.countries.contains_key(&code) {
                return Err(ReferenceError::DuplicateCode { code });
            }
            let name = record
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(code.as_str())
                .to_string();
            index.country_names.insert(&name, code.clone());
            let iso2 = record
                .iso2
                .map(|iso2| iso2.trim().to_ascii_uppercase())
                .filter(|iso2| !iso2.is_empty());
            for region in &record.regions {
                index
                    .regions
                    .entry(region.trim().to_string())
                    .or_default()
                    .insert(code.clone());
            }
            index.country_codes.insert(code.clone());
            index.countries.insert(
                code.clone(),
                CountryEntry {
                    unit: AdminUnit::country(code, name),
                    iso2,
                    code_length: record.code_length,
                    regions: record.regions,
                    subdivisions: Vec::new(),
                },
            );
        }

        for record in data.subdivisions {
            let country = record.country.trim().to_string();
            let code = record.code.trim().to_string();
            let name = record.name.trim().to_string();
            if code.is_empty() {
                return Err(ReferenceError::EmptyField {
                    field: "subdivision code",
                });
            }
            if name.is_empty() {
                return Err(ReferenceError::EmptyField {
                    field: "subdivision name",
                });
            }
            if index.country_codes.contains(&code) || index.subdivisions.contains_key(&code) {
                return Err(ReferenceError::DuplicateCode { code });
            }
            let Some(entry) = index.countries.get_mut(&country) else {
                return Err(ReferenceError::UnknownCountry { code, country });
            };
            let Some(expected) = entry.code_length else {
                return Err(ReferenceError::MissingCodeLength { country });
            };
            let actual = code.len();
            if actual != expected {
                return Err(ReferenceError::InconsistentCodeLength {
                    code,
                    country,
                    expected,
                    actual,
                });
            }
            if entry.iso2.is_none() {
                entry.iso2 = derive_iso2(&code);
            }
            entry.subdivisions.push(code.clone());
            if !index
                .name_indexes
                .entry(country.clone())
                .or_default()
                .insert(&name, code.clone())
            {
                debug!(country = %country, code = %code, name = %name, "duplicate subdivision name ignored");
            }
            index.subdivision_codes.insert(code.clone());
            index
                .subdivisions
                .insert(code.clone(), AdminUnit::subdivision(code, name, country));
        }

        for (iso3, entry) in &index.countries {
            if let Some(iso2) = &entry.iso2 {
                index
                    .iso2_to_iso3
                    .entry(iso2.clone())
                    .or_insert_with(|| iso3.clone());
            }
        }

        info!(
            countries = index.country_codes.len(),
            subdivisions = index.subdivision_codes.len(),
            regions = index.regions.len(),
            "admin index built"
        );
        Ok(index)
    }

    pub fn country_codes(&self) -> &BTreeSet<String> {
        &self.country_codes
    }

    pub fn subdivision_codes(&self) -> &BTreeSet<String> {
        &self.subdivision_codes
    }

    /// Registered subdivision code length of `country`.
    pub fn code_length(&self, country: &str) -> Option<usize> {
        self.countries.get(country).and_then(|entry| entry.code_length)
    }

    /// Subdivision name index of `country`; absent when it has no subdivisions.
    pub fn name_index(&self, country: &str) -> Option<&NameIndex> {
        self.name_indexes
            .get(country)
            .filter(|names| !names.is_empty())
    }

    /// Normalized country name → ISO3.
    pub fn country_name_index(&self) -> &NameIndex {
        &self.country_names
    }

    /// Display name of a country or subdivision code.
    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.unit(code).map(|unit| unit.name.as_str())
    }

    pub fn parent_country(&self, subdivision: &str) -> Option<&str> {
        self.subdivisions
            .get(subdivision)
            .and_then(|unit| unit.parent.as_deref())
    }

    pub fn iso2(&self, country: &str) -> Option<&str> {
        self.countries
            .get(country)
            .and_then(|entry| entry.iso2.as_deref())
    }

    pub fn iso3_for_iso2(&self, iso2: &str) -> Option<&str> {
        self.iso2_to_iso3
            .get(&iso2.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn regions_of(&self, country: &str) -> &[String] {
        self.countries
            .get(country)
            .map_or(&[], |entry| entry.regions.as_slice())
    }

    pub fn countries_in_region(&self, region: &str) -> impl Iterator<Item = &str> {
        self.regions
            .get(region)
            .into_iter()
            .flat_map(|codes| codes.iter().map(String::as_str))
    }

    /// Region names in sorted order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Subdivision codes of `country` in reference order.
    pub fn subdivisions_of(&self, country: &str) -> &[String] {
        self.countries
            .get(country)
            .map_or(&[], |entry| entry.subdivisions.as_slice())
    }

    pub fn unit(&self, code: &str) -> Option<&AdminUnit> {
        self.countries
            .get(code)
            .map(|entry| &entry.unit)
            .or_else(|| self.subdivisions.get(code))
    }

    /// True when `code` is a canonical code at `level`.
    pub fn contains(&self, code: &str, level: AdminLevel) -> bool {
        match level {
            AdminLevel::Country => self.country_codes.contains(code),
            AdminLevel::Subdivision => self.subdivision_codes.contains(code),
        }
    }
}

/// ISO2 prefix of a PCode such as `AF0101`.
fn derive_iso2(code: &str) -> Option<String> {
    let prefix: String = code.chars().take_while(char::is_ascii_alphabetic).collect();
    (prefix.len() == 2).then(|| prefix.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso2_is_derived_from_two_letter_prefixes_only() {
        assert_eq!(derive_iso2("AF0101"), Some("AF".to_string()));
        assert_eq!(derive_iso2("SYR01"), None);
        assert_eq!(derive_iso2("0101"), None);
    }
}
