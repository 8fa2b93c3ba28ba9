#![deny(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A country in the reference dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// ISO3 code.
    pub code: String,
    #[serde(default)]
    pub iso2: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Official length of this country's subdivision codes (commonly 4, 5 or 6).
    #[serde(default)]
    pub code_length: Option<usize>,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl CountryRecord {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            iso2: None,
            name: None,
            code_length: None,
            regions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_iso2(mut self, iso2: impl Into<String>) -> Self {
        self.iso2 = Some(iso2.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = Some(length);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }
}

/// A first-level subdivision: `(countryCode, subdivisionCode, subdivisionName)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdivisionRecord {
    pub country: String,
    pub code: String,
    pub name: String,
}

impl SubdivisionRecord {
    pub fn new(
        country: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Raw reference dataset the [`AdminIndex`](crate::AdminIndex) is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub countries: Vec<CountryRecord>,
    #[serde(default)]
    pub subdivisions: Vec<SubdivisionRecord>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds reference data from subdivision rows alone.
    ///
    /// Countries are implied by the rows and their code lengths are taken
    /// from the first subdivision code seen for each country.
    pub fn from_subdivisions(subdivisions: Vec<SubdivisionRecord>) -> Self {
        let mut data = Self {
            countries: Vec::new(),
            subdivisions,
        };
        data.ensure_countries();
        data.infer_code_lengths();
        data
    }

    #[must_use]
    pub fn with_country(mut self, country: CountryRecord) -> Self {
        self.countries.push(country);
        self
    }

    #[must_use]
    pub fn with_subdivision(mut self, subdivision: SubdivisionRecord) -> Self {
        self.subdivisions.push(subdivision);
        self
    }

    /// Adds a bare country record for every country referenced only by subdivisions.
    pub fn ensure_countries(&mut self) {
        for subdivision in &self.subdivisions {
            let country = subdivision.country.trim();
            if country.is_empty() || self.countries.iter().any(|c| c.code == country) {
                continue;
            }
            self.countries.push(CountryRecord::new(country));
        }
    }

    /// Fills missing country code lengths from the first subdivision code seen.
    ///
    /// Countries whose length is already registered are left alone, so an
    /// inconsistent subdivision still fails the index build.
    pub fn infer_code_lengths(&mut self) {
        let mut first_lengths: BTreeMap<&str, usize> = BTreeMap::new();
        for subdivision in &self.subdivisions {
            first_lengths
                .entry(subdivision.country.trim())
                .or_insert_with(|| subdivision.code.trim().len());
        }
        for country in &mut self.countries {
            if country.code_length.is_none() {
                country.code_length = first_lengths.get(country.code.trim()).copied();
            }
        }
    }
}
