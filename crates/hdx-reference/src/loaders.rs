#![deny(unsafe_code)]

//! CSV loaders for the reference tables.
//!
//! Subdivisions: `iso3,pcode,name`. Countries: `iso3,iso2,name,code_length,regions`
//! where `regions` is a `|`-separated list. Column order does not matter.

use std::path::Path;

use tracing::debug;

use crate::error::ReferenceError;
use crate::records::{CountryRecord, ReferenceData, SubdivisionRecord};

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn required_index(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, ReferenceError> {
    header_index(headers, name).ok_or_else(|| ReferenceError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

fn get_string(row: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parses the subdivision table.
pub fn load_subdivisions_csv(path: &Path) -> Result<Vec<SubdivisionRecord>, ReferenceError> {
    let bytes = std::fs::read(path).map_err(|e| ReferenceError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| ReferenceError::csv(path, &e))?
        .clone();

    let idx_country = required_index(&headers, "iso3", path)?;
    let idx_code = required_index(&headers, "pcode", path)?;
    let idx_name = required_index(&headers, "name", path)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ReferenceError::csv(path, &e))?;
        let (Some(country), Some(code), Some(name)) = (
            get_string(&row, Some(idx_country)),
            get_string(&row, Some(idx_code)),
            get_string(&row, Some(idx_name)),
        ) else {
            debug!(path = %path.display(), "skipping incomplete subdivision row");
            continue;
        };
        records.push(SubdivisionRecord::new(country, code, name));
    }
    Ok(records)
}

/// Parses the country table. Only `iso3` is required.
pub fn load_countries_csv(path: &Path) -> Result<Vec<CountryRecord>, ReferenceError> {
    let bytes = std::fs::read(path).map_err(|e| ReferenceError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| ReferenceError::csv(path, &e))?
        .clone();

    let idx_code = required_index(&headers, "iso3", path)?;
    let idx_iso2 = header_index(&headers, "iso2");
    let idx_name = header_index(&headers, "name");
    let idx_length = header_index(&headers, "code_length");
    let idx_regions = header_index(&headers, "regions");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ReferenceError::csv(path, &e))?;
        let Some(code) = get_string(&row, Some(idx_code)) else {
            continue;
        };
        let code_length = match get_string(&row, idx_length) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| ReferenceError::Csv {
                path: path.to_path_buf(),
                message: format!("invalid code_length '{raw}' for {code}"),
            })?),
            None => None,
        };
        let regions = get_string(&row, idx_regions)
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        records.push(CountryRecord {
            code,
            iso2: get_string(&row, idx_iso2),
            name: get_string(&row, idx_name),
            code_length,
            regions,
        });
    }
    Ok(records)
}

/// Loads subdivisions and, when given, the country table.
///
/// Countries referenced only by subdivisions are added, and missing code
/// lengths are inferred from the subdivision codes.
pub fn load_reference(
    subdivisions: &Path,
    countries: Option<&Path>,
) -> Result<ReferenceData, ReferenceError> {
    let mut data = ReferenceData {
        countries: match countries {
            Some(path) => load_countries_csv(path)?,
            None => Vec::new(),
        },
        subdivisions: load_subdivisions_csv(subdivisions)?,
    };
    data.ensure_countries();
    data.infer_code_lengths();
    Ok(data)
}
