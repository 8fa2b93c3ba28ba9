//! PCode format conversion between subdivision coding schemes.
//!
//! Countries register one code length (4, 5 or 6). Sources often publish
//! codes in another country's convention: ISO2 vs ISO3 prefix, two vs three
//! digit sequence numbers. A converted code is only ever returned when it
//! exists in the index and belongs to the requested country.

use std::sync::LazyLock;

use hdx_reference::AdminIndex;
use regex::Regex;

static PCODE_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2,3})([0-9]+)$").ok());

/// Lengths a PCode-shaped token may have to be considered for conversion.
const CONVERTIBLE_LENGTHS: std::ops::RangeInclusive<usize> = 4..=6;

/// Splits `token` into its alphabetic country prefix and digit tail.
fn split_pcode(token: &str) -> Option<(&str, &str)> {
    let caps = PCODE_SHAPE.as_ref()?.captures(token)?;
    let prefix = caps.get(1)?.as_str();
    let digits = caps.get(2)?.as_str();
    Some((prefix, digits))
}

/// Last `width` digits of `digits`, left-padded with zeros when shorter.
fn fit_digits(digits: &str, width: usize) -> String {
    if digits.len() >= width {
        digits[digits.len() - width..].to_string()
    } else {
        format!("{digits:0>width$}")
    }
}

/// Candidate codes for `token` in the country's registered format.
///
/// Order: the registered prefix convention for the target length
/// (4 → ISO2 + 2 digits, 5 → ISO2 + 3 digits, 6 → ISO3 + 3 digits), then the
/// same digits under the other prefix filling the target length.
pub fn conversion_candidates(iso2: &str, iso3: &str, digits: &str, target: usize) -> Vec<String> {
    let (primary, secondary) = if target == 6 { (iso3, iso2) } else { (iso2, iso3) };
    [primary, secondary]
        .into_iter()
        .filter(|prefix| !prefix.is_empty() && prefix.len() < target)
        .map(|prefix| format!("{prefix}{}", fit_digits(digits, target - prefix.len())))
        .collect()
}

/// Converts a subdivision code of the wrong length into the format registered
/// for `country`.
///
/// Returns `None` unless the token is PCode-shaped, its length is 4 to 6 and
/// differs from the registered length, and a converted code exists in the
/// index under `country`. As a last step, a shorter token that is a prefix of
/// exactly one of the country's codes converts to that code.
pub fn convert_code_length(index: &AdminIndex, country: &str, token: &str) -> Option<String> {
    let token = token.trim().to_ascii_uppercase();
    let target = index.code_length(country)?;
    if token.len() == target || !CONVERTIBLE_LENGTHS.contains(&token.len()) {
        return None;
    }
    let (prefix, digits) = split_pcode(&token)?;

    let (iso2, iso3) = match prefix.len() {
        2 => (prefix.to_string(), index.iso3_for_iso2(prefix)?.to_string()),
        _ => (
            index.iso2(prefix).unwrap_or_default().to_string(),
            prefix.to_string(),
        ),
    };
    if iso3 != country {
        return None;
    }

    let belongs = |code: &str| index.parent_country(code) == Some(country);
    if let Some(found) = conversion_candidates(&iso2, &iso3, digits, target)
        .into_iter()
        .find(|candidate| belongs(candidate))
    {
        return Some(found);
    }

    if token.len() < target {
        let mut extensions = index
            .subdivisions_of(country)
            .iter()
            .filter(|code| code.starts_with(&token));
        if let (Some(only), None) = (extensions.next(), extensions.next()) {
            return Some(only.clone());
        }
    }
    None
}

/// ISO2 → ISO3 for country-level tokens.
pub fn convert_country_code(index: &AdminIndex, token: &str) -> Option<String> {
    let token = token.trim();
    if token.len() != 2 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    index.iso3_for_iso2(token).map(ToString::to_string)
}
