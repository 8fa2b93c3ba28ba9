//! Refined Soundex encoding and the last-resort phonetic matcher.

use rapidfuzz::distance::levenshtein;
use serde::{Deserialize, Serialize};

/// Default maximum phonetic distance for an accepted match.
pub const DEFAULT_THRESHOLD: usize = 2;

/// Refined Soundex: the first letter followed by the squeezed digit codes of
/// every letter, with `H` and `W` skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefinedSoundex;

impl RefinedSoundex {
    /// Encodes `word`; `None` when it contains no ASCII letter.
    ///
    /// ```
    /// use hdx_match::RefinedSoundex;
    ///
    /// assert_eq!(RefinedSoundex::encode("Kabul").as_deref(), Some("K30107"));
    /// assert_eq!(RefinedSoundex::encode("kaboul").as_deref(), Some("K30107"));
    /// assert_eq!(RefinedSoundex::encode("42"), None);
    /// ```
    pub fn encode(word: &str) -> Option<String> {
        let letters: Vec<char> = word
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let first = *letters.first()?;

        let mut code = String::with_capacity(letters.len() + 1);
        code.push(first);
        let mut last = None;
        for digit in letters.iter().filter_map(|&c| letter_code(c)) {
            if last != Some(digit) {
                code.push(digit);
                last = Some(digit);
            }
        }
        Some(code)
    }

    /// Levenshtein distance between the encodings of `a` and `b`.
    pub fn distance(a: &str, b: &str) -> Option<usize> {
        let a = Self::encode(a)?;
        let b = Self::encode(b)?;
        Some(levenshtein::distance(a.chars(), b.chars()))
    }
}

fn letter_code(c: char) -> Option<char> {
    let digit = match c {
        'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => '0',
        'B' | 'P' => '1',
        'F' | 'V' => '2',
        'C' | 'K' | 'S' => '3',
        'G' | 'J' => '4',
        'Q' | 'X' | 'Z' => '5',
        'D' | 'T' => '6',
        'L' => '7',
        'M' | 'N' => '8',
        'R' => '9',
        _ => return None,
    };
    Some(digit)
}

/// Alternate spellings of an indexed name probed during phonetic matching.
///
/// A name starting with `prefix` is also compared with the prefix swapped for
/// each of `replacements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixVariant {
    pub prefix: String,
    #[serde(default)]
    pub replacements: Vec<String>,
}

impl PrefixVariant {
    pub fn new(prefix: impl Into<String>, replacements: &[&str]) -> Self {
        Self {
            prefix: prefix.into(),
            replacements: replacements.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    /// The Arabic definite article rule: `al x` also tried as `ad x` and `x`.
    pub fn arabic_article() -> Self {
        Self::new("al ", &["ad ", ""])
    }

    fn variants<'a>(&'a self, name: &'a str) -> impl Iterator<Item = String> + 'a {
        name.strip_prefix(self.prefix.as_str())
            .into_iter()
            .flat_map(move |rest| self.replacements.iter().map(move |r| format!("{r}{rest}")))
    }
}

/// Best phonetic candidate found by [`PhoneticMatcher::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneticMatch {
    /// Position of the candidate in the input order.
    pub index: usize,
    pub distance: usize,
}

#[derive(Debug, Clone)]
pub struct PhoneticMatcher {
    threshold: usize,
    prefix_variants: Vec<PrefixVariant>,
}

impl Default for PhoneticMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, vec![PrefixVariant::arabic_article()])
    }
}

impl PhoneticMatcher {
    pub fn new(threshold: usize, prefix_variants: Vec<PrefixVariant>) -> Self {
        Self {
            threshold,
            prefix_variants,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Finds the candidate with the smallest phonetic distance to `token` or
    /// `alternative`, also probing the prefix variants of each candidate.
    ///
    /// Ties keep the earliest candidate. Returns `None` when the best distance
    /// exceeds the threshold or nothing could be encoded.
    pub fn find<'c>(
        &self,
        candidates: impl IntoIterator<Item = &'c str>,
        token: &str,
        alternative: Option<&str>,
    ) -> Option<PhoneticMatch> {
        let mut probes = Vec::with_capacity(2);
        probes.extend(RefinedSoundex::encode(token));
        if let Some(alt) = alternative.filter(|alt| *alt != token) {
            probes.extend(RefinedSoundex::encode(alt));
        }
        if probes.is_empty() {
            return None;
        }

        let mut best: Option<PhoneticMatch> = None;
        for (index, candidate) in candidates.into_iter().enumerate() {
            let spellings = std::iter::once(candidate.to_string()).chain(
                self.prefix_variants
                    .iter()
                    .flat_map(|variant| variant.variants(candidate)),
            );
            for spelling in spellings {
                let Some(encoded) = RefinedSoundex::encode(&spelling) else {
                    continue;
                };
                for probe in &probes {
                    let distance = levenshtein::distance(probe.chars(), encoded.chars());
                    if best.is_none_or(|b| distance < b.distance) {
                        best = Some(PhoneticMatch { index, distance });
                    }
                }
            }
        }
        best.filter(|m| m.distance <= self.threshold)
    }
}
