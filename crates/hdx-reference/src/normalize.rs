#![deny(unsafe_code)]

//! Name normalization shared by index construction and token lookup.

use deunicode::deunicode_char;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalizes an admin name for lookup.
///
/// Decomposes to NFD, strips combining marks, transliterates what is left to
/// ASCII, drops apostrophes, replaces punctuation with a space, then
/// lower-cases and collapses whitespace.
///
/// ```
/// use hdx_reference::normalize_name;
///
/// assert_eq!(normalize_name("  Hérat "), "herat");
/// assert_eq!(normalize_name("Nord-Ouest"), "nord ouest");
/// assert_eq!(normalize_name("Dar'a"), "dara");
/// assert_eq!(normalize_name("Şanlıurfa"), "sanliurfa");
/// ```
pub fn normalize_name(raw: &str) -> String {
    let mut ascii = String::with_capacity(raw.len());
    for ch in raw.nfd() {
        if is_combining_mark(ch) || is_apostrophe(ch) {
            continue;
        }
        if ch.is_ascii() {
            push_ascii(&mut ascii, ch);
            continue;
        }
        match deunicode_char(ch) {
            Some(transliterated) => {
                for out in transliterated.chars() {
                    push_ascii(&mut ascii, out);
                }
            }
            None => ascii.push(' '),
        }
    }
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_ascii(out: &mut String, ch: char) {
    if is_apostrophe(ch) {
        return;
    }
    if ch.is_ascii_alphanumeric() {
        out.push(ch.to_ascii_lowercase());
    } else {
        out.push(' ');
    }
}

fn is_apostrophe(ch: char) -> bool {
    matches!(ch, '\'' | '`' | '\u{2019}' | '\u{2018}' | '\u{02bc}')
}
