//! Name canonicalization used as the comparison key across sources.

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form of a human-entered name.
///
/// Lower-cases, strips diacritics (NFD + drop combining marks), removes
/// everything outside `[a-z0-9]` and whitespace, then collapses whitespace
/// runs to a single space and trims.
pub fn normalize(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        // U+FEFF separates words like any other space
        .map(|c| if c == '\u{feff}' { ' ' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_opt(name: Option<&str>) -> String {
    name.map(normalize).unwrap_or_default()
}

/// Given names and two surnames split out of a single full-name cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitName {
    pub nombres: String,
    pub apellido1: String,
    pub apellido2: String,
}

/// Split `"Juan Carlos Pérez Soto"` into given names and two surnames.
///
/// The last two tokens are the surnames; anything before them is the
/// given-name part. Two tokens are a given name plus one surname.
pub fn split_name(full_name: &str) -> SplitName {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => SplitName::default(),
        [only] => SplitName {
            nombres: (*only).to_string(),
            ..SplitName::default()
        },
        [first, last] => SplitName {
            nombres: (*first).to_string(),
            apellido1: (*last).to_string(),
            apellido2: String::new(),
        },
        [given @ .., ap1, ap2] => SplitName {
            nombres: given.join(" "),
            apellido1: (*ap1).to_string(),
            apellido2: (*ap2).to_string(),
        },
    }
}
