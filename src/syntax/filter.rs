//! Filter clause codec.
//!
//! A clause line is a `:`-joined sequence of `key=value` pairs:
//!
//! ```text
//! filterByNpcs=Skyrim.esm|0x13BBF,Skyrim.esm|0x1B07A:filterByGender=female:outfitDefault=MyMod.esp|0x800
//! └────────────── key=value ───────────────────────┘ └──── clause ──────┘ └──────── clause ──────────┘
//! ```
//!
//! Keys match case-insensitively anywhere in the line (first occurrence wins).
//! A value runs until the next unescaped `:` (`\:` does not terminate it) or the
//! end of the line, and is trimmed.
//!
//! All helpers are total: they never fail, and list helpers drop what they
//! cannot use instead of rejecting the whole line.

use super::identifier::RecordId;
use tracing::debug;

/// Byte index of the first `needle` in `haystack` not preceded by a backslash.
pub(crate) fn find_unescaped(haystack: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in haystack.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
        } else if ch == needle {
            return Some(idx);
        }
    }
    None
}

/// Byte offset right after the first case-insensitive `key=` in `line`.
///
/// ASCII lowercasing keeps byte offsets stable, so the index found in the
/// folded copy is valid in the original line.
fn value_start(line: &str, key: &str) -> Option<usize> {
    let needle = format!("{}=", key.to_ascii_lowercase());
    line.to_ascii_lowercase().find(&needle).map(|idx| idx + needle.len())
}

/// Value of the first `key=` clause, trimmed.
///
/// Returns `None` when the key is absent and `Some("")` when it is present with
/// an empty value.
///
/// ```
/// use outfitter::extract_value;
///
/// let line = "filterByNpcs=Skyrim.esm|0x1234:outfitDefault=MyMod.esp|0x800";
/// assert_eq!(extract_value(line, "FILTERBYNPCS"), Some("Skyrim.esm|0x1234"));
/// assert_eq!(extract_value(line, "filterByRaces"), None);
/// ```
pub fn extract_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = value_start(line, key)?;
    let rest = &line[start..];
    let end = find_unescaped(rest, ':').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Comma-separated values of `key`, trimmed, with empty pieces removed.
pub fn extract_values<'a>(line: &'a str, key: &str) -> Vec<&'a str> {
    match extract_value(line, key) {
        Some(value) => value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect(),
        None => Vec::new(),
    }
}

/// The `filterByGender` clause: `Some(true)` for female, `Some(false)` for male.
///
/// Anything else (absent, empty, unknown word) is `None`, which means "no
/// gender restriction" and must not be read as male.
pub fn parse_gender_filter(line: &str) -> Option<bool> {
    let value = extract_value(line, "filterByGender")?;
    if value.eq_ignore_ascii_case("female") {
        Some(true)
    } else if value.eq_ignore_ascii_case("male") {
        Some(false)
    } else {
        None
    }
}

/// Every value of `key` that parses as a [`RecordId`]; the rest are dropped.
pub fn parse_identifier_list(line: &str, key: &str) -> Vec<RecordId> {
    extract_values(line, key)
        .into_iter()
        .filter_map(|token| match RecordId::parse(token) {
            Ok(id) => Some(id),
            Err(err) => {
                debug!(key, token, %err, "dropping unparseable identifier");
                None
            }
        })
        .collect()
}

/// Whether `key=` appears anywhere in the line, case-insensitively.
pub fn has_filter(line: &str, key: &str) -> bool {
    value_start(line, key).is_some()
}
