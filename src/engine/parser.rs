//! Rule file parser.
//!
//! Classifies every physical line of a rule file in a single top-to-bottom
//! pass. The only state carried between lines is the name of the current
//! `[section]`.
//!
//! ## Classification order
//!
//! ```text
//! trimmed line
//!   ├─ empty                        -> Blank
//!   ├─ starts with ';' or '#'       -> Comment
//!   ├─ "[name]" (len > 2)           -> Section   (current section = name)
//!   ├─ contains unescaped '='       -> KeyValue  (key / value split at first '=')
//!   └─ anything else                -> Other
//! ```
//!
//! After classification each non-blank, non-comment line is checked against the
//! dialect's outfit-rule criterion:
//!
//! - SPID: the line starts with `Outfit`, optional whitespace, then `=`.
//! - SkyPatcher: the line contains `filterByOutfits=` anywhere.
//!
//! A file that ends up with zero outfit rules is not a rule file for this engine
//! and is dropped (`None`), which is not an error.

use crate::syntax::{find_unescaped, has_filter};
use crate::{Dialect, LineKind, RuleFile, RuleLine};
use std::path::PathBuf;
use tracing::debug;

/// Parse `text` as a rule file of the given dialect.
///
/// Returns `None` when the file contains no outfit rules.
///
/// ```
/// use outfitter::{Dialect, parse_rule_text};
///
/// let text = "; outfits\nOutfit = 0x800~MyMod.esp|NONE|0x13BBF~Skyrim.esm\n";
/// let file = parse_rule_text("Guards_DISTR.ini", "/data/Guards_DISTR.ini", "Guards_DISTR.ini", Dialect::Spid, text)
///     .unwrap();
/// assert_eq!(file.outfit_rule_count, 1);
/// assert_eq!(file.lines.len(), 2);
/// ```
pub fn parse_rule_text(
    name: &str,
    full_path: impl Into<PathBuf>,
    relative_path: &str,
    dialect: Dialect,
    text: &str,
) -> Option<RuleFile> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = Vec::new();
    let mut current_section = String::new();
    let mut outfit_rule_count: u32 = 0;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        let (kind, key, value) = classify(trimmed);

        if kind == LineKind::Section {
            current_section = section_name(trimmed).to_string();
        }

        let is_outfit_rule = is_outfit_rule(dialect, kind, trimmed);
        if is_outfit_rule {
            outfit_rule_count += 1;
        }

        lines.push(RuleLine {
            line_number: u32::try_from(idx + 1).unwrap_or(u32::MAX),
            raw: raw.to_string(),
            kind,
            section: current_section.clone(),
            key,
            value,
            is_outfit_rule,
        });
    }

    if outfit_rule_count == 0 {
        debug!(file = relative_path, dialect = dialect.label(), lines = lines.len(), "no outfit rules, dropping file");
        return None;
    }

    debug!(file = relative_path, dialect = dialect.label(), outfit_rules = outfit_rule_count, "parsed rule file");

    Some(RuleFile {
        name: name.to_string(),
        full_path: full_path.into(),
        relative_path: relative_path.to_string(),
        dialect,
        lines,
        outfit_rule_count,
    })
}

fn classify(trimmed: &str) -> (LineKind, Option<String>, Option<String>) {
    if trimmed.is_empty() {
        return (LineKind::Blank, None, None);
    }
    if trimmed.starts_with(';') || trimmed.starts_with('#') {
        return (LineKind::Comment, None, None);
    }
    if is_section_header(trimmed) {
        return (LineKind::Section, None, None);
    }
    match find_unescaped(trimmed, '=') {
        Some(eq) => {
            let key = trimmed[..eq].trim().to_string();
            let value = trimmed[eq + 1..].trim().to_string();
            (LineKind::KeyValue, Some(key), Some(value))
        }
        None => (LineKind::Other, None, None),
    }
}

fn is_section_header(trimmed: &str) -> bool {
    trimmed.len() > 2 && trimmed.starts_with('[') && trimmed.ends_with(']')
}

fn section_name(trimmed: &str) -> &str {
    trimmed[1..trimmed.len() - 1].trim()
}

/// Whether a classified line assigns an outfit under `dialect`.
pub(crate) fn is_outfit_rule(dialect: Dialect, kind: LineKind, trimmed: &str) -> bool {
    if matches!(kind, LineKind::Blank | LineKind::Comment) {
        return false;
    }
    match dialect {
        Dialect::Spid => regex!(r"(?i)^outfit\s*=").is_match(trimmed),
        Dialect::SkyPatcher => has_filter(trimmed, "filterByOutfits"),
    }
}
