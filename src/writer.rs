//! Rule writer.
//!
//! Serialises entries back into rule lines that the parser reads as the same
//! entries:
//!
//! ```text
//! SkyPatcher: filterByNpcs=Skyrim.esm|0x1234:filterByGender=female:filterByOutfits=MyMod.esp|0x800:chance=50
//! SPID:       Outfit = 0x800~MyMod.esp|NONE|0x1234~Skyrim.esm|NONE|F/-U|NONE|50
//! ```
//!
//! SPID has no `|` left for the package-first notation, so its identifiers are
//! written id-first. SPID targets go into the form-filter position; reading
//! them back needs a record source that knows each record's kind. Commas in a
//! SPID position mean OR, so an entry that targets more than one dimension (an
//! AND) has no single SPID line and is skipped with a warning.

use crate::error::{OutfitterError, Result};
use crate::{Dialect, DistributionEntry, RecordId};
use std::path::Path;
use tracing::{debug, warn};

/// One rule line for `entry`, or `None` when there is no outfit to write or
/// the dialect cannot express its targets.
pub fn write_entry(entry: &DistributionEntry, dialect: Dialect) -> Option<String> {
    let Some(outfit) = &entry.outfit else {
        if !entry.is_empty() {
            warn!(dialect = dialect.label(), "entry has targets but no outfit, not written");
        }
        return None;
    };
    if dialect == Dialect::Spid && entry.target_mask().iter().count() > 1 {
        warn!(outfit = %outfit, targets = ?entry.target_mask(), "SPID cannot AND target dimensions, not written");
        return None;
    }
    Some(match dialect {
        Dialect::SkyPatcher => skypatcher_line(entry, outfit),
        Dialect::Spid => spid_line(entry, outfit),
    })
}

/// Every writable entry, one line each, newline-terminated.
pub fn write_entries(entries: &[DistributionEntry], dialect: Dialect) -> String {
    let mut out = String::new();
    for line in entries.iter().filter_map(|entry| write_entry(entry, dialect)) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Write `entries` to `path`, replacing any existing file.
pub fn write_file(path: impl AsRef<Path>, entries: &[DistributionEntry], dialect: Dialect) -> Result<()> {
    let path = path.as_ref();
    let text = write_entries(entries, dialect);
    std::fs::write(path, &text).map_err(|source| OutfitterError::Io { path: path.to_path_buf(), source })?;
    debug!(path = %path.display(), bytes = text.len(), "wrote rule file");
    Ok(())
}

fn skypatcher_line(entry: &DistributionEntry, outfit: &RecordId) -> String {
    let traits = &entry.traits;
    if traits.fields()[1..].iter().any(Option::is_some) {
        warn!(outfit = %outfit, "SkyPatcher has no syntax for non-gender trait filters, dropping them");
    }

    let mut clauses = Vec::new();
    for (key, targets) in [
        ("filterByNpcs", &entry.npc_targets),
        ("filterByFactions", &entry.faction_targets),
        ("filterByKeywords", &entry.keyword_targets),
        ("filterByRaces", &entry.race_targets),
    ] {
        if !targets.is_empty() {
            let ids: Vec<String> = targets.iter().map(RecordId::to_string).collect();
            clauses.push(format!("{key}={}", ids.join(",")));
        }
    }
    match traits.gender {
        Some(true) => clauses.push("filterByGender=female".to_string()),
        Some(false) => clauses.push("filterByGender=male".to_string()),
        None => {}
    }
    clauses.push(format!("filterByOutfits={outfit}"));
    if let Some(chance) = entry.chance {
        clauses.push(format!("chance={chance}"));
    }
    clauses.join(":")
}

fn spid_line(entry: &DistributionEntry, outfit: &RecordId) -> String {
    let forms: Vec<String> = [&entry.npc_targets, &entry.faction_targets, &entry.keyword_targets, &entry.race_targets]
        .into_iter()
        .flatten()
        .map(RecordId::to_tilde_string)
        .collect();

    let mut positions = vec![
        outfit.to_tilde_string(),
        none_if_empty(Vec::new()),
        none_if_empty(forms),
        none_if_empty(Vec::new()),
        spid_traits(entry),
        none_if_empty(Vec::new()),
        entry.chance.map(|c| c.to_string()).unwrap_or_else(|| "NONE".to_string()),
    ];
    while positions.len() > 1 && positions.last().is_some_and(|p| p == "NONE") {
        positions.pop();
    }
    format!("Outfit = {}", positions.join("|"))
}

fn spid_traits(entry: &DistributionEntry) -> String {
    let mut tokens = Vec::new();
    match entry.traits.gender {
        Some(true) => tokens.push("F".to_string()),
        Some(false) => tokens.push("M".to_string()),
        None => {}
    }
    for (flag, value) in ["U", "S", "C", "L", "T", "D"].iter().zip(&entry.traits.fields()[1..]) {
        match value {
            Some(true) => tokens.push(flag.to_string()),
            Some(false) => tokens.push(format!("-{flag}")),
            None => {}
        }
    }
    if tokens.is_empty() { "NONE".to_string() } else { tokens.join("/") }
}

fn none_if_empty(items: Vec<String>) -> String {
    if items.is_empty() { "NONE".to_string() } else { items.join(",") }
}
