//! Entry extraction.
//!
//! Turns the outfit-rule lines of a [`RuleFile`] into [`SourcedEntry`] values.
//!
//! ## SkyPatcher
//!
//! Every value is already an identifier, so extraction is a direct read of the
//! clause keys:
//!
//! ```text
//! filterByNpcs / filterByFactions / filterByKeywords / filterByRaces  -> targets
//! filterByGender                                                      -> gender
//! outfitDefault (falls back to filterByOutfits)                       -> outfit
//! chance                                                              -> chance
//! ```
//!
//! A malformed identifier in a target list is dropped; the rest of the list
//! still applies.
//!
//! ## SPID
//!
//! The value of `Outfit = ...` is split on `|` into fixed positions:
//!
//! ```text
//! 1 outfit | 2 string filters | 3 form filters | 4 levels | 5 traits | 6 count | 7 chance
//! ```
//!
//! The outfit may also be written package-first (`MyMod.esp|0x800`); that pair
//! is rejoined before the remaining positions are read.
//!
//! String filters are editor keys and form filters are identifiers; both are
//! sorted into target dimensions by asking the [`RecordSource`] what kind of
//! record they name. Within one position commas mean OR, while separate target
//! dimensions of an entry are AND-ed, so a position is only taken as targets
//! when all of its tokens land in one dimension that no other position already
//! filled. Anything else (unknown keys, `-` exclusions, `+` combinations,
//! mixed-dimension positions, level filters) is kept on the entry as an
//! unresolved filter.

use crate::records::{RecordKind, RecordSource};
use crate::syntax::{extract_value, parse_gender_filter, parse_identifier_list};
use crate::{Dialect, DistributionEntry, EntryOrigin, RecordId, RuleFile, RuleLine, SourcedEntry, TraitFilters};
use std::collections::BTreeSet;
use tracing::debug;

const SKYPATCHER_TARGETS: [(&str, RecordKind); 4] = [
    ("filterByNpcs", RecordKind::Npc),
    ("filterByFactions", RecordKind::Faction),
    ("filterByKeywords", RecordKind::Keyword),
    ("filterByRaces", RecordKind::Race),
];

/// Extract one entry per outfit-rule line of `file`, in line order.
pub fn entries_from_file<R: RecordSource + ?Sized>(file: &RuleFile, records: &R) -> Vec<SourcedEntry> {
    let entries: Vec<SourcedEntry> = file
        .outfit_rules()
        .filter_map(|line| {
            let origin = EntryOrigin {
                relative_path: file.relative_path.clone(),
                dialect: file.dialect,
                line_number: line.line_number,
            };
            match file.dialect {
                Dialect::SkyPatcher => Some(skypatcher_entry(line.raw.trim(), origin)),
                Dialect::Spid => spid_entry(line, origin, records),
            }
        })
        .collect();

    debug!(file = %file.relative_path, entries = entries.len(), "extracted entries");
    entries
}

// --- SkyPatcher -----------------------------------------------------------------

fn skypatcher_entry(line: &str, origin: EntryOrigin) -> SourcedEntry {
    let mut sourced = SourcedEntry::new(DistributionEntry::default(), origin);

    for (key, kind) in SKYPATCHER_TARGETS {
        if let Some(targets) = target_set(&mut sourced.entry, kind) {
            targets.extend(parse_identifier_list(line, key));
        }
    }

    sourced.entry.traits.gender = parse_gender_filter(line);
    sourced.entry.outfit = parse_identifier_list(line, "outfitDefault")
        .into_iter()
        .next()
        .or_else(|| parse_identifier_list(line, "filterByOutfits").into_iter().next());
    sourced.entry.chance = extract_value(line, "chance").and_then(parse_chance);

    sourced
}

// --- SPID -----------------------------------------------------------------------

fn spid_entry<R: RecordSource + ?Sized>(line: &RuleLine, origin: EntryOrigin, records: &R) -> Option<SourcedEntry> {
    let value = line.value.as_deref()?;
    let (outfit, rest) = split_outfit(value);
    // Positions 2..=7, so index 0 is the string filters.
    let positions: Vec<Option<&str>> = rest.map(|r| r.split('|').map(position).collect()).unwrap_or_default();
    let at = |idx: usize| positions.get(idx).copied().flatten();

    let mut sourced = SourcedEntry::new(DistributionEntry::default(), origin);

    if let Some(outfit) = position(&outfit) {
        sourced.entry.outfit = spid_outfit(outfit, records);
        if sourced.entry.outfit.is_none() {
            debug!(file = %sourced.origin.relative_path, line = sourced.origin.line_number, outfit, "unknown outfit");
            sourced.unresolved_filters.push(outfit.to_string());
        }
    }
    if let Some(strings) = at(0) {
        filter_position(&mut sourced, strings, |key| records.lookup_editor_key(key));
    }
    if let Some(forms) = at(1) {
        filter_position(&mut sourced, forms, |text| match RecordId::parse(text) {
            Ok(id) => records.record_kind(&id).map(|kind| (id, kind)),
            Err(_) => records.lookup_editor_key(text),
        });
    }
    if let Some(levels) = at(2) {
        unresolved(&mut sourced, levels);
    }
    if let Some(traits) = at(3) {
        sourced.entry.traits = parse_traits(traits, &mut sourced.unresolved_filters);
    }
    sourced.entry.chance = at(5).and_then(parse_chance);

    Some(sourced)
}

/// Split the outfit position off a SPID value, rejoining a package-first
/// identifier (`MyMod.esp|0x800`) that the `|` split would otherwise break.
fn split_outfit(value: &str) -> (String, Option<&str>) {
    let mut parts = value.splitn(3, '|');
    let first = parts.next().unwrap_or("").trim();
    let second = parts.next();
    let third = parts.next();

    if let Some(id) = second.map(str::trim) {
        if regex!(r"(?i)^[^,~]+\.es[mpl]$").is_match(first) && regex!(r"(?i)^(0x)?[0-9a-f]{1,8}$").is_match(id) {
            return (format!("{first}|{id}"), third);
        }
    }
    (first.to_string(), value.split_once('|').map(|(_, rest)| rest))
}

/// A filter position, or `None` when it is empty or `NONE`.
fn position(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") { None } else { Some(trimmed) }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Tokens with exclusion (`-`), combination (`+`) or wildcard (`*`) markers have
/// no plain-target form.
fn plain_token(token: &str) -> Option<&str> {
    if token.starts_with('-') || token.contains('+') || token.contains('*') { None } else { Some(token) }
}

fn spid_outfit<R: RecordSource + ?Sized>(text: &str, records: &R) -> Option<RecordId> {
    split_list(text).find_map(|token| match RecordId::parse(token) {
        Ok(id) => Some(id),
        Err(_) => match records.lookup_editor_key(token) {
            Some((id, RecordKind::Outfit)) => Some(id),
            _ => None,
        },
    })
}

/// One comma-separated (OR) filter position.
fn filter_position<F>(sourced: &mut SourcedEntry, text: &str, resolve: F)
where
    F: Fn(&str) -> Option<(RecordId, RecordKind)>,
{
    let mut resolved: Vec<(RecordKind, RecordId)> = Vec::new();
    for token in split_list(text) {
        match plain_token(token).and_then(&resolve) {
            Some((id, kind)) if kind != RecordKind::Outfit => resolved.push((kind, id)),
            _ => unresolved(sourced, token),
        }
    }

    let Some(&(kind, _)) = resolved.first() else { return };
    if resolved.iter().any(|(k, _)| *k != kind) {
        debug!(position = text, "targets span several dimensions");
        unresolved(sourced, text);
        return;
    }
    match target_set(&mut sourced.entry, kind) {
        Some(targets) if targets.is_empty() => targets.extend(resolved.into_iter().map(|(_, id)| id)),
        _ => unresolved(sourced, text),
    }
}

fn unresolved(sourced: &mut SourcedEntry, token: &str) {
    debug!(
        file = %sourced.origin.relative_path,
        line = sourced.origin.line_number,
        token,
        "filter has no target form"
    );
    sourced.unresolved_filters.push(token.to_string());
}

fn target_set(entry: &mut DistributionEntry, kind: RecordKind) -> Option<&mut BTreeSet<RecordId>> {
    match kind {
        RecordKind::Npc => Some(&mut entry.npc_targets),
        RecordKind::Faction => Some(&mut entry.faction_targets),
        RecordKind::Keyword => Some(&mut entry.keyword_targets),
        RecordKind::Race => Some(&mut entry.race_targets),
        RecordKind::Outfit => None,
    }
}

/// SPID trait position: `F`/`M` for gender, `U S C L T D` optionally negated
/// with `-`. Separators are `/`, `,`, `+` or whitespace.
fn parse_traits(text: &str, unresolved: &mut Vec<String>) -> TraitFilters {
    let mut traits = TraitFilters::default();
    for token in text.split(['/', ',', '+', ' ', '\t']).filter(|t| !t.is_empty()) {
        let (negated, flag) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let value = Some(!negated);
        match (flag.to_ascii_uppercase().as_str(), negated) {
            ("F", false) => traits.gender = Some(true),
            ("M", false) => traits.gender = Some(false),
            ("U", _) => traits.unique = value,
            ("S", _) => traits.summonable = value,
            ("C", _) => traits.child = value,
            ("L", _) => traits.leveled = value,
            ("T", _) => traits.teammate = value,
            ("D", _) => traits.dead = value,
            _ => {
                debug!(token, "unknown trait");
                unresolved.push(token.to_string());
            }
        }
    }
    traits
}

/// Percent chance, rounded. Out-of-range or non-numeric values mean "always".
fn parse_chance(text: &str) -> Option<u8> {
    match text.trim().parse::<f64>() {
        Ok(value) if (0.0..=100.0).contains(&value) => Some(value.round() as u8),
        _ => {
            debug!(chance = text, "ignoring chance");
            None
        }
    }
}
