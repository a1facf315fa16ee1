//! Per-character resolution.
//!
//! For each character the engine picks the entry whose outfit the character
//! ends up wearing:
//!
//! ```text
//! entries ──▶ eligible?  (has outfit, fully resolved)
//!         ──▶ matches?   (every non-empty target dimension + trait filters)
//!         ──▶ tier       (most specific non-empty dimension)
//!         ──▶ best tier, then last-loading file
//!         ──▶ same file: same outfit -> last line
//!                        different   -> Ambiguous
//! ```
//!
//! `chance` is carried on the entry but never rolled: an entry with a chance
//! below 100 still counts as a match.
//!
//! Trait filters only disqualify on a known mismatch; when the record source
//! does not know an attribute the filter is treated as satisfied.

use super::cancel::CancelFlag;
use super::ordering::FileOrdering;
use crate::error::Result;
use crate::records::{CharacterProfile, CharacterRecord, RecordSource};
use crate::{DistributionEntry, RecordId, SourcedEntry, TargetMask};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::warn;

/// How specifically an entry targets a character. Lower is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Npc = 1,
    Faction,
    Keyword,
    Race,
    /// No targets at all.
    Wildcard,
}

impl Tier {
    fn of(entry: &DistributionEntry) -> Tier {
        let mask = entry.target_mask();
        if mask.contains(TargetMask::NPC) {
            Tier::Npc
        } else if mask.contains(TargetMask::FACTION) {
            Tier::Faction
        } else if mask.contains(TargetMask::KEYWORD) {
            Tier::Keyword
        } else if mask.contains(TargetMask::RACE) {
            Tier::Race
        } else {
            Tier::Wildcard
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Npc => "npc",
            Tier::Faction => "faction",
            Tier::Keyword => "keyword",
            Tier::Race => "race",
            Tier::Wildcard => "wildcard",
        }
    }
}

/// Outcome for one character. Entry indices point into the analysed slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No entry applies.
    Unassigned,
    Assigned { entry: usize, tier: Tier },
    /// Several entries from the same file tie on tier and name different
    /// outfits. Candidates are in line order.
    Ambiguous { tier: Tier, candidates: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterResolution {
    pub character: RecordId,
    pub resolution: Resolution,
}

impl CharacterResolution {
    pub fn winner(&self) -> Option<usize> {
        match self.resolution {
            Resolution::Assigned { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn outfit<'a>(&self, entries: &'a [SourcedEntry]) -> Option<&'a RecordId> {
        self.winner().and_then(|idx| entries.get(idx)).and_then(|e| e.entry.outfit.as_ref())
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.resolution, Resolution::Ambiguous { .. })
    }
}

/// Resolve a single character against `entries`.
pub fn resolve_character<R: RecordSource + ?Sized>(
    character: &CharacterRecord,
    entries: &[SourcedEntry],
    records: &R,
    ordering: FileOrdering,
) -> Resolution {
    let empty = CharacterProfile::default();
    let profile = records.profile(&character.id).unwrap_or(&empty);

    let matching: Vec<(usize, Tier)> = entries
        .iter()
        .enumerate()
        .filter(|(_, sourced)| sourced.entry.outfit.is_some() && sourced.is_fully_resolved())
        .filter(|(_, sourced)| matches(&sourced.entry, &character.id, profile))
        .map(|(idx, sourced)| (idx, Tier::of(&sourced.entry)))
        .collect();

    let Some(tier) = matching.iter().map(|&(_, tier)| tier).min() else {
        return Resolution::Unassigned;
    };

    // Last-loading file among the best tier, then every entry from that file.
    let mut best: Vec<usize> = Vec::new();
    for idx in matching.iter().filter(|&&(_, t)| t == tier).map(|&(idx, _)| idx) {
        match best.first().map(|&b| ordering.compare(&entries[idx].origin, &entries[b].origin)) {
            None | Some(Ordering::Equal) => best.push(idx),
            Some(Ordering::Greater) => best = vec![idx],
            Some(Ordering::Less) => {}
        }
    }
    best.sort_by_key(|&idx| entries[idx].origin.line_number);

    let first_outfit = &entries[best[0]].entry.outfit;
    if best.iter().all(|&idx| &entries[idx].entry.outfit == first_outfit) {
        let entry = best[best.len() - 1];
        Resolution::Assigned { entry, tier }
    } else {
        Resolution::Ambiguous { tier, candidates: best }
    }
}

/// Resolve every character the record source knows about, in source order.
///
/// Cancellation is checked per character; a cancelled run returns
/// `Err(Cancelled)` and no resolutions.
pub fn resolve_characters<R: RecordSource + ?Sized>(
    entries: &[SourcedEntry],
    records: &R,
    ordering: FileOrdering,
    parallel: bool,
    cancel: &CancelFlag,
) -> Result<Vec<CharacterResolution>> {
    let resolve_one = |character: &CharacterRecord| -> Result<CharacterResolution> {
        cancel.check()?;
        let resolution = resolve_character(character, entries, records, ordering);
        if let Resolution::Ambiguous { tier, candidates } = &resolution {
            warn!(
                character = %character.id,
                tier = tier.label(),
                candidates = candidates.len(),
                file = %entries[candidates[0]].origin.relative_path,
                "ambiguous outfit resolution"
            );
        }
        Ok(CharacterResolution { character: character.id.clone(), resolution })
    };

    if parallel {
        records.characters().par_iter().map(resolve_one).collect()
    } else {
        records.characters().iter().map(resolve_one).collect()
    }
}

fn matches(entry: &DistributionEntry, character: &RecordId, profile: &CharacterProfile) -> bool {
    let hits = |targets: &std::collections::BTreeSet<RecordId>, pass: bool| targets.is_empty() || pass;

    hits(&entry.npc_targets, entry.npc_targets.contains(character))
        && hits(&entry.faction_targets, !entry.faction_targets.is_disjoint(&profile.factions))
        && hits(&entry.keyword_targets, !entry.keyword_targets.is_disjoint(&profile.keywords))
        && hits(&entry.race_targets, profile.race.as_ref().is_some_and(|race| entry.race_targets.contains(race)))
        && entry
            .traits
            .fields()
            .iter()
            .zip(profile.trait_values())
            .all(|(filter, actual)| !matches!((filter, actual), (Some(want), Some(have)) if *want != have))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::InMemoryRecords;
    use crate::{Dialect, EntryOrigin, TraitFilters};

    fn skyrim(n: u32) -> RecordId {
        RecordId::new("Skyrim.esm", n)
    }

    fn outfit(n: u32) -> Option<RecordId> {
        Some(RecordId::new("MyMod.esp", n))
    }

    fn at(entry: DistributionEntry, path: &str, line: u32) -> SourcedEntry {
        SourcedEntry::new(entry, EntryOrigin { relative_path: path.into(), dialect: Dialect::SkyPatcher, line_number: line })
    }

    fn character(n: u32, key: &str) -> CharacterRecord {
        CharacterRecord {
            id: skyrim(n),
            editor_key: Some(key.into()),
            display_name: None,
            originating_package: "Skyrim.esm".into(),
        }
    }

    fn world(profiles: Vec<(u32, CharacterProfile)>) -> InMemoryRecords {
        let mut records = InMemoryRecords::new();
        for (n, profile) in profiles {
            records.add_character(character(n, &format!("Npc{n:X}")), profile).unwrap();
        }
        records
    }

    fn resolve(entries: &[SourcedEntry], records: &InMemoryRecords, n: u32) -> Resolution {
        let character = records.characters().iter().find(|c| c.id == skyrim(n)).unwrap();
        resolve_character(character, entries, records, FileOrdering::default())
    }

    #[test]
    fn npc_target_beats_wildcard_from_later_file() {
        let mut targeted = DistributionEntry { outfit: outfit(0x800), ..Default::default() };
        targeted.npc_targets.insert(skyrim(0x1234));
        let wildcard = DistributionEntry { outfit: outfit(0x900), ..Default::default() };
        let entries = vec![at(targeted, "a.ini", 1), at(wildcard, "b.ini", 1)];
        let records = world(vec![(0x1234, CharacterProfile::default()), (0x5678, CharacterProfile::default())]);

        assert_eq!(resolve(&entries, &records, 0x1234), Resolution::Assigned { entry: 0, tier: Tier::Npc });
        assert_eq!(resolve(&entries, &records, 0x5678), Resolution::Assigned { entry: 1, tier: Tier::Wildcard });
    }

    #[test]
    fn tiers_follow_specificity() {
        let guards = skyrim(0x13BBF);
        let nord = skyrim(0x13746);
        let mut by_race = DistributionEntry { outfit: outfit(0x1), ..Default::default() };
        by_race.race_targets.insert(nord.clone());
        let mut by_faction = DistributionEntry { outfit: outfit(0x2), ..Default::default() };
        by_faction.faction_targets.insert(guards.clone());

        let entries = vec![at(by_faction, "a.ini", 1), at(by_race, "z.ini", 1)];
        let guard = CharacterProfile { factions: [guards].into(), race: Some(nord.clone()), ..Default::default() };
        let citizen = CharacterProfile { race: Some(nord), ..Default::default() };
        let records = world(vec![(0x10, guard), (0x20, citizen), (0x30, CharacterProfile::default())]);

        assert_eq!(resolve(&entries, &records, 0x10), Resolution::Assigned { entry: 0, tier: Tier::Faction });
        assert_eq!(resolve(&entries, &records, 0x20), Resolution::Assigned { entry: 1, tier: Tier::Race });
        assert_eq!(resolve(&entries, &records, 0x30), Resolution::Unassigned);
    }

    #[test]
    fn later_file_wins_within_tier() {
        let entries = vec![
            at(DistributionEntry { outfit: outfit(0x1), ..Default::default() }, "B.ini", 1),
            at(DistributionEntry { outfit: outfit(0x2), ..Default::default() }, "a.ini", 1),
        ];
        let records = world(vec![(0x10, CharacterProfile::default())]);
        assert_eq!(resolve(&entries, &records, 0x10), Resolution::Assigned { entry: 0, tier: Tier::Wildcard });
    }

    #[test]
    fn trait_mismatch_disqualifies_and_unknown_is_permissive() {
        let female_only = DistributionEntry {
            outfit: outfit(0x1),
            traits: TraitFilters { gender: Some(true), ..Default::default() },
            ..Default::default()
        };
        let entries = vec![at(female_only, "a.ini", 1)];
        let records = world(vec![
            (0x10, CharacterProfile { female: Some(true), ..Default::default() }),
            (0x20, CharacterProfile { female: Some(false), ..Default::default() }),
            (0x30, CharacterProfile::default()),
        ]);
        assert!(matches!(resolve(&entries, &records, 0x10), Resolution::Assigned { .. }));
        assert_eq!(resolve(&entries, &records, 0x20), Resolution::Unassigned);
        assert!(matches!(resolve(&entries, &records, 0x30), Resolution::Assigned { .. }));
    }

    #[test]
    fn same_file_tie_is_ambiguous() {
        let entries = vec![
            at(DistributionEntry { outfit: outfit(0x1), ..Default::default() }, "a.ini", 4),
            at(DistributionEntry { outfit: outfit(0x2), ..Default::default() }, "a.ini", 2),
        ];
        let records = world(vec![(0x10, CharacterProfile::default())]);
        assert_eq!(
            resolve(&entries, &records, 0x10),
            Resolution::Ambiguous { tier: Tier::Wildcard, candidates: vec![1, 0] }
        );
    }

    #[test]
    fn same_file_same_outfit_takes_last_line() {
        let entries = vec![
            at(DistributionEntry { outfit: outfit(0x1), ..Default::default() }, "a.ini", 7),
            at(DistributionEntry { outfit: outfit(0x1), ..Default::default() }, "a.ini", 3),
        ];
        let records = world(vec![(0x10, CharacterProfile::default())]);
        assert_eq!(resolve(&entries, &records, 0x10), Resolution::Assigned { entry: 0, tier: Tier::Wildcard });
    }

    #[test]
    fn ineligible_entries_never_win() {
        let mut unresolved = at(DistributionEntry { outfit: outfit(0x1), ..Default::default() }, "z.ini", 1);
        unresolved.unresolved_filters.push("-NordRace".into());
        let entries = vec![
            at(DistributionEntry::default(), "z.ini", 2),
            unresolved,
            at(DistributionEntry { outfit: outfit(0x2), ..Default::default() }, "a.ini", 1),
        ];
        let records = world(vec![(0x10, CharacterProfile::default())]);
        assert_eq!(resolve(&entries, &records, 0x10), Resolution::Assigned { entry: 2, tier: Tier::Wildcard });
    }

    #[test]
    fn batch_is_deterministic_and_cancellable() {
        let mut entries = Vec::new();
        for n in 0..12u32 {
            let mut entry = DistributionEntry { outfit: outfit(0x100 + n % 4), ..Default::default() };
            if n % 3 == 0 {
                entry.npc_targets.insert(skyrim(n));
            }
            entries.push(at(entry, if n % 2 == 0 { "a.ini" } else { "b.ini" }, n + 1));
        }
        let records = world((1..50).map(|n| (n, CharacterProfile::default())).collect());

        let cancel = CancelFlag::new();
        let sequential = resolve_characters(&entries, &records, FileOrdering::default(), false, &cancel).unwrap();
        let parallel = resolve_characters(&entries, &records, FileOrdering::default(), true, &cancel).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 49);
        assert_eq!(sequential[0].character, skyrim(1));

        cancel.cancel();
        assert!(resolve_characters(&entries, &records, FileOrdering::default(), true, &cancel).is_err());
    }

    #[test]
    fn skypatcher_line_with_a_bad_npc_token_still_assigns() {
        use crate::engine::{entries_from_file, parse_rule_text};

        let text = "filterByNpcs=Skyrim.esm|0x1234,garbage:filterByOutfits=MyMod.esp|0x800";
        let file = parse_rule_text("Guards.ini", "/data/Guards.ini", "Guards.ini", Dialect::SkyPatcher, text).unwrap();
        let records = world(vec![(0x1234, CharacterProfile::default())]);
        let entries = entries_from_file(&file, &records);

        assert_eq!(resolve(&entries, &records, 0x1234), Resolution::Assigned { entry: 0, tier: Tier::Npc });
        assert_eq!(entries[0].entry.outfit, outfit(0x800));
    }
}
