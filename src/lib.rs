//! Outfit distribution rule engine.
//!
//! Parses SPID (`*_DISTR.ini`) and SkyPatcher rule files, turns their outfit
//! lines into [`DistributionEntry`] values, reports entries that fight over the
//! same characters, and resolves which outfit each character ends up with.

use std::collections::BTreeSet;
use std::path::PathBuf;

#[macro_use]
mod macros;
mod api;
pub mod discovery;
mod engine;
mod error;
mod records;
mod syntax;
mod writer;

pub use api::{Analysis, Options, analyze, analyze_entries};
pub use engine::{
    CancelFlag, ConflictPair, ConflictReport, CharacterResolution, FileOrdering, Resolution, RunMetrics, StageMetrics,
    Tier, conflicts, detect_conflicts, entries_from_file, parse_rule_text, resolve_character, resolve_characters,
};
pub use error::{OutfitterError, Result};
pub use records::{CharacterProfile, CharacterRecord, InMemoryRecords, RecordKind, RecordSource, SkipReason};
pub use syntax::{RecordId, extract_value, extract_values, has_filter, parse_gender_filter, parse_identifier_list};
pub use writer::{write_entries, write_entry, write_file};

// --- Rule files ---------------------------------------------------------------

/// The two supported rule syntaxes.
///
/// The declaration order is also the load order used when ranking files: SPID
/// files sort before SkyPatcher files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    /// One `Outfit = ...` line per rule, with `|`-separated filter positions.
    Spid,
    /// One line of `:`-joined `key=value` clauses per rule.
    SkyPatcher,
}

impl Dialect {
    pub fn label(self) -> &'static str {
        match self {
            Dialect::Spid => "SPID",
            Dialect::SkyPatcher => "SkyPatcher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Blank,
    Comment,
    Section,
    KeyValue,
    Other,
}

/// One physical line of a rule file, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLine {
    /// 1-based line number.
    pub line_number: u32,
    /// The line exactly as read (without the line terminator).
    pub raw: String,
    pub kind: LineKind,
    /// Name of the enclosing `[section]`, or empty before the first one.
    pub section: String,
    pub key: Option<String>,
    pub value: Option<String>,
    /// Whether the dialect treats this line as an outfit assignment.
    pub is_outfit_rule: bool,
}

/// A parsed rule file that contains at least one outfit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFile {
    /// File name without directories.
    pub name: String,
    pub full_path: PathBuf,
    /// Path relative to the data directory, `/`-separated.
    pub relative_path: String,
    pub dialect: Dialect,
    pub lines: Vec<RuleLine>,
    pub outfit_rule_count: u32,
}

impl RuleFile {
    /// Directory part of `relative_path` (empty at the data root).
    pub fn directory(&self) -> &str {
        self.relative_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn key_value_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind == LineKind::KeyValue).count()
    }

    pub fn comment_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind == LineKind::Comment).count()
    }

    pub fn outfit_rules(&self) -> impl Iterator<Item = &RuleLine> {
        self.lines.iter().filter(|l| l.is_outfit_rule)
    }
}

// --- Distribution entries -----------------------------------------------------

/// Tri-state trait filters. `None` means "don't care".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TraitFilters {
    /// `Some(true)` requires female, `Some(false)` requires male.
    pub gender: Option<bool>,
    pub unique: Option<bool>,
    pub summonable: Option<bool>,
    pub child: Option<bool>,
    pub leveled: Option<bool>,
    pub teammate: Option<bool>,
    pub dead: Option<bool>,
}

impl TraitFilters {
    pub(crate) fn fields(&self) -> [Option<bool>; 7] {
        [self.gender, self.unique, self.summonable, self.child, self.leveled, self.teammate, self.dead]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(Option::is_none)
    }

    /// True when no character can satisfy both filter sets, i.e. some trait is
    /// required `true` by one side and `false` by the other.
    pub fn excludes(&self, other: &TraitFilters) -> bool {
        self.fields()
            .iter()
            .zip(other.fields().iter())
            .any(|(a, b)| matches!((a, b), (Some(x), Some(y)) if x != y))
    }
}

/// One outfit assignment rule in structured form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionEntry {
    pub outfit: Option<RecordId>,
    pub npc_targets: BTreeSet<RecordId>,
    pub faction_targets: BTreeSet<RecordId>,
    pub keyword_targets: BTreeSet<RecordId>,
    pub race_targets: BTreeSet<RecordId>,
    pub traits: TraitFilters,
    /// Percent chance, `None` meaning always (100).
    pub chance: Option<u8>,
}

impl DistributionEntry {
    pub fn has_targets(&self) -> bool {
        !self.target_mask().is_empty()
    }

    /// No outfit and no targets: nothing to distribute, nothing to compare.
    pub fn is_empty(&self) -> bool {
        self.outfit.is_none() && !self.has_targets()
    }

    /// Which target dimensions carry at least one identifier.
    pub fn target_mask(&self) -> TargetMask {
        let mut mask = TargetMask::empty();
        if !self.npc_targets.is_empty() {
            mask |= TargetMask::NPC;
        }
        if !self.faction_targets.is_empty() {
            mask |= TargetMask::FACTION;
        }
        if !self.keyword_targets.is_empty() {
            mask |= TargetMask::KEYWORD;
        }
        if !self.race_targets.is_empty() {
            mask |= TargetMask::RACE;
        }
        mask
    }

    pub(crate) fn targets(&self, dim: TargetMask) -> &BTreeSet<RecordId> {
        if dim == TargetMask::NPC {
            &self.npc_targets
        } else if dim == TargetMask::FACTION {
            &self.faction_targets
        } else if dim == TargetMask::KEYWORD {
            &self.keyword_targets
        } else {
            &self.race_targets
        }
    }
}

bitflags::bitflags! {
    /// Target dimensions of an entry, from most to least specific.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetMask: u8 {
        const NPC     = 1 << 0;
        const FACTION = 1 << 1;
        const KEYWORD = 1 << 2;
        const RACE    = 1 << 3;
    }
}

/// Where an entry came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryOrigin {
    pub relative_path: String,
    pub dialect: Dialect,
    pub line_number: u32,
}

/// An entry together with its origin and any filter values that could not be
/// mapped onto a target dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedEntry {
    pub entry: DistributionEntry,
    pub origin: EntryOrigin,
    /// Filter tokens the record source could not classify (editor keys it does
    /// not know, negated or combined SPID filters). Such entries still take part
    /// in conflict detection, where an unknown restriction is treated as
    /// unrestricted, but are never picked as a resolution winner.
    pub unresolved_filters: Vec<String>,
}

impl SourcedEntry {
    pub fn new(entry: DistributionEntry, origin: EntryOrigin) -> Self {
        SourcedEntry { entry, origin, unresolved_filters: Vec::new() }
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_filters.is_empty()
    }
}
