//! Record source seam.
//!
//! The engine never reads game plugins. Whatever host does exposes the records
//! the engine needs through [`RecordSource`]: the character list for
//! resolution, the kind of a record (to sort SPID form filters into target
//! dimensions), editor-key lookup (for SPID string filters), and the per
//! character attributes the filters test against.
//!
//! [`InMemoryRecords`] is a plain implementation for tests and for hosts that
//! already hold everything in memory.

use crate::RecordId;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Npc,
    Faction,
    Keyword,
    Race,
    Outfit,
}

/// A character as supplied by the record source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub id: RecordId,
    pub editor_key: Option<String>,
    pub display_name: Option<String>,
    /// Package that first introduced the record (not the last one to edit it).
    pub originating_package: String,
}

/// Why a character record was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("record id is null")]
    NullId,
    #[error("record has no editor key")]
    MissingEditorKey,
}

impl CharacterRecord {
    /// Records without an editor key are almost always broken leftovers and
    /// are skipped by the sources that build character lists.
    pub fn validate(&self) -> Result<(), SkipReason> {
        if self.id.is_null() {
            return Err(SkipReason::NullId);
        }
        match self.editor_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(SkipReason::MissingEditorKey),
        }
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.editor_key.as_deref())
            .unwrap_or(self.originating_package.as_str())
    }

    /// Lowercased text used for free-text filtering: name, editor key,
    /// package and identifier.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.display_name.as_deref().unwrap_or(""),
            self.editor_key.as_deref().unwrap_or(""),
            self.originating_package,
            self.id
        )
        .to_lowercase()
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        term.is_empty() || self.search_text().contains(&term.to_lowercase())
    }
}

/// Character attributes that rule filters test against.
///
/// Every trait is optional: an unknown attribute never disqualifies an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterProfile {
    pub factions: BTreeSet<RecordId>,
    pub keywords: BTreeSet<RecordId>,
    pub race: Option<RecordId>,
    pub female: Option<bool>,
    pub unique: Option<bool>,
    pub summonable: Option<bool>,
    pub child: Option<bool>,
    pub leveled: Option<bool>,
    pub teammate: Option<bool>,
    pub dead: Option<bool>,
}

impl CharacterProfile {
    /// Attributes in the same order as `TraitFilters::fields`.
    pub(crate) fn trait_values(&self) -> [Option<bool>; 7] {
        [self.female, self.unique, self.summonable, self.child, self.leveled, self.teammate, self.dead]
    }
}

/// Read-only view of the host's records.
///
/// Implementations must be shareable across threads: resolution fans the
/// character list out over a worker pool.
pub trait RecordSource: Sync {
    fn characters(&self) -> &[CharacterRecord];
    fn record_kind(&self, id: &RecordId) -> Option<RecordKind>;
    fn lookup_editor_key(&self, editor_key: &str) -> Option<(RecordId, RecordKind)>;
    fn profile(&self, id: &RecordId) -> Option<&CharacterProfile>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecords {
    characters: Vec<CharacterRecord>,
    profiles: HashMap<RecordId, CharacterProfile>,
    kinds: HashMap<RecordId, RecordKind>,
    editor_keys: HashMap<String, (RecordId, RecordKind)>,
}

impl InMemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a non-character record (faction, keyword, race, outfit, ...).
    pub fn add_record(&mut self, id: RecordId, kind: RecordKind, editor_key: Option<&str>) {
        if let Some(key) = editor_key {
            self.editor_keys.insert(key.to_ascii_lowercase(), (id.clone(), kind));
        }
        self.kinds.insert(id, kind);
    }

    /// Register a character. Invalid records are refused with the reason.
    pub fn add_character(&mut self, record: CharacterRecord, profile: CharacterProfile) -> Result<(), SkipReason> {
        if let Err(reason) = record.validate() {
            debug!(id = %record.id, %reason, "skipping character record");
            return Err(reason);
        }
        self.add_record(record.id.clone(), RecordKind::Npc, record.editor_key.as_deref());
        self.profiles.insert(record.id.clone(), profile);
        self.characters.push(record);
        Ok(())
    }
}

impl RecordSource for InMemoryRecords {
    fn characters(&self) -> &[CharacterRecord] {
        &self.characters
    }

    fn record_kind(&self, id: &RecordId) -> Option<RecordKind> {
        self.kinds.get(id).copied()
    }

    fn lookup_editor_key(&self, editor_key: &str) -> Option<(RecordId, RecordKind)> {
        self.editor_keys.get(&editor_key.to_ascii_lowercase()).cloned()
    }

    fn profile(&self, id: &RecordId) -> Option<&CharacterProfile> {
        self.profiles.get(id)
    }
}
