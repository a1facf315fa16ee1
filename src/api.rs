use crate::engine::{
    self, CancelFlag, CharacterResolution, ConflictReport, FileOrdering, RunMetrics, StageMetrics, entries_from_file,
};
use crate::error::Result;
use crate::records::RecordSource;
use crate::{RecordId, RuleFile, SourcedEntry};
use std::time::Instant;
use tracing::info;

/// Options that affect analysis.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Load order used to break ties between files.
    pub ordering: FileOrdering,
    /// Run conflict detection and resolution on the rayon pool.
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { ordering: FileOrdering::default(), parallel: true }
    }
}

/// Everything [`analyze`] works out for a set of rule files.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Entries in file order, then line order. Conflict pairs and resolutions
    /// index into this.
    pub entries: Vec<SourcedEntry>,
    pub conflicts: ConflictReport,
    /// One per character, in record source order.
    pub resolutions: Vec<CharacterResolution>,
    pub metrics: RunMetrics,
}

impl Analysis {
    /// The outfit `character` ends up with, if any entry wins outright.
    pub fn outfit_for(&self, character: &RecordId) -> Option<&RecordId> {
        self.resolutions.iter().find(|r| &r.character == character).and_then(|r| r.outfit(&self.entries))
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &CharacterResolution> {
        self.resolutions.iter().filter(|r| r.is_ambiguous())
    }

    pub fn assigned_count(&self) -> usize {
        self.resolutions.iter().filter(|r| r.winner().is_some()).count()
    }
}

/// Extract entries from `files`, detect conflicts and resolve every character.
///
/// # Example
/// ```
/// use outfitter::{CancelFlag, Dialect, InMemoryRecords, Options, analyze, parse_rule_text};
///
/// let a = parse_rule_text("a.ini", "/data/a.ini", "a.ini", Dialect::SkyPatcher,
///     "filterByNpcs=Skyrim.esm|0x1234:filterByOutfits=MyMod.esp|0x800").unwrap();
/// let b = parse_rule_text("b.ini", "/data/b.ini", "b.ini", Dialect::SkyPatcher,
///     "filterByNpcs=Skyrim.esm|0x1234:filterByOutfits=MyMod.esp|0x801").unwrap();
///
/// let analysis = analyze(&[a, b], &InMemoryRecords::new(), &Options::default(), &CancelFlag::new()).unwrap();
/// assert_eq!(analysis.entries.len(), 2);
/// assert_eq!(analysis.conflicts.len(), 1);
/// assert!(analysis.conflicts.resolved_by_filename());
/// ```
pub fn analyze<R: RecordSource + ?Sized>(
    files: &[RuleFile],
    records: &R,
    options: &Options,
    cancel: &CancelFlag,
) -> Result<Analysis> {
    let start = Instant::now();

    let mut entries = Vec::new();
    for file in files {
        cancel.check()?;
        entries.extend(entries_from_file(file, records));
    }
    let extraction = StageMetrics { duration: start.elapsed(), produced: entries.len() };

    let mut analysis = analyze_entries(entries, records, options, cancel)?;
    analysis.metrics.extraction = extraction;
    analysis.metrics.total = start.elapsed();
    Ok(analysis)
}

/// Like [`analyze`], for hosts that build entries themselves.
pub fn analyze_entries<R: RecordSource + ?Sized>(
    entries: Vec<SourcedEntry>,
    records: &R,
    options: &Options,
    cancel: &CancelFlag,
) -> Result<Analysis> {
    let start = Instant::now();

    let stage = Instant::now();
    let conflicts = engine::detect_conflicts_with(&entries, options.ordering, options.parallel, cancel)?;
    let conflicts_metrics = StageMetrics { duration: stage.elapsed(), produced: conflicts.len() };

    let stage = Instant::now();
    let resolutions = engine::resolve_characters(&entries, records, options.ordering, options.parallel, cancel)?;
    let resolve_metrics = StageMetrics { duration: stage.elapsed(), produced: resolutions.len() };

    let metrics = RunMetrics {
        total: start.elapsed(),
        extraction: StageMetrics::default(),
        conflicts: conflicts_metrics,
        resolve: resolve_metrics,
    };
    info!(
        entries = entries.len(),
        conflicts = conflicts.len(),
        characters = resolutions.len(),
        elapsed_ms = metrics.total.as_millis() as u64,
        "analysis finished"
    );

    Ok(Analysis { entries, conflicts, resolutions, metrics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CharacterProfile, CharacterRecord, InMemoryRecords, RecordKind};
    use crate::{Dialect, OutfitterError, Resolution, parse_rule_text};

    fn skyrim(n: u32) -> RecordId {
        RecordId::new("Skyrim.esm", n)
    }

    fn records() -> InMemoryRecords {
        let mut records = InMemoryRecords::new();
        records.add_record(skyrim(0x13BBF), RecordKind::Faction, Some("GuardFactionWhiterun"));
        for (n, key, factions) in [(0x1234, "Lydia", vec![]), (0x2000, "WhiterunGuard", vec![skyrim(0x13BBF)])] {
            let record = CharacterRecord {
                id: skyrim(n),
                editor_key: Some(key.to_string()),
                display_name: None,
                originating_package: "Skyrim.esm".to_string(),
            };
            let profile = CharacterProfile { factions: factions.into_iter().collect(), ..Default::default() };
            records.add_character(record, profile).unwrap();
        }
        records
    }

    fn files() -> Vec<RuleFile> {
        let spid = parse_rule_text(
            "Guards_DISTR.ini",
            "/data/Guards_DISTR.ini",
            "Guards_DISTR.ini",
            Dialect::Spid,
            "Outfit = 0x900~MyMod.esp|GuardFactionWhiterun\nOutfit = 0x901~MyMod.esp\n",
        )
        .unwrap();
        let patcher = parse_rule_text(
            "a.ini",
            "/data/skse/plugins/SkyPatcher/a.ini",
            "skse/plugins/SkyPatcher/a.ini",
            Dialect::SkyPatcher,
            "filterByNpcs=Skyrim.esm|0x1234:filterByOutfits=MyMod.esp|0x800\n",
        )
        .unwrap();
        vec![spid, patcher]
    }

    #[test]
    fn analyze_combines_stages() {
        let records = records();
        let analysis = analyze(&files(), &records, &Options::default(), &CancelFlag::new()).unwrap();

        assert_eq!(analysis.entries.len(), 3);
        assert_eq!(analysis.metrics.extraction.produced, 3);
        assert_eq!(analysis.metrics.resolve.produced, 2);
        assert!(analysis.metrics.total >= analysis.metrics.resolve.duration);

        assert_eq!(analysis.outfit_for(&skyrim(0x1234)), Some(&RecordId::new("MyMod.esp", 0x800)));
        assert_eq!(analysis.outfit_for(&skyrim(0x2000)), Some(&RecordId::new("MyMod.esp", 0x900)));
        assert_eq!(analysis.assigned_count(), 2);
        assert_eq!(analysis.ambiguous().count(), 0);

        // 0x900 (faction) vs 0x901 (wildcard) share a file; both overlap the npc entry.
        assert_eq!(analysis.conflicts.len(), 3);
        assert!(!analysis.conflicts.resolved_by_filename());
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let records = records();
        let parallel = analyze(&files(), &records, &Options::default(), &CancelFlag::new()).unwrap();
        let sequential = Options { parallel: false, ..Default::default() };
        let sequential = analyze(&files(), &records, &sequential, &CancelFlag::new()).unwrap();
        assert_eq!(parallel.conflicts, sequential.conflicts);
        assert_eq!(parallel.resolutions, sequential.resolutions);
    }

    #[test]
    fn ambiguity_is_surfaced() {
        let text = "Outfit = 0x900~MyMod.esp\nOutfit = 0x901~MyMod.esp\n";
        let file = parse_rule_text("X_DISTR.ini", "/data/X_DISTR.ini", "X_DISTR.ini", Dialect::Spid, text).unwrap();
        let analysis = analyze(&[file], &records(), &Options::default(), &CancelFlag::new()).unwrap();
        assert_eq!(analysis.ambiguous().count(), 2);
        assert!(matches!(analysis.resolutions[0].resolution, Resolution::Ambiguous { .. }));
        assert_eq!(analysis.outfit_for(&skyrim(0x1234)), None);
    }

    #[test]
    fn cancelled_analysis_returns_error() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(analyze(&files(), &records(), &Options::default(), &cancel), Err(OutfitterError::Cancelled)));
    }
}
