//! Conflict detection.
//!
//! Two entries conflict when a single character could be matched by both and
//! they would hand out different outfits. The test is conservative: per target
//! dimension, an entry with no targets is unrestricted, so it overlaps any
//! other entry in that dimension. Unresolved filters are ignored here for the
//! same reason (an unknown restriction might not restrict anything), but a pair
//! where either side carries one is flagged `possible`: it overlaps only as far
//! as the resolved part of the entries can tell.
//!
//! Every pair is reported. When the two entries come from different files the
//! pair also names the entry from the later-loading file; that is advisory and
//! never suppresses the pair.

use super::cancel::CancelFlag;
use super::ordering::FileOrdering;
use crate::error::Result;
use crate::{DistributionEntry, SourcedEntry, TargetMask};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Two conflicting entries, by index into the analysed entry slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConflictPair {
    /// Always the smaller index.
    pub first: usize,
    pub second: usize,
    /// The entry whose file loads last, or `None` when both come from the same
    /// file and load order cannot settle the pair.
    pub winner: Option<usize>,
    /// Either entry has unresolved filters, so the overlap is unconfirmed.
    pub possible: bool,
}

impl ConflictPair {
    pub fn resolved_by_filename(&self) -> bool {
        self.winner.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// Sorted by `(first, second)`.
    pub pairs: Vec<ConflictPair>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when there is at least one conflict and file order settles all of
    /// them.
    pub fn resolved_by_filename(&self) -> bool {
        !self.pairs.is_empty() && self.pairs.iter().all(ConflictPair::resolved_by_filename)
    }

    /// Pairs between fully resolved entries.
    pub fn certain(&self) -> impl Iterator<Item = &ConflictPair> {
        self.pairs.iter().filter(|p| !p.possible)
    }

    /// Pairs that only overlap because an unresolved filter was read as unrestricted.
    pub fn possible(&self) -> impl Iterator<Item = &ConflictPair> {
        self.pairs.iter().filter(|p| p.possible)
    }

    /// Pairs involving the entry at `index`.
    pub fn involving(&self, index: usize) -> impl Iterator<Item = &ConflictPair> {
        self.pairs.iter().filter(move |p| p.first == index || p.second == index)
    }
}

const DIMENSIONS: [TargetMask; 4] = [TargetMask::NPC, TargetMask::FACTION, TargetMask::KEYWORD, TargetMask::RACE];

/// Whether `a` and `b` could both apply to one character with different outfits.
///
/// Symmetric in its arguments.
///
/// ```
/// use outfitter::{DistributionEntry, RecordId, conflicts};
///
/// let lydia = RecordId::new("Skyrim.esm", 0x1234);
/// let mut a = DistributionEntry { outfit: Some(RecordId::new("MyMod.esp", 0x800)), ..Default::default() };
/// a.npc_targets.insert(lydia.clone());
/// let mut b = DistributionEntry { outfit: Some(RecordId::new("MyMod.esp", 0x801)), ..Default::default() };
/// b.npc_targets.insert(lydia);
/// assert!(conflicts(&a, &b));
///
/// b.traits.gender = Some(true);
/// a.traits.gender = Some(false);
/// assert!(!conflicts(&a, &b));
/// ```
pub fn conflicts(a: &DistributionEntry, b: &DistributionEntry) -> bool {
    let (Some(outfit_a), Some(outfit_b)) = (&a.outfit, &b.outfit) else {
        return false;
    };
    if outfit_a == outfit_b || a.traits.excludes(&b.traits) {
        return false;
    }
    DIMENSIONS.iter().all(|&dim| {
        let (lhs, rhs) = (a.targets(dim), b.targets(dim));
        lhs.is_empty() || rhs.is_empty() || !lhs.is_disjoint(rhs)
    })
}

/// Every conflicting pair among `entries`.
pub fn detect_conflicts(entries: &[SourcedEntry], ordering: FileOrdering) -> ConflictReport {
    let pairs = (0..entries.len()).flat_map(|i| pairs_from(entries, ordering, i)).collect();
    ConflictReport { pairs }
}

/// Parallel, cancellable form used by the analysis pipeline.
pub(crate) fn detect_conflicts_with(
    entries: &[SourcedEntry],
    ordering: FileOrdering,
    parallel: bool,
    cancel: &CancelFlag,
) -> Result<ConflictReport> {
    let rows: Vec<Vec<ConflictPair>> = if parallel {
        (0..entries.len())
            .into_par_iter()
            .map(|i| -> Result<Vec<ConflictPair>> {
                cancel.check()?;
                Ok(pairs_from(entries, ordering, i).collect())
            })
            .collect::<Result<_>>()?
    } else {
        (0..entries.len())
            .map(|i| -> Result<Vec<ConflictPair>> {
                cancel.check()?;
                Ok(pairs_from(entries, ordering, i).collect())
            })
            .collect::<Result<_>>()?
    };
    Ok(ConflictReport { pairs: rows.into_iter().flatten().collect() })
}

fn pairs_from(entries: &[SourcedEntry], ordering: FileOrdering, i: usize) -> impl Iterator<Item = ConflictPair> + '_ {
    let a = &entries[i];
    entries
        .iter()
        .enumerate()
        .skip(i + 1)
        .filter(move |(_, b)| conflicts(&a.entry, &b.entry))
        .map(move |(j, b)| ConflictPair {
            first: i,
            second: j,
            winner: match ordering.compare(&a.origin, &b.origin) {
                Ordering::Less => Some(j),
                Ordering::Greater => Some(i),
                Ordering::Equal => None,
            },
            possible: !a.is_fully_resolved() || !b.is_fully_resolved(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dialect, EntryOrigin, RecordId, TraitFilters};

    fn npc(n: u32) -> RecordId {
        RecordId::new("Skyrim.esm", n)
    }

    fn outfit(n: u32) -> Option<RecordId> {
        Some(RecordId::new("MyMod.esp", n))
    }

    fn targeting(outfit_id: u32, npcs: &[u32]) -> DistributionEntry {
        DistributionEntry { outfit: outfit(outfit_id), npc_targets: npcs.iter().map(|&n| npc(n)).collect(), ..Default::default() }
    }

    fn sourced(entry: DistributionEntry, path: &str, line: u32) -> SourcedEntry {
        SourcedEntry::new(entry, EntryOrigin { relative_path: path.into(), dialect: Dialect::SkyPatcher, line_number: line })
    }

    #[test]
    fn same_target_different_outfits_conflict() {
        assert!(conflicts(&targeting(0x800, &[0x1234]), &targeting(0x801, &[0x1234])));
    }

    #[test]
    fn opposite_gender_never_conflicts() {
        let mut a = targeting(0x800, &[0x1234]);
        let mut b = targeting(0x801, &[0x1234]);
        a.traits = TraitFilters { gender: Some(true), ..Default::default() };
        b.traits = TraitFilters { gender: Some(false), ..Default::default() };
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn non_conflicting_cases() {
        let base = targeting(0x800, &[0x1]);
        let cases = [
            ("same outfit", targeting(0x800, &[0x1])),
            ("disjoint npcs", targeting(0x801, &[0x2])),
            ("no outfit", DistributionEntry { outfit: None, ..targeting(0, &[0x1]) }),
            ("empty", DistributionEntry::default()),
        ];
        for (label, other) in cases {
            assert!(!conflicts(&base, &other), "{label}");
            assert!(!conflicts(&other, &base), "{label}");
        }
    }

    #[test]
    fn unrestricted_dimension_overlaps() {
        let wildcard = DistributionEntry { outfit: outfit(0x900), ..Default::default() };
        let mut by_faction = DistributionEntry { outfit: outfit(0x901), ..Default::default() };
        by_faction.faction_targets.insert(npc(0x13BBF));

        assert!(conflicts(&wildcard, &targeting(0x800, &[0x1])));
        assert!(conflicts(&by_faction, &targeting(0x800, &[0x1])));
    }

    #[test]
    fn detection_is_symmetric() {
        let entries = [
            targeting(0x800, &[0x1, 0x2]),
            targeting(0x801, &[0x2]),
            targeting(0x802, &[0x3]),
            DistributionEntry { outfit: outfit(0x803), ..Default::default() },
        ];
        for a in &entries {
            for b in &entries {
                assert_eq!(conflicts(a, b), conflicts(b, a));
            }
        }
    }

    #[test]
    fn report_names_later_file() {
        let entries = vec![
            sourced(targeting(0x800, &[0x1]), "b.ini", 1),
            sourced(targeting(0x801, &[0x1]), "a.ini", 1),
            sourced(targeting(0x802, &[0x1]), "a.ini", 2),
        ];
        let report = detect_conflicts(&entries, FileOrdering::default());
        assert_eq!(
            report.pairs,
            vec![
                ConflictPair { first: 0, second: 1, winner: Some(0), possible: false },
                ConflictPair { first: 0, second: 2, winner: Some(0), possible: false },
                ConflictPair { first: 1, second: 2, winner: None, possible: false },
            ]
        );
        assert!(!report.resolved_by_filename());
        assert_eq!(report.involving(2).count(), 2);
    }

    #[test]
    fn unresolved_filters_make_a_pair_possible() {
        // Two SPID lines whose form filters the record source could not place.
        let mut a = sourced(DistributionEntry { outfit: outfit(0x800), ..Default::default() }, "a_DISTR.ini", 1);
        a.unresolved_filters.push("0x1~Skyrim.esm".into());
        let mut b = sourced(DistributionEntry { outfit: outfit(0x801), ..Default::default() }, "a_DISTR.ini", 2);
        b.unresolved_filters.push("0x2~Skyrim.esm".into());
        let c = sourced(targeting(0x802, &[0x1]), "b.ini", 1);

        let report = detect_conflicts(&[a, b, c], FileOrdering::default());
        assert_eq!(report.len(), 3);
        assert_eq!(report.certain().count(), 0);
        assert!(report.possible().all(|p| p.possible));
        assert_eq!(report.pairs[0], ConflictPair { first: 0, second: 1, winner: None, possible: true });
    }

    #[test]
    fn parallel_matches_sequential() {
        let entries: Vec<SourcedEntry> = (0..40)
            .map(|n| sourced(targeting(0x800 + n % 3, &[n % 5]), if n % 2 == 0 { "a.ini" } else { "b.ini" }, n))
            .collect();
        let expected = detect_conflicts(&entries, FileOrdering::PathOnly);
        let parallel = detect_conflicts_with(&entries, FileOrdering::PathOnly, true, &CancelFlag::new()).unwrap();
        assert_eq!(parallel, expected);
        assert!(!expected.is_empty());
    }

    #[test]
    fn cancelled_detection_returns_nothing() {
        let entries = vec![sourced(targeting(0x800, &[0x1]), "a.ini", 1), sourced(targeting(0x801, &[0x1]), "b.ini", 1)];
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(detect_conflicts_with(&entries, FileOrdering::default(), false, &cancel).is_err());
    }
}
