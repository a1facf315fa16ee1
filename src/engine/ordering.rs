//! File load ordering.
//!
//! Both conflict reporting and resolution need to know which of two files is
//! applied last. The ordering is a total order over files:
//!
//! ```text
//! DialectThenPath (default):  (dialect, lowercase relative path)
//! PathOnly:                   (lowercase relative path)
//! ```
//!
//! The later file in this order overrides the earlier one. Two entries from the
//! same file compare equal.

use crate::EntryOrigin;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileOrdering {
    /// All SPID files load before all SkyPatcher files; within a dialect,
    /// case-insensitive relative path order.
    #[default]
    DialectThenPath,
    /// Case-insensitive relative path order only.
    PathOnly,
}

impl FileOrdering {
    /// Compare the files two entries came from.
    pub fn compare(self, a: &EntryOrigin, b: &EntryOrigin) -> Ordering {
        let by_path = || {
            let lhs = a.relative_path.bytes().map(|c| c.to_ascii_lowercase());
            let rhs = b.relative_path.bytes().map(|c| c.to_ascii_lowercase());
            lhs.cmp(rhs)
        };
        match self {
            FileOrdering::DialectThenPath => a.dialect.cmp(&b.dialect).then_with(by_path),
            FileOrdering::PathOnly => by_path(),
        }
    }

    pub fn same_file(self, a: &EntryOrigin, b: &EntryOrigin) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}
