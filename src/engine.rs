//! Rule engine.
//!
//! The pipeline is split into focused submodules under `src/engine/`; this file
//! only mounts them and re-exports the public surface.
//!
//! ## How the parts work together
//!
//! ```text
//! rule text ── parse_rule_text ──▶ RuleFile            (parser.rs)
//!                                     │
//!                 entries_from_file ──┤ RecordSource   (entries.rs)
//!                                     ▼
//!                              Vec<SourcedEntry>
//!                        ┌────────────┴────────────┐
//!                        ▼                         ▼
//!              detect_conflicts            resolve_characters
//!              (conflict.rs)               (resolve.rs)
//!                        │                         │
//!                        └──── FileOrdering ───────┘
//!                              (ordering.rs)
//! ```
//!
//! Conflict detection and resolution both need "which file loads last"; that
//! single comparator lives in `ordering.rs` so the two can never disagree.
//!
//! ## Responsibilities by module
//!
//! - `parser.rs`: line classification and the per-dialect outfit-rule test.
//! - `entries.rs`: outfit-rule lines to [`crate::DistributionEntry`] values.
//! - `conflict.rs`: pairwise overlap test and the conflict report.
//! - `resolve.rs`: per-character winner selection by tier and load order.
//! - `ordering.rs`: the file load order.
//! - `cancel.rs`: cooperative cancellation shared by every long loop.
//! - `metrics.rs`: per-stage timings for analysis runs.

#[path = "engine/cancel.rs"]
mod cancel;
#[path = "engine/conflict.rs"]
mod conflict;
#[path = "engine/entries.rs"]
mod entries;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/ordering.rs"]
mod ordering;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/resolve.rs"]
mod resolve;

pub use cancel::CancelFlag;
pub use conflict::{ConflictPair, ConflictReport, conflicts, detect_conflicts};
pub(crate) use conflict::detect_conflicts_with;
pub use entries::entries_from_file;
pub use metrics::{RunMetrics, StageMetrics};
pub use ordering::FileOrdering;
pub use parser::parse_rule_text;
pub use resolve::{CharacterResolution, Resolution, Tier, resolve_character, resolve_characters};
