//! Text codecs shared by both rule dialects.
//!
//! Two leaf codecs live here:
//!
//! - `identifier.rs`: the compact record identifier notation
//!   (`Skyrim.esm|0x1234` or `0x1234~Skyrim.esm`).
//! - `filter.rs`: colon-joined `key=value` filter clauses on a single line.
//!
//! Neither codec knows about files, sections or dialects; the rule file parser
//! in `engine/parser.rs` and the entry extraction in `engine/entries.rs` build
//! on top of them.
//!
//! ```text
//! "filterByNpcs=Skyrim.esm|0x1234,Skyrim.esm|0x99:outfitDefault=MyMod.esp|0x800"
//!   └─ extract_values(.., "filterByNpcs") ─> ["Skyrim.esm|0x1234", "Skyrim.esm|0x99"]
//!        └─ RecordId::parse each ─────────> [RecordId(Skyrim.esm, 0x1234), ...]
//! ```

#[path = "syntax/filter.rs"]
mod filter;
#[path = "syntax/identifier.rs"]
mod identifier;

pub use filter::{extract_value, extract_values, has_filter, parse_gender_filter, parse_identifier_list};
pub(crate) use filter::find_unescaped;
pub use identifier::RecordId;
