//! Record identifiers.
//!
//! Rule files name records by the package (plugin file) that introduced them
//! and a 32-bit local id. Two notations are in the wild:
//!
//! ```text
//! Skyrim.esm|0x0001A2B3     package first, '|' separator
//! 0x1A2B3~Skyrim.esm        id first, '~' separator
//! ```
//!
//! The numeric part is always read as hexadecimal, with or without the `0x`
//! prefix, because that is what both rule dialects use. `Display` always emits
//! the package-first form so written rules are normalized regardless of how
//! they were read.

use crate::error::{OutfitterError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A `(package, local id)` pair naming one record.
///
/// Package names compare case-insensitively (ASCII) but keep their original
/// spelling for display.
#[derive(Debug, Clone)]
pub struct RecordId {
    package: String,
    local_id: u32,
}

impl RecordId {
    pub fn new(package: impl Into<String>, local_id: u32) -> Self {
        RecordId { package: package.into(), local_id }
    }

    /// The package name as it was written.
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// A zero local id never names a real record.
    pub fn is_null(&self) -> bool {
        self.local_id == 0
    }

    /// Parse either identifier notation.
    ///
    /// # Example
    /// ```
    /// use outfitter::RecordId;
    ///
    /// let a = RecordId::parse("Skyrim.esm|0x1234").unwrap();
    /// let b = RecordId::parse(" 1234 ~ skyrim.esm ").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(b.to_string(), "skyrim.esm|0x1234");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |reason| OutfitterError::MalformedIdentifier { text: text.to_string(), reason };

        let trimmed = text.trim();
        let (package, number) = if let Some((package, number)) = trimmed.split_once('|') {
            (package, number)
        } else if let Some((number, package)) = trimmed.split_once('~') {
            (package, number)
        } else {
            return Err(malformed("expected '<package>|<id>' or '<id>~<package>'"));
        };

        let package = package.trim();
        if package.is_empty() {
            return Err(malformed("missing package name"));
        }

        let number = number.trim();
        let digits = number.strip_prefix("0x").or_else(|| number.strip_prefix("0X")).unwrap_or(number);
        if digits.is_empty() {
            return Err(malformed("missing numeric id"));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed("numeric id is not a 32-bit hex value"));
        }
        let local_id = u32::from_str_radix(digits, 16).map_err(|_| malformed("numeric id is not a 32-bit hex value"))?;

        Ok(RecordId::new(package, local_id))
    }

    /// The id-first notation (`0x800~MyMod.esp`), which SPID needs because `|`
    /// separates its filter positions.
    pub fn to_tilde_string(&self) -> String {
        format!("0x{:X}~{}", self.local_id, self.package)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|0x{:X}", self.package, self.local_id)
    }
}

impl FromStr for RecordId {
    type Err = OutfitterError;

    fn from_str(s: &str) -> Result<Self> {
        RecordId::parse(s)
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.local_id == other.local_id && self.package.eq_ignore_ascii_case(&other.package)
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.package.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u32(self.local_id);
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.package.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.package.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs).then(self.local_id.cmp(&other.local_id))
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
