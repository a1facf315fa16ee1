//! Error types.
//!
//! Only a handful of operations can fail outright: parsing a single identifier,
//! touching the filesystem, and cooperative cancellation. Everything that works
//! on lists (filter values, rule lines, whole files) swallows per-element
//! failures and logs them instead, so one bad token never aborts a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the rule engine.
#[derive(Debug, Error)]
pub enum OutfitterError {
    /// A single identifier could not be parsed.
    #[error("malformed identifier '{text}': {reason}")]
    MalformedIdentifier {
        /// The offending input, untrimmed.
        text: String,
        /// Why parsing failed.
        reason: &'static str,
    },

    /// Reading or writing a rule file failed.
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data directory handed to discovery does not exist or is not a directory.
    #[error("data path is not a directory: {}", .0.display())]
    InvalidDataPath(PathBuf),

    /// The caller cancelled the operation; no partial output was produced.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, OutfitterError>;
