//! Cooperative cancellation.
//!
//! Long scans (directory walks, per-file parsing, per-character resolution)
//! call [`CancelFlag::check`] at every file or record boundary. When the flag is
//! raised the scan stops and returns `Err(Cancelled)`; whatever it had built so
//! far is dropped, never returned.

use crate::error::{OutfitterError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cancellation signal. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(OutfitterError::Cancelled) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(OutfitterError::Cancelled)));
    }
}
