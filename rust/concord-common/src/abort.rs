//! Cooperative interruption of long-running result operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;
use crate::error::Error;

/// A shared flag polled at coarse batch boundaries (e.g. once per document
/// during context retrieval). Raising it makes the next check fail with the
/// `Interrupted` error kind, which callers can tell apart from data faults.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> AbortFlag {
        AbortFlag::default()
    }

    /// Request an abort. Idempotent; takes effect at the next check.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fails with `ErrorKind::Interrupted` if an abort has been requested.
    #[inline]
    pub fn check(&self, context: &str) -> Result<()> {
        if self.is_raised() {
            Err(Error::interrupted(context))
        } else {
            Ok(())
        }
    }
}
