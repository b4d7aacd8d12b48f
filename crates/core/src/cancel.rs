//! Cooperative cancellation
//!
//! Long-running runs (large feature sets, wide neighbor fan-out) observe a
//! shared cancellation flag at every step and seed boundary. Observation
//! fails the run with [`Error::Cancelled`]; no partial result is committed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Shared cancellation flag.
///
/// Clones observe the same flag; any holder may cancel. The default token
/// is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Irrevocable for the lifetime of the token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Cancelled`] if cancellation has been requested.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
