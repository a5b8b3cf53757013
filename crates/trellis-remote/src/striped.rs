//! Per-identity async locks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Lazily-created async mutexes keyed by an identity string.
///
/// Callers serialise work on one identity (say, one template name)
/// without blocking work on any other. The registry itself is guarded
/// by a short-lived synchronous lock; the returned handle is an async
/// mutex held across awaits.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `id`, creating it on first use.
    pub fn entry(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
