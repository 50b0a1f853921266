//! In-flight disruption tracking.
//!
//! The orchestration layer queues a node's provider id once a command
//! for it has been issued. Candidate construction consults the queue so
//! a node is never handed to two commands at once.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Read-only membership test over queued provider ids.
pub trait DisruptionQueue: Send + Sync {
    /// True if any of `provider_ids` is already queued.
    fn has_any(&self, provider_ids: &[&str]) -> bool;
}

/// Thread-safe set of queued provider ids. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightQueue {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl InFlightQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(RwLock::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    /// Queue a provider id. Returns false if it was already queued.
    pub fn add(&self, provider_id: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id.to_string())
    }

    /// Drop a provider id once its command completes.
    pub fn remove(&self, provider_id: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provider_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DisruptionQueue for InFlightQueue {
    fn has_any(&self, provider_ids: &[&str]) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        provider_ids.iter().any(|id| inner.contains(*id))
    }
}
