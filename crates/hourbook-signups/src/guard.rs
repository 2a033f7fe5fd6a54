//! Single-writer guard per artifact.
//!
//! A roll holds the artifact's lease from the precondition check until
//! the assignment is persisted (or abandoned), so two concurrent rolls on
//! the same artifact cannot both get past the "already processed" check.

use hourbook_core::types::MessageId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct ArtifactGuard {
    held: Arc<Mutex<HashSet<MessageId>>>,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<MessageId>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Take the lease, or `None` if another workflow holds it.
    pub fn try_acquire(&self, artifact: MessageId) -> Option<ArtifactLease> {
        if self.held().insert(artifact) {
            Some(ArtifactLease {
                guard: self.clone(),
                artifact,
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, artifact: MessageId) -> bool {
        self.held().contains(&artifact)
    }
}

/// Released on drop.
pub struct ArtifactLease {
    guard: ArtifactGuard,
    artifact: MessageId,
}

impl ArtifactLease {
    pub fn artifact(&self) -> MessageId {
        self.artifact
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        self.guard.held().remove(&self.artifact);
    }
}
