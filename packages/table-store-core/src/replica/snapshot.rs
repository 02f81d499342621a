//! Lock-free publication of replica state for concurrent readers.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::table::TableRegistry;

/// Immutable copy of the replica after some prefix of the stream.
#[derive(Debug, Clone, Default)]
pub struct ReplicaSnapshot {
    /// Tables and records
    pub registry: TableRegistry,
    /// Index of the first event not reflected in `registry`
    pub next_index: u64,
}

/// Current snapshot, swapped atomically by the builder's host.
///
/// Readers hold an `Arc<ReplicaSnapshot>` and never observe a partially
/// applied event. Unchanged tables are shared between snapshots.
#[derive(Debug)]
pub struct ReplicaSnapshots {
    current: ArcSwap<ReplicaSnapshot>,
}

impl ReplicaSnapshots {
    /// Starts with an empty snapshot at event 0.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ReplicaSnapshot::default()),
        }
    }

    /// Returns the latest published snapshot.
    pub fn load(&self) -> Arc<ReplicaSnapshot> {
        self.current.load_full()
    }

    /// Replaces the published snapshot.
    pub fn store(&self, snapshot: ReplicaSnapshot) {
        tracing::debug!("Publishing replica snapshot at event {}", snapshot.next_index);
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for ReplicaSnapshots {
    fn default() -> Self {
        Self::new()
    }
}
