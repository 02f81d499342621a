//! Event-sourced reconstruction of table state.

mod builder;
mod event;
mod snapshot;

pub use builder::{EventOutcome, FoldFailure, FoldSummary, ReplicaBuilder};
pub use event::{EventKind, StoreEvent};
pub use snapshot::{ReplicaSnapshot, ReplicaSnapshots};
