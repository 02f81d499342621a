//! Replica checkpoints: checksummed record dumps plus the fold position.

#[cfg(test)]
mod test;

mod checkpoint;
pub mod io_utils;

pub use checkpoint::{
    BufferedEvent, CheckpointFile, CheckpointManager, HaltedKey, ReplicaFile, StoredRecord,
    CHECKPOINT_VERSION,
};
