//! Checkpoint manager for replica data and fold position.

use std::fs;
use std::path::{Path, PathBuf};

use alloy_primitives::B256;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::{HaltPolicy, ReplicaConfig, UnknownTablePolicy};
use crate::error::StoreError;
use crate::replica::{ReplicaBuilder, StoreEvent};
use crate::table::{TableRegistry, TABLES_TABLE_ID};
use crate::types::{Record, ResourceId};

use super::io_utils::{classify_io_error, retry_io_operation, write_atomic};

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const REPLICA_FILE: &str = "replica.json";

/// Checkpoint metadata, written after the replica data it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Format version
    pub version: u32,
    /// Index of the first event not reflected in the replica data
    pub next_index: u64,
    /// CRC32 of the replica data file
    pub checksum: u32,
    /// Registered tables, Tables registry included
    pub table_count: usize,
    /// Records across all tables
    pub record_count: usize,
}

/// Replica data file: every record, Tables registry first, plus the fold
/// state that outlives single events.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicaFile {
    pub records: Vec<StoredRecord>,
    /// Events buffered for unregistered tables, in stream order
    #[serde(default)]
    pub buffered: Vec<BufferedEvent>,
    /// Keys halted under the per-key policy
    #[serde(default)]
    pub halted: Vec<HaltedKey>,
}

/// A buffered event with its original stream index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedEvent {
    pub index: u64,
    pub event: StoreEvent,
}

/// A halted key and the index of the event that halted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltedKey {
    pub table_id: ResourceId,
    pub key_tuple: Vec<B256>,
    pub index: u64,
}

/// One record with its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub table_id: ResourceId,
    pub key_tuple: Vec<B256>,
    #[serde(flatten)]
    pub record: Record,
}

/// Writes and restores replica checkpoints in a data directory.
#[derive(Debug)]
pub struct CheckpointManager {
    /// Data directory path
    data_dir: PathBuf,
    /// Maximum retry attempts for transient I/O errors
    max_retries: u32,
    /// Delay between retry attempts in milliseconds
    retry_delay_ms: u64,
}

impl CheckpointManager {
    /// Creates a checkpoint manager with the given configuration.
    pub fn new(config: &ReplicaConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            max_retries: config.persistence_max_retries,
            retry_delay_ms: config.persistence_retry_delay_ms,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether a checkpoint has been written to the data directory.
    pub fn exists(&self) -> bool {
        self.data_dir.join(CHECKPOINT_FILE).exists()
    }

    /// Saves the builder's registry, buffered events, halted keys and fold
    /// position.
    ///
    /// # Arguments
    /// * `builder` - Builder to checkpoint
    ///
    /// # Returns
    /// `Result<CheckpointFile, StoreError>` with the metadata written.
    pub fn save(&self, builder: &ReplicaBuilder) -> Result<CheckpointFile, StoreError> {
        let replica = ReplicaFile {
            records: stored_records(builder.registry()),
            buffered: builder
                .buffered_events()
                .into_iter()
                .map(|(index, event)| BufferedEvent {
                    index,
                    event: event.clone(),
                })
                .collect(),
            halted: builder
                .halted_keys()
                .into_iter()
                .map(|(table_id, key, index)| HaltedKey {
                    table_id,
                    key_tuple: key.to_vec(),
                    index,
                })
                .collect(),
        };
        self.write(builder.registry(), replica, builder.next_index())
    }

    /// Saves a registry as the state before event `next_index`, with no
    /// buffered events or halted keys.
    pub fn save_registry(
        &self,
        registry: &TableRegistry,
        next_index: u64,
    ) -> Result<CheckpointFile, StoreError> {
        let replica = ReplicaFile {
            records: stored_records(registry),
            buffered: Vec::new(),
            halted: Vec::new(),
        };
        self.write(registry, replica, next_index)
    }

    fn write(
        &self,
        registry: &TableRegistry,
        replica: ReplicaFile,
        next_index: u64,
    ) -> Result<CheckpointFile, StoreError> {
        let replica_json = serde_json::to_vec_pretty(&replica)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let mut hasher = Hasher::new();
        hasher.update(&replica_json);
        let checkpoint = CheckpointFile {
            version: CHECKPOINT_VERSION,
            next_index,
            checksum: hasher.finalize(),
            table_count: registry.tables().count(),
            record_count: replica.records.len(),
        };
        let checkpoint_json = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        retry_io_operation(
            || write_atomic(&self.data_dir, REPLICA_FILE, &replica_json),
            self.max_retries,
            self.retry_delay_ms,
            "save_replica",
        )?;
        retry_io_operation(
            || write_atomic(&self.data_dir, CHECKPOINT_FILE, &checkpoint_json),
            self.max_retries,
            self.retry_delay_ms,
            "save_checkpoint",
        )?;

        tracing::info!(
            "Checkpoint written at event {}: {} tables, {} records, {} buffered events",
            checkpoint.next_index,
            checkpoint.table_count,
            checkpoint.record_count,
            replica.buffered.len()
        );
        Ok(checkpoint)
    }

    /// Reads and verifies the checkpoint metadata.
    ///
    /// # Returns
    /// `Ok(None)` if no checkpoint exists.
    pub fn load_checkpoint(&self) -> Result<Option<CheckpointFile>, StoreError> {
        let path = self.data_dir.join(CHECKPOINT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = self.read(&path, "load_checkpoint")?;
        let checkpoint: CheckpointFile = serde_json::from_slice(&contents).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse checkpoint: {}", e))
        })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(StoreError::SerializationError(format!(
                "Unsupported checkpoint version: {}",
                checkpoint.version
            )));
        }
        Ok(Some(checkpoint))
    }

    /// Reads the stored records and checks them against the checkpoint.
    pub fn load_records(&self, checkpoint: &CheckpointFile) -> Result<Vec<StoredRecord>, StoreError> {
        self.load_replica(checkpoint).map(|replica| replica.records)
    }

    /// Reads the replica data file and checks it against the checkpoint.
    pub fn load_replica(&self, checkpoint: &CheckpointFile) -> Result<ReplicaFile, StoreError> {
        let contents = self.read(&self.data_dir.join(REPLICA_FILE), "load_replica")?;

        let mut hasher = Hasher::new();
        hasher.update(&contents);
        let actual = hasher.finalize();
        if actual != checkpoint.checksum {
            return Err(StoreError::DataCorruption(format!(
                "Checksum mismatch for {}: expected {:08x}, got {:08x}",
                REPLICA_FILE, checkpoint.checksum, actual
            )));
        }

        let replica: ReplicaFile = serde_json::from_slice(&contents).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse replica data: {}", e))
        })?;
        Ok(replica)
    }

    /// Restores a builder from the last checkpoint.
    ///
    /// Registrations are folded back as SetRecord events so every table is
    /// rebuilt from its registry record. Table records are then reinstated
    /// byte for byte, together with buffered events and halted keys, and the
    /// builder resumes at the checkpointed event index.
    ///
    /// # Returns
    /// `Ok(None)` if no checkpoint exists; `DataCorruption` if the data fails
    /// verification or does not rebuild.
    pub fn restore(&self, config: ReplicaConfig) -> Result<Option<ReplicaBuilder>, StoreError> {
        let Some(checkpoint) = self.load_checkpoint()? else {
            return Ok(None);
        };
        let replica = self.load_replica(&checkpoint)?;
        let (registrations, rows): (Vec<_>, Vec<_>) = replica
            .records
            .into_iter()
            .partition(|stored| stored.table_id == TABLES_TABLE_ID);

        let mut rebuild = ReplicaBuilder::new(ReplicaConfig {
            unknown_table_policy: UnknownTablePolicy::Reject,
            halt_policy: HaltPolicy::Stream,
            ..config.clone()
        });
        let events = registrations
            .into_iter()
            .map(|stored| StoreEvent::set_record(stored.table_id, stored.key_tuple, stored.record));
        rebuild.apply_all(events).map_err(|e| {
            StoreError::DataCorruption(format!("Checkpointed registrations do not rebuild: {}", e))
        })?;

        let mut registry = rebuild.into_registry();
        for stored in rows {
            registry
                .restore_record(&stored.table_id, stored.key_tuple, stored.record)
                .map_err(|e| {
                    StoreError::DataCorruption(format!("Checkpointed record does not restore: {}", e))
                })?;
        }
        if registry.record_count() != checkpoint.record_count {
            return Err(StoreError::DataCorruption(format!(
                "Checkpoint declares {} records, data holds {}",
                checkpoint.record_count,
                registry.record_count()
            )));
        }

        let buffered = replica.buffered.len();
        let mut builder = ReplicaBuilder::resume(config, registry, checkpoint.next_index);
        builder.restore_fold_state(
            replica
                .buffered
                .into_iter()
                .map(|b| (b.index, b.event))
                .collect(),
            replica
                .halted
                .into_iter()
                .map(|h| (h.table_id, h.key_tuple, h.index))
                .collect(),
        );
        tracing::info!(
            "Restored {} records across {} tables and {} buffered events, resuming at event {}",
            checkpoint.record_count,
            checkpoint.table_count,
            buffered,
            checkpoint.next_index
        );
        Ok(Some(builder))
    }

    fn read(&self, path: &Path, context: &str) -> Result<Vec<u8>, StoreError> {
        retry_io_operation(
            || {
                fs::read(path)
                    .map_err(|e| classify_io_error(e, &format!("Failed to read {}", path.display())))
            },
            self.max_retries,
            self.retry_delay_ms,
            context,
        )
    }
}

/// Lists every record in replay order: the Tables registry's self record,
/// the other registrations, then each table's records by key.
fn stored_records(registry: &TableRegistry) -> Vec<StoredRecord> {
    let self_key = vec![*TABLES_TABLE_ID.as_word()];
    let mut out = Vec::with_capacity(registry.record_count());
    for table in registry.tables() {
        let mut records: Vec<_> = table.records().collect();
        records.sort_by(|(a, _), (b, _)| {
            (table.id == TABLES_TABLE_ID && **b == self_key)
                .cmp(&(table.id == TABLES_TABLE_ID && **a == self_key))
                .then_with(|| a.cmp(b))
        });
        out.extend(records.into_iter().map(|(key, record)| StoredRecord {
            table_id: table.id,
            key_tuple: key.clone(),
            record: record.clone(),
        }));
    }
    out
}
