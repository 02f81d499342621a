//! Replica configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the builder does with events for tables that are not registered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTablePolicy {
    /// Fail with `UnknownTable`
    #[default]
    Reject,
    /// Queue per table and replay once the registration arrives
    Buffer,
}

/// How far a failing event stops the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltPolicy {
    /// Stop at the first failing event
    #[default]
    Stream,
    /// Halt only the failing key; other keys keep folding
    Key,
}

/// What the builder does with events that would mutate a write-once
/// registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMutationPolicy {
    /// Fail with a stream integrity error
    #[default]
    Reject,
    /// Log and skip the event
    Ignore,
}

/// Replica configuration.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Handling of events for unregistered tables
    pub unknown_table_policy: UnknownTablePolicy,
    /// Scope of a fold failure
    pub halt_policy: HaltPolicy,
    /// Handling of writes to existing registry records
    pub registry_mutation_policy: RegistryMutationPolicy,
    /// Cross-check encoded lengths supplied by dynamic splices
    pub verify_encoded_lengths: bool,
    /// Upper bound on events held for unregistered tables
    pub max_buffered_events: usize,
    /// Data directory for checkpoints
    pub data_dir: PathBuf,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            unknown_table_policy: UnknownTablePolicy::Reject,
            halt_policy: HaltPolicy::Stream,
            registry_mutation_policy: RegistryMutationPolicy::Reject,
            verify_encoded_lengths: true,
            max_buffered_events: 10_000,
            data_dir: PathBuf::from("./data"),
            persistence_max_retries: 3,
            persistence_retry_delay_ms: 100,
        }
    }
}
