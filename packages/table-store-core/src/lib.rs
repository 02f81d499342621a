//! Record codec, table registry and event replica builder for table-based
//! stores.
//!
//! Provides the packed record encoding, schema and field-layout types, the
//! Tables registry, replica reconstruction from store events, snapshot
//! publication and checkpoint persistence.

pub mod codec;
pub mod config;
pub mod error;
pub mod persistence;
pub mod replica;
pub mod table;
pub mod types;

pub use config::{HaltPolicy, RegistryMutationPolicy, ReplicaConfig, UnknownTablePolicy};
pub use error::{Result, StoreError};
pub use replica::{FoldSummary, ReplicaBuilder, ReplicaSnapshots, StoreEvent};
pub use table::{Table, TableRegistration, TableRegistry, TABLES_TABLE_ID};
