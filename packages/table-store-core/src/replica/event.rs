//! Store events emitted by every table mutation.

use std::fmt;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::types::{hex_bytes, EncodedLengths, Record, ResourceId};

/// One mutation of one record, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Overwrites the full record
    SetRecord {
        table_id: ResourceId,
        key_tuple: Vec<B256>,
        #[serde(with = "hex_bytes")]
        static_data: Vec<u8>,
        encoded_lengths: EncodedLengths,
        #[serde(with = "hex_bytes")]
        dynamic_data: Vec<u8>,
    },
    /// Overwrites `data.len()` bytes of static data at `start`
    SpliceStaticData {
        table_id: ResourceId,
        key_tuple: Vec<B256>,
        start: u64,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Replaces `delete_count` bytes of dynamic data at `start` with `data`
    SpliceDynamicData {
        table_id: ResourceId,
        key_tuple: Vec<B256>,
        dynamic_field_index: u8,
        start: u64,
        delete_count: u64,
        encoded_lengths: EncodedLengths,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Removes the record
    DeleteRecord {
        table_id: ResourceId,
        key_tuple: Vec<B256>,
    },
}

/// Event discriminant, for logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SetRecord,
    SpliceStaticData,
    SpliceDynamicData,
    DeleteRecord,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SetRecord => "SetRecord",
            EventKind::SpliceStaticData => "SpliceStaticData",
            EventKind::SpliceDynamicData => "SpliceDynamicData",
            EventKind::DeleteRecord => "DeleteRecord",
        };
        f.write_str(name)
    }
}

impl StoreEvent {
    /// Builds a SetRecord event carrying `record`.
    pub fn set_record(table_id: ResourceId, key_tuple: Vec<B256>, record: Record) -> Self {
        StoreEvent::SetRecord {
            table_id,
            key_tuple,
            static_data: record.static_data,
            encoded_lengths: record.encoded_lengths,
            dynamic_data: record.dynamic_data,
        }
    }

    pub fn table_id(&self) -> ResourceId {
        match self {
            StoreEvent::SetRecord { table_id, .. }
            | StoreEvent::SpliceStaticData { table_id, .. }
            | StoreEvent::SpliceDynamicData { table_id, .. }
            | StoreEvent::DeleteRecord { table_id, .. } => *table_id,
        }
    }

    pub fn key_tuple(&self) -> &[B256] {
        match self {
            StoreEvent::SetRecord { key_tuple, .. }
            | StoreEvent::SpliceStaticData { key_tuple, .. }
            | StoreEvent::SpliceDynamicData { key_tuple, .. }
            | StoreEvent::DeleteRecord { key_tuple, .. } => key_tuple,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::SetRecord { .. } => EventKind::SetRecord,
            StoreEvent::SpliceStaticData { .. } => EventKind::SpliceStaticData,
            StoreEvent::SpliceDynamicData { .. } => EventKind::SpliceDynamicData,
            StoreEvent::DeleteRecord { .. } => EventKind::DeleteRecord,
        }
    }
}
