//! Generic table: schemas, names and the record map.
//!
//! Each table has:
//! - Key and value schema plus the field layout derived from the value schema
//! - Key and field names from its registration
//! - A write-once flag (set for the Tables registry)
//! - Records addressed by their exact key tuple

use std::collections::HashMap;

use alloy_primitives::B256;

use crate::codec;
use crate::error::StoreError;
use crate::types::{EncodedLengths, FieldLayout, FieldValue, Record, ResourceId, Schema, TableKind};

use super::registry::TableRegistration;
use super::validation;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Ordered key words addressing a record.
pub type KeyTuple = Vec<B256>;

/// Table schema and record storage.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table identifier
    pub id: ResourceId,
    /// On-chain or off-chain
    pub kind: TableKind,
    /// Schema of the key tuple
    pub key_schema: Schema,
    /// Schema of the record value
    pub value_schema: Schema,
    /// Layout derived from `value_schema`
    pub field_layout: FieldLayout,
    /// Names of the key fields, possibly empty
    pub key_names: Vec<String>,
    /// Names of the value fields, possibly empty
    pub field_names: Vec<String>,
    /// Records may be created but never changed or deleted
    pub write_once: bool,
    records: HashMap<KeyTuple, Record>,
}

impl Table {
    /// Creates an empty table from a registration.
    ///
    /// # Arguments
    /// * `registration` - Validated registration record
    /// * `write_once` - Whether existing records are immutable
    ///
    /// # Returns
    /// `Result<Table, StoreError>` with `InvalidResourceId` for an unsupported
    /// type tag or `SchemaViolation` if the layout disagrees with the schema.
    pub fn create(registration: TableRegistration, write_once: bool) -> Result<Self, StoreError> {
        let kind = registration.table_id.table_kind()?;
        registration.field_layout.ensure_matches(&registration.value_schema)?;
        Ok(Self {
            id: registration.table_id,
            kind,
            key_schema: registration.key_schema,
            value_schema: registration.value_schema,
            field_layout: registration.field_layout,
            key_names: registration.key_names,
            field_names: registration.field_names,
            write_once,
            records: HashMap::new(),
        })
    }

    /// Returns the record stored under `key`, if any.
    pub fn get(&self, key: &[B256]) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &[B256]) -> bool {
        self.records.contains_key(key)
    }

    /// Returns the number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Iterates over all records in unspecified order.
    pub fn records(&self) -> impl Iterator<Item = (&KeyTuple, &Record)> {
        self.records.iter()
    }

    /// Replaces the full record under `key`.
    ///
    /// # Returns
    /// `Err(StoreError::LayoutMismatch)` if the record disagrees with the
    /// table's field layout; the table is left unchanged.
    pub fn set_record(&mut self, key: KeyTuple, record: Record) -> Result<(), StoreError> {
        record.check_layout(&self.field_layout)?;
        self.records.insert(key, record);
        Ok(())
    }

    /// Overwrites `data.len()` bytes of static data at `start`.
    ///
    /// An absent record is first initialized to the unset value of the
    /// layout. The static length never changes.
    pub fn splice_static(&mut self, key: &[B256], start: u64, data: &[u8]) -> Result<(), StoreError> {
        let mut record = self.current_or_unset(key);
        validation::validate_static_splice(record.static_data.len(), start, data.len())?;

        let start = start as usize;
        record.static_data[start..start + data.len()].copy_from_slice(data);
        self.records.insert(key.to_vec(), record);
        Ok(())
    }

    /// Deletes `delete_count` bytes of dynamic data at `start`, inserts
    /// `data` in their place and stores `encoded_lengths`.
    ///
    /// # Arguments
    /// * `key` - Record key
    /// * `field_index` - Dynamic field being spliced
    /// * `start` - Offset within the concatenated dynamic data
    /// * `delete_count` - Number of bytes removed at `start`
    /// * `encoded_lengths` - Lengths after the splice, as supplied by the event
    /// * `data` - Bytes inserted at `start`
    /// * `verify` - Cross-check `encoded_lengths` against the splice
    #[allow(clippy::too_many_arguments)]
    pub fn splice_dynamic(
        &mut self,
        key: &[B256],
        field_index: usize,
        start: u64,
        delete_count: u64,
        encoded_lengths: EncodedLengths,
        data: &[u8],
        verify: bool,
    ) -> Result<(), StoreError> {
        if field_index >= self.field_layout.num_dynamic_fields() {
            return Err(StoreError::SchemaViolation(format!(
                "dynamic field index {} out of range for {} dynamic fields",
                field_index,
                self.field_layout.num_dynamic_fields()
            )));
        }

        let mut record = self.current_or_unset(key);
        validation::validate_dynamic_splice(record.dynamic_data.len(), start, delete_count)?;
        if verify {
            validation::verify_encoded_lengths(
                &record.encoded_lengths,
                &encoded_lengths,
                field_index,
                start,
                delete_count,
                data.len(),
                self.field_layout.num_dynamic_fields(),
            )?;
        }

        let start = start as usize;
        let end = start + delete_count as usize;
        record.dynamic_data.splice(start..end, data.iter().copied());
        record.encoded_lengths = encoded_lengths;
        self.records.insert(key.to_vec(), record);
        Ok(())
    }

    /// Inserts a record as stored. Records kept under trusted encoded
    /// lengths need not match the layout.
    pub(crate) fn restore(&mut self, key: KeyTuple, record: Record) {
        self.records.insert(key, record);
    }

    /// Removes the record under `key`, returning it if it existed.
    pub fn delete(&mut self, key: &[B256]) -> Option<Record> {
        self.records.remove(key)
    }

    /// Returns the encoded bytes of one field, or `None` for an absent key.
    pub fn get_field(&self, key: &[B256], field_index: usize) -> Result<Option<&[u8]>, StoreError> {
        self.records
            .get(key)
            .map(|record| codec::read_field(&self.field_layout, record, field_index))
            .transpose()
    }

    /// Returns the byte length of one field, or `None` for an absent key.
    pub fn get_field_length(
        &self,
        key: &[B256],
        field_index: usize,
    ) -> Result<Option<usize>, StoreError> {
        self.records
            .get(key)
            .map(|record| codec::field_length(&self.field_layout, record, field_index))
            .transpose()
    }

    /// Returns one decoded field, or `None` for an absent key.
    pub fn get_field_value(
        &self,
        key: &[B256],
        field_index: usize,
    ) -> Result<Option<FieldValue>, StoreError> {
        match self.get_field(key, field_index)? {
            Some(bytes) => {
                codec::decode_field(&self.value_schema, &self.field_layout, field_index, bytes)
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Returns all decoded fields of a record, or `None` for an absent key.
    pub fn get_values(&self, key: &[B256]) -> Result<Option<Vec<FieldValue>>, StoreError> {
        self.records
            .get(key)
            .map(|record| codec::decode_stored(&self.value_schema, &self.field_layout, record))
            .transpose()
    }

    /// Decodes every stored record, returning the first failure.
    #[cfg(not(feature = "parallel"))]
    pub fn validate_records(&self) -> Result<(), StoreError> {
        for record in self.records.values() {
            codec::decode_stored(&self.value_schema, &self.field_layout, record)?;
        }
        Ok(())
    }

    /// Decodes every stored record in parallel, returning a failure if any
    /// record is malformed.
    #[cfg(feature = "parallel")]
    pub fn validate_records(&self) -> Result<(), StoreError> {
        self.records.par_iter().try_for_each(|(_, record)| {
            codec::decode_stored(&self.value_schema, &self.field_layout, record).map(|_| ())
        })
    }

    fn current_or_unset(&self, key: &[B256]) -> Record {
        self.records
            .get(key)
            .cloned()
            .unwrap_or_else(|| Record::unset(&self.field_layout))
    }
}
