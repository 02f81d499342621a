//! The Tables registry: registration records and the owned table map.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::B256;

use crate::codec::{self, decode_names, encode_names};
use crate::error::StoreError;
use crate::types::{
    pack_resource_id, FieldLayout, FieldValue, Record, ResourceId, Schema, SchemaType,
    RESOURCE_TABLE,
};

use super::table::{KeyTuple, Table};

/// Id of the registry table itself: `tb` / `store` / `Tables`.
pub const TABLES_TABLE_ID: ResourceId =
    ResourceId::from_word(B256::new(pack_resource_id(&RESOURCE_TABLE, b"store", b"Tables")));

const TABLES_KEY_NAMES: [&str; 1] = ["tableId"];
const TABLES_FIELD_NAMES: [&str; 5] = [
    "fieldLayout",
    "keySchema",
    "valueSchema",
    "abiEncodedKeyNames",
    "abiEncodedFieldNames",
];

/// Decoded value of one Tables registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegistration {
    pub table_id: ResourceId,
    pub field_layout: FieldLayout,
    pub key_schema: Schema,
    pub value_schema: Schema,
    pub key_names: Vec<String>,
    pub field_names: Vec<String>,
}

impl TableRegistration {
    /// Builds a registration, deriving the field layout from the value schema.
    ///
    /// Name lists must be empty or name every field.
    pub fn new(
        table_id: ResourceId,
        key_schema: Schema,
        value_schema: Schema,
        key_names: Vec<String>,
        field_names: Vec<String>,
    ) -> Result<Self, StoreError> {
        let field_layout = FieldLayout::from_schema(&value_schema)?;
        let registration = Self {
            table_id,
            field_layout,
            key_schema,
            value_schema,
            key_names,
            field_names,
        };
        registration.validate()?;
        Ok(registration)
    }

    /// Registration of the Tables registry itself.
    pub fn tables_table() -> Result<Self, StoreError> {
        let bytes32 = SchemaType::FixedBytes(32);
        Self::new(
            TABLES_TABLE_ID,
            Schema::key(vec![bytes32])?,
            Schema::value(vec![
                bytes32,
                bytes32,
                bytes32,
                SchemaType::Bytes,
                SchemaType::Bytes,
            ])?,
            TABLES_KEY_NAMES.iter().map(|s| s.to_string()).collect(),
            TABLES_FIELD_NAMES.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Key tuple of this registration inside the Tables registry.
    pub fn key_tuple(&self) -> Vec<B256> {
        vec![*self.table_id.as_word()]
    }

    /// Checks schema kinds, layout agreement and name counts.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.table_id.table_kind()?;
        if self.key_schema.num_dynamic_fields() > 0 {
            return Err(StoreError::SchemaViolation(format!(
                "key schema of {} has dynamic fields",
                self.table_id
            )));
        }
        self.value_schema.validate(false)?;
        self.field_layout.ensure_matches(&self.value_schema)?;
        check_names("key", &self.key_names, self.key_schema.num_fields())?;
        check_names("field", &self.field_names, self.value_schema.num_fields())?;
        Ok(())
    }

    /// Encodes the registration as a Tables registry record.
    pub fn to_record(&self) -> Result<Record, StoreError> {
        let tables = Self::tables_table()?;
        let fields = vec![
            FieldValue::FixedBytes(self.field_layout.encode().to_vec()),
            FieldValue::FixedBytes(self.key_schema.encode().to_vec()),
            FieldValue::FixedBytes(self.value_schema.encode().to_vec()),
            FieldValue::Bytes(encode_names(&self.key_names)),
            FieldValue::Bytes(encode_names(&self.field_names)),
        ];
        codec::encode_record(&tables.value_schema, &tables.field_layout, &fields)
    }

    /// Decodes and validates a Tables registry record stored under `key`.
    pub fn from_record(key: &[B256], record: &Record) -> Result<Self, StoreError> {
        let [table_word] = key else {
            return Err(StoreError::SchemaViolation(format!(
                "registry key has {} words, expected 1",
                key.len()
            )));
        };
        let tables = Self::tables_table()?;
        let fields = codec::decode_stored(&tables.value_schema, &tables.field_layout, record)?;
        let [layout, key_schema, value_schema, key_names, field_names] = fields.as_slice() else {
            return Err(StoreError::SchemaViolation(
                "registry record must have 5 fields".to_string(),
            ));
        };

        let registration = Self {
            table_id: ResourceId::from_word(*table_word),
            field_layout: FieldLayout::decode(&word(layout)?)?,
            key_schema: Schema::decode(&word(key_schema)?)?,
            value_schema: Schema::decode(&word(value_schema)?)?,
            key_names: decode_names(bytes(key_names)?)?,
            field_names: decode_names(bytes(field_names)?)?,
        };
        registration.validate()?;
        Ok(registration)
    }
}

fn check_names(what: &str, names: &[String], num_fields: usize) -> Result<(), StoreError> {
    if !names.is_empty() && names.len() != num_fields {
        return Err(StoreError::SchemaViolation(format!(
            "{} {} names for {} fields",
            names.len(),
            what,
            num_fields
        )));
    }
    Ok(())
}

fn word(value: &FieldValue) -> Result<B256, StoreError> {
    match value {
        FieldValue::FixedBytes(b) if b.len() == 32 => Ok(B256::from_slice(b)),
        other => Err(StoreError::SchemaViolation(format!(
            "expected bytes32, got {} value",
            other.kind()
        ))),
    }
}

fn bytes(value: &FieldValue) -> Result<&[u8], StoreError> {
    match value {
        FieldValue::Bytes(b) => Ok(b),
        other => Err(StoreError::SchemaViolation(format!(
            "expected bytes, got {} value",
            other.kind()
        ))),
    }
}

/// Owned map of registered tables.
///
/// Tables are shared copy-on-write so published snapshots only clone the
/// tables that changed since the previous publication.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: HashMap<ResourceId, Arc<Table>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding only the Tables registry and its
    /// self-describing record.
    pub fn bootstrapped() -> Result<Self, StoreError> {
        let mut registry = Self::new();
        let tables = TableRegistration::tables_table()?;
        let record = tables.to_record()?;
        registry.insert_table(tables.clone(), record)?;
        Ok(registry)
    }

    /// Whether the Tables registry's own record has been set.
    pub fn is_bootstrapped(&self) -> bool {
        self.tables.contains_key(&TABLES_TABLE_ID)
    }

    /// Registers a table and writes its registration record.
    ///
    /// # Returns
    /// `UnknownTable` before bootstrap, `SchemaViolation` if the table is
    /// already registered or the registration is invalid.
    pub fn register(&mut self, registration: TableRegistration) -> Result<(), StoreError> {
        if !self.is_bootstrapped() {
            return Err(StoreError::UnknownTable {
                table: TABLES_TABLE_ID.to_string(),
            });
        }
        registration.validate()?;
        let record = registration.to_record()?;
        self.insert_table(registration, record)
    }

    /// Creates the table for `registration` and stores `record` under its
    /// key in the Tables registry.
    pub(crate) fn insert_table(
        &mut self,
        registration: TableRegistration,
        record: Record,
    ) -> Result<(), StoreError> {
        if self.tables.contains_key(&registration.table_id) {
            return Err(StoreError::SchemaViolation(format!(
                "table {} is already registered",
                registration.table_id
            )));
        }
        let key = registration.key_tuple();
        let table_id = registration.table_id;
        let write_once = table_id == TABLES_TABLE_ID;
        let table = Table::create(registration, write_once)?;
        if table_id == TABLES_TABLE_ID {
            let mut table = table;
            table.set_record(key, record)?;
            self.tables.insert(table_id, Arc::new(table));
            return Ok(());
        }
        self.table_mut(&TABLES_TABLE_ID)?.set_record(key, record)?;
        self.tables.insert(table_id, Arc::new(table));
        Ok(())
    }

    /// Reinstates a checkpointed record of a registered table as stored,
    /// without checking it against the table's layout.
    pub(crate) fn restore_record(
        &mut self,
        table_id: &ResourceId,
        key: KeyTuple,
        record: Record,
    ) -> Result<(), StoreError> {
        self.table_mut(table_id)?.restore(key, record);
        Ok(())
    }

    /// Returns a registered table.
    pub fn table(&self, table_id: &ResourceId) -> Option<&Table> {
        self.tables.get(table_id).map(|t| t.as_ref())
    }

    /// Returns a registered table for mutation, cloning it first if a
    /// snapshot still shares it.
    pub(crate) fn table_mut(&mut self, table_id: &ResourceId) -> Result<&mut Table, StoreError> {
        self.tables
            .get_mut(table_id)
            .map(Arc::make_mut)
            .ok_or_else(|| StoreError::UnknownTable {
                table: table_id.to_string(),
            })
    }

    pub fn contains(&self, table_id: &ResourceId) -> bool {
        self.tables.contains_key(table_id)
    }

    /// Iterates over registered tables, Tables registry first, the rest in id
    /// order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        let mut tables: Vec<&Table> = self.tables.values().map(|t| t.as_ref()).collect();
        tables.sort_by_key(|t| (t.id != TABLES_TABLE_ID, t.id));
        tables.into_iter()
    }

    /// Returns the total number of records across all tables.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(|t| t.record_count()).sum()
    }

    /// Finds a table by hex id or by `name` / `namespace:name`.
    pub fn find(&self, query: &str) -> Option<&Table> {
        if let Some(hex_id) = query.strip_prefix("0x") {
            let bytes = hex::decode(hex_id).ok()?;
            if bytes.len() != 32 {
                return None;
            }
            return self.table(&ResourceId::from_word(B256::from_slice(&bytes)));
        }
        let (namespace, name) = match query.split_once(':') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, query),
        };
        self.tables().find(|t| {
            t.id.name() == name && namespace.map_or(true, |ns| t.id.namespace() == ns)
        })
    }

    /// Returns the record under `key` in `table_id`.
    ///
    /// # Returns
    /// `UnknownTable` for an unregistered table, `None` for an absent key.
    pub fn get_record(
        &self,
        table_id: &ResourceId,
        key: &[B256],
    ) -> Result<Option<&Record>, StoreError> {
        Ok(self.registered(table_id)?.get(key))
    }

    /// Returns the encoded bytes of one field.
    pub fn get_field(
        &self,
        table_id: &ResourceId,
        key: &[B256],
        field_index: usize,
    ) -> Result<Option<&[u8]>, StoreError> {
        self.registered(table_id)?.get_field(key, field_index)
    }

    /// Returns the byte length of one field.
    pub fn get_field_length(
        &self,
        table_id: &ResourceId,
        key: &[B256],
        field_index: usize,
    ) -> Result<Option<usize>, StoreError> {
        self.registered(table_id)?.get_field_length(key, field_index)
    }

    /// Returns one decoded field.
    pub fn get_field_value(
        &self,
        table_id: &ResourceId,
        key: &[B256],
        field_index: usize,
    ) -> Result<Option<FieldValue>, StoreError> {
        self.registered(table_id)?.get_field_value(key, field_index)
    }

    /// Decodes every record of every table.
    pub fn validate_records(&self) -> Result<(), StoreError> {
        for table in self.tables.values() {
            table.validate_records()?;
        }
        Ok(())
    }

    fn registered(&self, table_id: &ResourceId) -> Result<&Table, StoreError> {
        self.table(table_id).ok_or_else(|| StoreError::UnknownTable {
            table: table_id.to_string(),
        })
    }
}
