//! 32-byte field-list descriptors for keys and values.

use alloy_primitives::B256;

use super::schema_type::SchemaType;
use crate::error::StoreError;

/// Maximum number of fields a schema or field layout can describe.
pub const MAX_TOTAL_FIELDS: usize = 28;
/// Maximum number of dynamic fields in a value schema.
pub const MAX_DYNAMIC_FIELDS: usize = 5;
/// Bytes 0-3 of the word: static length (u16), static count, dynamic count.
pub(crate) const HEADER_BYTES: usize = 4;

/// Ordered list of field types, static types first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    types: Vec<SchemaType>,
    num_static_fields: usize,
    static_data_length: usize,
}

impl Schema {
    /// Builds a schema from field types.
    ///
    /// # Returns
    /// `Err(StoreError)` if a dynamic type precedes a static one, a width is
    /// invalid, or the field limits are exceeded.
    pub fn new(types: Vec<SchemaType>) -> Result<Self, StoreError> {
        if types.len() > MAX_TOTAL_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "schema field count",
                got: types.len() as u64,
                max: MAX_TOTAL_FIELDS as u64,
            });
        }

        let mut num_static_fields = 0;
        let mut static_data_length = 0;
        let mut seen_dynamic = false;
        for ty in &types {
            ty.validate()?;
            if ty.is_dynamic() {
                seen_dynamic = true;
            } else if seen_dynamic {
                return Err(StoreError::SchemaViolation(format!(
                    "static type {} declared after a dynamic type",
                    ty
                )));
            } else {
                num_static_fields += 1;
                static_data_length += ty.static_byte_length();
            }
        }

        let num_dynamic_fields = types.len() - num_static_fields;
        if num_dynamic_fields > MAX_DYNAMIC_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "dynamic field count",
                got: num_dynamic_fields as u64,
                max: MAX_DYNAMIC_FIELDS as u64,
            });
        }

        Ok(Self {
            types,
            num_static_fields,
            static_data_length,
        })
    }

    /// Builds a key schema: static fields only, possibly empty.
    pub fn key(types: Vec<SchemaType>) -> Result<Self, StoreError> {
        let schema = Self::new(types)?;
        schema.validate(true)?;
        if schema.num_dynamic_fields() > 0 {
            return Err(StoreError::SchemaViolation(
                "key schema cannot contain dynamic fields".to_string(),
            ));
        }
        Ok(schema)
    }

    /// Builds a value schema: at least one field.
    pub fn value(types: Vec<SchemaType>) -> Result<Self, StoreError> {
        let schema = Self::new(types)?;
        schema.validate(false)?;
        Ok(schema)
    }

    /// Checks emptiness rules; key schemas may be empty (singleton tables).
    pub fn validate(&self, allow_empty: bool) -> Result<(), StoreError> {
        if !allow_empty && self.types.is_empty() {
            return Err(StoreError::SchemaViolation(
                "value schema must declare at least one field".to_string(),
            ));
        }
        Ok(())
    }

    pub fn types(&self) -> &[SchemaType] {
        &self.types
    }

    pub fn field_type(&self, index: usize) -> Option<SchemaType> {
        self.types.get(index).copied()
    }

    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    pub fn num_static_fields(&self) -> usize {
        self.num_static_fields
    }

    pub fn num_dynamic_fields(&self) -> usize {
        self.types.len() - self.num_static_fields
    }

    /// Total byte length of all static fields.
    pub fn static_data_length(&self) -> usize {
        self.static_data_length
    }

    /// Packs the schema into its 32-byte word.
    pub fn encode(&self) -> B256 {
        let mut word = [0u8; 32];
        word[..2].copy_from_slice(&(self.static_data_length as u16).to_be_bytes());
        word[2] = self.num_static_fields as u8;
        word[3] = self.num_dynamic_fields() as u8;
        for (slot, ty) in word[HEADER_BYTES..].iter_mut().zip(&self.types) {
            *slot = ty.tag();
        }
        B256::new(word)
    }

    /// Unpacks and validates a schema word.
    pub fn decode(word: &B256) -> Result<Self, StoreError> {
        let declared_length = u16::from_be_bytes([word[0], word[1]]) as usize;
        let num_static = word[2] as usize;
        let num_dynamic = word[3] as usize;
        let total = num_static + num_dynamic;
        if total > MAX_TOTAL_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "schema field count",
                got: total as u64,
                max: MAX_TOTAL_FIELDS as u64,
            });
        }

        let types = word[HEADER_BYTES..HEADER_BYTES + total]
            .iter()
            .map(|tag| SchemaType::from_tag(*tag))
            .collect::<Result<Vec<_>, _>>()?;
        if word[HEADER_BYTES + total..].iter().any(|b| *b != 0) {
            return Err(StoreError::SchemaViolation(
                "schema word has non-zero bytes after the last field".to_string(),
            ));
        }

        let schema = Self::new(types)?;
        if schema.num_static_fields != num_static {
            return Err(StoreError::SchemaViolation(format!(
                "schema declares {} static fields but lists {}",
                num_static, schema.num_static_fields
            )));
        }
        if schema.static_data_length != declared_length {
            return Err(StoreError::SchemaViolation(format!(
                "schema declares static length {} but its types sum to {}",
                declared_length, schema.static_data_length
            )));
        }
        Ok(schema)
    }
}
