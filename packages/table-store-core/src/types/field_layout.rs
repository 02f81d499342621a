//! Precomputed static field widths for a value schema.

use alloy_primitives::B256;

use super::schema::{Schema, HEADER_BYTES, MAX_DYNAMIC_FIELDS, MAX_TOTAL_FIELDS};
use crate::error::StoreError;

/// Byte widths of the static fields plus the dynamic field count.
///
/// Lets readers slice static data without mapping type tags to widths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    static_field_lengths: Vec<u8>,
    num_dynamic_fields: usize,
    static_data_length: usize,
}

impl FieldLayout {
    /// Builds a layout from explicit static widths.
    pub fn new(static_field_lengths: Vec<u8>, num_dynamic_fields: usize) -> Result<Self, StoreError> {
        let total = static_field_lengths.len() + num_dynamic_fields;
        if total > MAX_TOTAL_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "field layout field count",
                got: total as u64,
                max: MAX_TOTAL_FIELDS as u64,
            });
        }
        if num_dynamic_fields > MAX_DYNAMIC_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "dynamic field count",
                got: num_dynamic_fields as u64,
                max: MAX_DYNAMIC_FIELDS as u64,
            });
        }
        if let Some(index) = static_field_lengths
            .iter()
            .position(|len| *len == 0 || *len > 32)
        {
            return Err(StoreError::SchemaViolation(format!(
                "static field {} has invalid length {}",
                index, static_field_lengths[index]
            )));
        }

        let static_data_length = static_field_lengths.iter().map(|l| *l as usize).sum();
        Ok(Self {
            static_field_lengths,
            num_dynamic_fields,
            static_data_length,
        })
    }

    /// Derives the layout of a value schema.
    pub fn from_schema(schema: &Schema) -> Result<Self, StoreError> {
        let lengths = schema.types()[..schema.num_static_fields()]
            .iter()
            .map(|ty| ty.static_byte_length() as u8)
            .collect();
        Self::new(lengths, schema.num_dynamic_fields())
    }

    /// Checks that this layout describes `schema` exactly.
    pub fn ensure_matches(&self, schema: &Schema) -> Result<(), StoreError> {
        let derived = Self::from_schema(schema)?;
        if &derived != self {
            return Err(StoreError::SchemaViolation(format!(
                "field layout {:?} does not match schema (expected {:?})",
                self.static_field_lengths, derived.static_field_lengths
            )));
        }
        Ok(())
    }

    pub fn static_field_lengths(&self) -> &[u8] {
        &self.static_field_lengths
    }

    pub fn num_static_fields(&self) -> usize {
        self.static_field_lengths.len()
    }

    pub fn num_dynamic_fields(&self) -> usize {
        self.num_dynamic_fields
    }

    pub fn num_fields(&self) -> usize {
        self.static_field_lengths.len() + self.num_dynamic_fields
    }

    pub fn static_data_length(&self) -> usize {
        self.static_data_length
    }

    /// Byte offset of a static field within static data.
    pub fn static_field_offset(&self, index: usize) -> Option<usize> {
        if index >= self.static_field_lengths.len() {
            return None;
        }
        Some(
            self.static_field_lengths[..index]
                .iter()
                .map(|l| *l as usize)
                .sum(),
        )
    }

    /// Packs the layout into its 32-byte word.
    pub fn encode(&self) -> B256 {
        let mut word = [0u8; 32];
        word[..2].copy_from_slice(&(self.static_data_length as u16).to_be_bytes());
        word[2] = self.static_field_lengths.len() as u8;
        word[3] = self.num_dynamic_fields as u8;
        word[HEADER_BYTES..HEADER_BYTES + self.static_field_lengths.len()]
            .copy_from_slice(&self.static_field_lengths);
        B256::new(word)
    }

    /// Unpacks and validates a layout word.
    pub fn decode(word: &B256) -> Result<Self, StoreError> {
        let declared_length = u16::from_be_bytes([word[0], word[1]]) as usize;
        let num_static = word[2] as usize;
        let num_dynamic = word[3] as usize;
        if num_static + num_dynamic > MAX_TOTAL_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "field layout field count",
                got: (num_static + num_dynamic) as u64,
                max: MAX_TOTAL_FIELDS as u64,
            });
        }
        let lengths = word[HEADER_BYTES..HEADER_BYTES + num_static].to_vec();
        if word[HEADER_BYTES + num_static..].iter().any(|b| *b != 0) {
            return Err(StoreError::SchemaViolation(
                "field layout word has non-zero bytes after the last static field".to_string(),
            ));
        }

        let layout = Self::new(lengths, num_dynamic)?;
        if layout.static_data_length != declared_length {
            return Err(StoreError::SchemaViolation(format!(
                "field layout declares static length {} but its fields sum to {}",
                declared_length, layout.static_data_length
            )));
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaType;

    #[test]
    fn test_layout_from_schema() {
        let schema = Schema::value(vec![
            SchemaType::Uint(8),
            SchemaType::Address,
            SchemaType::Bool,
            SchemaType::Bytes,
            SchemaType::UintArray(4),
        ])
        .unwrap();
        let layout = FieldLayout::from_schema(&schema).unwrap();
        assert_eq!(layout.static_field_lengths(), &[8, 20, 1]);
        assert_eq!(layout.num_dynamic_fields(), 2);
        assert_eq!(layout.static_data_length(), 29);
        assert_eq!(layout.static_field_offset(2), Some(28));
        assert_eq!(layout.static_field_offset(3), None);

        let word = layout.encode();
        assert_eq!(&word[..7], &[0x00, 29, 3, 2, 8, 20, 1]);
        assert_eq!(FieldLayout::decode(&word).unwrap(), layout);
        layout.ensure_matches(&schema).unwrap();
    }

    #[test]
    fn test_layout_mismatch_detected() {
        let schema = Schema::value(vec![SchemaType::Uint(8), SchemaType::String]).unwrap();
        let other = FieldLayout::new(vec![4], 1).unwrap();
        assert!(matches!(
            other.ensure_matches(&schema),
            Err(StoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(FieldLayout::new(vec![0], 0).is_err());
        assert!(FieldLayout::new(vec![33], 0).is_err());
        assert!(FieldLayout::new(vec![], 6).is_err());
        assert!(FieldLayout::new(vec![1; 25], 4).is_err());
    }
}
