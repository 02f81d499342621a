//! The three-part stored form of a table record.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::encoded_lengths::EncodedLengths;
use super::field_layout::FieldLayout;
use crate::error::StoreError;

/// Packed record value: static fields, dynamic lengths, dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Static fields concatenated without padding
    #[serde(with = "hex_bytes")]
    pub static_data: Vec<u8>,
    /// Per-field and total lengths of `dynamic_data`
    pub encoded_lengths: EncodedLengths,
    /// Dynamic fields concatenated without length prefixes
    #[serde(with = "hex_bytes")]
    pub dynamic_data: Vec<u8>,
}

impl Record {
    pub fn new(static_data: Vec<u8>, encoded_lengths: EncodedLengths, dynamic_data: Vec<u8>) -> Self {
        Self {
            static_data,
            encoded_lengths,
            dynamic_data,
        }
    }

    /// Value of a record that was never written: zeroed static fields, no
    /// dynamic data.
    pub fn unset(layout: &FieldLayout) -> Self {
        Self {
            static_data: vec![0; layout.static_data_length()],
            encoded_lengths: EncodedLengths::ZERO,
            dynamic_data: Vec::new(),
        }
    }

    /// Checks the record's byte lengths against a field layout.
    pub fn check_layout(&self, layout: &FieldLayout) -> Result<(), StoreError> {
        if self.static_data.len() != layout.static_data_length() {
            return Err(StoreError::LayoutMismatch(format!(
                "static data is {} bytes, layout declares {}",
                self.static_data.len(),
                layout.static_data_length()
            )));
        }
        self.encoded_lengths.validate(layout.num_dynamic_fields())?;
        if self.dynamic_data.len() as u64 != self.encoded_lengths.total() {
            return Err(StoreError::LayoutMismatch(format!(
                "dynamic data is {} bytes, encoded lengths declare {}",
                self.dynamic_data.len(),
                self.encoded_lengths.total()
            )));
        }
        Ok(())
    }

    /// Byte range of dynamic field `index` within `dynamic_data`.
    pub fn dynamic_field_range(&self, index: usize) -> Range<usize> {
        let start = self.encoded_lengths.field_offset(index) as usize;
        start..start + self.encoded_lengths.field_length(index) as usize
    }
}

/// Serde adapter writing byte vectors as `0x`-prefixed hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
