//! Packed dynamic field lengths.
//!
//! Word layout, least significant bits first:
//! - bits 0..56: total byte length of all dynamic data
//! - bits 56..96, 96..136, ...: 40-bit length of dynamic field 0, 1, ...

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use super::schema::MAX_DYNAMIC_FIELDS;
use crate::error::StoreError;

/// Largest value of the 56-bit total.
pub const MAX_TOTAL_LENGTH: u64 = (1 << 56) - 1;
/// Largest value of a 40-bit per-field slot.
pub const MAX_FIELD_LENGTH: u64 = (1 << 40) - 1;

const TOTAL_BYTES: usize = 7;
const SLOT_BYTES: usize = 5;

/// Total and per-field byte lengths of a record's dynamic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "B256", into = "B256")]
pub struct EncodedLengths {
    total: u64,
    slots: [u64; MAX_DYNAMIC_FIELDS],
}

impl EncodedLengths {
    /// All-zero lengths, the value of a record with no dynamic data.
    pub const ZERO: Self = Self {
        total: 0,
        slots: [0; MAX_DYNAMIC_FIELDS],
    };

    /// Packs per-field lengths, computing the total.
    pub fn pack(lengths: &[usize]) -> Result<Self, StoreError> {
        if lengths.len() > MAX_DYNAMIC_FIELDS {
            return Err(StoreError::LimitExceeded {
                what: "dynamic field count",
                got: lengths.len() as u64,
                max: MAX_DYNAMIC_FIELDS as u64,
            });
        }

        let mut slots = [0u64; MAX_DYNAMIC_FIELDS];
        let mut total: u64 = 0;
        for (slot, len) in slots.iter_mut().zip(lengths) {
            let len = *len as u64;
            if len > MAX_FIELD_LENGTH {
                return Err(StoreError::LimitExceeded {
                    what: "dynamic field length",
                    got: len,
                    max: MAX_FIELD_LENGTH,
                });
            }
            *slot = len;
            total += len;
        }
        if total > MAX_TOTAL_LENGTH {
            return Err(StoreError::LimitExceeded {
                what: "dynamic data length",
                got: total,
                max: MAX_TOTAL_LENGTH,
            });
        }
        Ok(Self { total, slots })
    }

    /// Declared total of all dynamic data.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Declared length of dynamic field `index` (0 for unused slots).
    pub fn field_length(&self, index: usize) -> u64 {
        self.slots.get(index).copied().unwrap_or(0)
    }

    pub fn slots(&self) -> &[u64; MAX_DYNAMIC_FIELDS] {
        &self.slots
    }

    /// Sum of all per-field slots.
    pub fn slot_sum(&self) -> u64 {
        self.slots.iter().sum()
    }

    /// Byte offset where dynamic field `index` starts within dynamic data.
    pub fn field_offset(&self, index: usize) -> u64 {
        self.slots[..index.min(MAX_DYNAMIC_FIELDS)].iter().sum()
    }

    /// Checks that the slots sum to the declared total and that slots beyond
    /// `num_dynamic_fields` are zero.
    pub fn validate(&self, num_dynamic_fields: usize) -> Result<(), StoreError> {
        if self.slot_sum() != self.total {
            return Err(StoreError::LayoutMismatch(format!(
                "dynamic field lengths sum to {} but the declared total is {}",
                self.slot_sum(),
                self.total
            )));
        }
        if let Some(index) = self
            .slots
            .iter()
            .skip(num_dynamic_fields)
            .position(|len| *len != 0)
        {
            return Err(StoreError::LayoutMismatch(format!(
                "unused dynamic length slot {} is non-zero",
                num_dynamic_fields + index
            )));
        }
        Ok(())
    }

    /// Packs into the 32-byte big-endian word.
    pub fn to_word(&self) -> B256 {
        let mut word = [0u8; 32];
        word[32 - TOTAL_BYTES..].copy_from_slice(&self.total.to_be_bytes()[8 - TOTAL_BYTES..]);
        for (i, len) in self.slots.iter().enumerate() {
            let end = 32 - TOTAL_BYTES - i * SLOT_BYTES;
            word[end - SLOT_BYTES..end].copy_from_slice(&len.to_be_bytes()[8 - SLOT_BYTES..]);
        }
        B256::new(word)
    }

    /// Unpacks a word; every bit pattern is representable, use `validate`
    /// to check consistency.
    pub fn from_word(word: &B256) -> Self {
        let read = |range: std::ops::Range<usize>| {
            let mut buf = [0u8; 8];
            buf[8 - range.len()..].copy_from_slice(&word[range]);
            u64::from_be_bytes(buf)
        };
        let total = read(32 - TOTAL_BYTES..32);
        let mut slots = [0u64; MAX_DYNAMIC_FIELDS];
        for (i, slot) in slots.iter_mut().enumerate() {
            let end = 32 - TOTAL_BYTES - i * SLOT_BYTES;
            *slot = read(end - SLOT_BYTES..end);
        }
        Self { total, slots }
    }
}

impl From<B256> for EncodedLengths {
    fn from(word: B256) -> Self {
        Self::from_word(&word)
    }
}

impl From<EncodedLengths> for B256 {
    fn from(lengths: EncodedLengths) -> Self {
        lengths.to_word()
    }
}
