//! One-byte field type tags.

use std::fmt;

use crate::error::StoreError;

const UINT_BASE: u8 = 0;
const INT_BASE: u8 = 32;
const FIXED_BYTES_BASE: u8 = 64;
const BOOL_TAG: u8 = 96;
const ADDRESS_TAG: u8 = 97;
const UINT_ARRAY_BASE: u8 = 98;
const INT_ARRAY_BASE: u8 = 130;
const FIXED_BYTES_ARRAY_BASE: u8 = 162;
const BOOL_ARRAY_TAG: u8 = 194;
const ADDRESS_ARRAY_TAG: u8 = 195;
const BYTES_TAG: u8 = 196;
const STRING_TAG: u8 = 197;

/// Byte width of an address.
pub const ADDRESS_BYTES: usize = 20;

/// Field type of a schema entry.
///
/// Sized variants carry their width in bytes (1..=32): `Uint(8)` is `uint64`,
/// `FixedBytes(20)` is `bytes20`, `IntArray(4)` is `int32[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Uint(u8),
    Int(u8),
    FixedBytes(u8),
    Bool,
    Address,
    UintArray(u8),
    IntArray(u8),
    FixedBytesArray(u8),
    BoolArray,
    AddressArray,
    Bytes,
    String,
}

impl SchemaType {
    /// Decodes a type tag.
    pub fn from_tag(tag: u8) -> Result<Self, StoreError> {
        let ty = match tag {
            0..=31 => SchemaType::Uint(tag - UINT_BASE + 1),
            32..=63 => SchemaType::Int(tag - INT_BASE + 1),
            64..=95 => SchemaType::FixedBytes(tag - FIXED_BYTES_BASE + 1),
            BOOL_TAG => SchemaType::Bool,
            ADDRESS_TAG => SchemaType::Address,
            98..=129 => SchemaType::UintArray(tag - UINT_ARRAY_BASE + 1),
            130..=161 => SchemaType::IntArray(tag - INT_ARRAY_BASE + 1),
            162..=193 => SchemaType::FixedBytesArray(tag - FIXED_BYTES_ARRAY_BASE + 1),
            BOOL_ARRAY_TAG => SchemaType::BoolArray,
            ADDRESS_ARRAY_TAG => SchemaType::AddressArray,
            BYTES_TAG => SchemaType::Bytes,
            STRING_TAG => SchemaType::String,
            _ => {
                return Err(StoreError::SchemaViolation(format!(
                    "unknown schema type tag {}",
                    tag
                )))
            }
        };
        Ok(ty)
    }

    /// Encodes the type as its tag byte.
    ///
    /// Sized variants must hold a width in 1..=32; `validate` checks this.
    pub fn tag(&self) -> u8 {
        match *self {
            SchemaType::Uint(w) => UINT_BASE + w - 1,
            SchemaType::Int(w) => INT_BASE + w - 1,
            SchemaType::FixedBytes(w) => FIXED_BYTES_BASE + w - 1,
            SchemaType::Bool => BOOL_TAG,
            SchemaType::Address => ADDRESS_TAG,
            SchemaType::UintArray(w) => UINT_ARRAY_BASE + w - 1,
            SchemaType::IntArray(w) => INT_ARRAY_BASE + w - 1,
            SchemaType::FixedBytesArray(w) => FIXED_BYTES_ARRAY_BASE + w - 1,
            SchemaType::BoolArray => BOOL_ARRAY_TAG,
            SchemaType::AddressArray => ADDRESS_ARRAY_TAG,
            SchemaType::Bytes => BYTES_TAG,
            SchemaType::String => STRING_TAG,
        }
    }

    /// Checks that sized variants carry a width in 1..=32.
    pub fn validate(&self) -> Result<(), StoreError> {
        let width = match *self {
            SchemaType::Uint(w)
            | SchemaType::Int(w)
            | SchemaType::FixedBytes(w)
            | SchemaType::UintArray(w)
            | SchemaType::IntArray(w)
            | SchemaType::FixedBytesArray(w) => w,
            _ => return Ok(()),
        };
        if (1..=32).contains(&width) {
            Ok(())
        } else {
            Err(StoreError::SchemaViolation(format!(
                "invalid width {} bytes for {:?}",
                width, self
            )))
        }
    }

    /// Returns `true` for variable-length types.
    pub fn is_dynamic(&self) -> bool {
        self.static_byte_length() == 0
    }

    /// Encoded width of a static type; 0 for dynamic types.
    pub fn static_byte_length(&self) -> usize {
        match *self {
            SchemaType::Uint(w) | SchemaType::Int(w) | SchemaType::FixedBytes(w) => w as usize,
            SchemaType::Bool => 1,
            SchemaType::Address => ADDRESS_BYTES,
            _ => 0,
        }
    }

    /// Width of one packed element for array types.
    pub fn array_element_length(&self) -> Option<usize> {
        match *self {
            SchemaType::UintArray(w) | SchemaType::IntArray(w) | SchemaType::FixedBytesArray(w) => {
                Some(w as usize)
            }
            SchemaType::BoolArray => Some(1),
            SchemaType::AddressArray => Some(ADDRESS_BYTES),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SchemaType::Uint(w) => write!(f, "uint{}", w as u16 * 8),
            SchemaType::Int(w) => write!(f, "int{}", w as u16 * 8),
            SchemaType::FixedBytes(w) => write!(f, "bytes{}", w),
            SchemaType::Bool => write!(f, "bool"),
            SchemaType::Address => write!(f, "address"),
            SchemaType::UintArray(w) => write!(f, "uint{}[]", w as u16 * 8),
            SchemaType::IntArray(w) => write!(f, "int{}[]", w as u16 * 8),
            SchemaType::FixedBytesArray(w) => write!(f, "bytes{}[]", w),
            SchemaType::BoolArray => write!(f, "bool[]"),
            SchemaType::AddressArray => write!(f, "address[]"),
            SchemaType::Bytes => write!(f, "bytes"),
            SchemaType::String => write!(f, "string"),
        }
    }
}
