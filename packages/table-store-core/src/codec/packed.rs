//! Fixed-width big-endian encoding of static values.
//!
//! Used for static fields, for array elements (packed edge to edge) and, with
//! padding to 32 bytes, for key tuple words.

use alloy_primitives::{Address, I256, U256};

use crate::error::StoreError;
use crate::types::{FieldValue, SchemaType, ADDRESS_BYTES};

/// Scalar type of the elements of an array type.
pub(crate) fn element_type(ty: SchemaType) -> Option<SchemaType> {
    match ty {
        SchemaType::UintArray(w) => Some(SchemaType::Uint(w)),
        SchemaType::IntArray(w) => Some(SchemaType::Int(w)),
        SchemaType::FixedBytesArray(w) => Some(SchemaType::FixedBytes(w)),
        SchemaType::BoolArray => Some(SchemaType::Bool),
        SchemaType::AddressArray => Some(SchemaType::Address),
        _ => None,
    }
}

/// Scalar value view used when packing array elements one by one.
pub(crate) enum Scalar<'a> {
    Uint(&'a U256),
    Int(&'a I256),
    FixedBytes(&'a [u8]),
    Bool(bool),
    Address(&'a Address),
}

impl Scalar<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Scalar::Uint(_) => "uint",
            Scalar::Int(_) => "int",
            Scalar::FixedBytes(_) => "fixed bytes",
            Scalar::Bool(_) => "bool",
            Scalar::Address(_) => "address",
        }
    }
}

impl<'a> Scalar<'a> {
    pub(crate) fn from_value(value: &'a FieldValue) -> Option<Self> {
        match value {
            FieldValue::Uint(v) => Some(Scalar::Uint(v)),
            FieldValue::Int(v) => Some(Scalar::Int(v)),
            FieldValue::FixedBytes(b) => Some(Scalar::FixedBytes(b)),
            FieldValue::Bool(b) => Some(Scalar::Bool(*b)),
            FieldValue::Address(a) => Some(Scalar::Address(a)),
            _ => None,
        }
    }
}

/// Appends `value` at the fixed width of `ty`.
pub(crate) fn write_scalar(ty: SchemaType, value: Scalar<'_>, out: &mut Vec<u8>) -> Result<(), StoreError> {
    match (ty, value) {
        (SchemaType::Uint(w), Scalar::Uint(v)) => {
            if v.bit_len() > w as usize * 8 {
                return Err(StoreError::SchemaViolation(format!(
                    "value {} does not fit in {}",
                    v, ty
                )));
            }
            let bytes = v.to_be_bytes::<32>();
            out.extend_from_slice(&bytes[32 - w as usize..]);
        }
        (SchemaType::Int(w), Scalar::Int(v)) => {
            let raw = v.into_raw().to_be_bytes::<32>();
            let truncated = &raw[32 - w as usize..];
            if sign_extend(truncated) != raw {
                return Err(StoreError::SchemaViolation(format!(
                    "value {} does not fit in {}",
                    v, ty
                )));
            }
            out.extend_from_slice(truncated);
        }
        (SchemaType::FixedBytes(w), Scalar::FixedBytes(b)) => {
            if b.len() != w as usize {
                return Err(StoreError::SchemaViolation(format!(
                    "{} value has {} bytes",
                    ty,
                    b.len()
                )));
            }
            out.extend_from_slice(b);
        }
        (SchemaType::Bool, Scalar::Bool(b)) => out.push(b as u8),
        (SchemaType::Address, Scalar::Address(a)) => out.extend_from_slice(a.as_slice()),
        (ty, value) => {
            return Err(StoreError::SchemaViolation(format!(
                "expected {}, got {} value",
                ty,
                value.kind()
            )))
        }
    }
    Ok(())
}

/// Reads one value of static type `ty` from exactly `bytes`.
pub(crate) fn read_scalar(ty: SchemaType, bytes: &[u8]) -> Result<FieldValue, StoreError> {
    if bytes.len() != ty.static_byte_length() {
        return Err(StoreError::LayoutMismatch(format!(
            "{} needs {} bytes, got {}",
            ty,
            ty.static_byte_length(),
            bytes.len()
        )));
    }
    let value = match ty {
        SchemaType::Uint(_) => FieldValue::Uint(U256::from_be_slice(bytes)),
        SchemaType::Int(_) => FieldValue::Int(I256::from_raw(U256::from_be_bytes(sign_extend(bytes)))),
        SchemaType::FixedBytes(_) => FieldValue::FixedBytes(bytes.to_vec()),
        SchemaType::Bool => match bytes[0] {
            0 => FieldValue::Bool(false),
            1 => FieldValue::Bool(true),
            other => {
                return Err(StoreError::LayoutMismatch(format!(
                    "invalid bool byte 0x{:02x}",
                    other
                )))
            }
        },
        SchemaType::Address => FieldValue::Address(Address::from_slice(&bytes[..ADDRESS_BYTES])),
        other => {
            return Err(StoreError::SchemaViolation(format!(
                "{} is not a static type",
                other
            )))
        }
    };
    Ok(value)
}

/// Encodes a static value as a 32-byte key word.
///
/// Integers, bools and addresses are left-padded (signed integers
/// sign-extended); fixed bytes are right-padded.
pub(crate) fn write_key_word(ty: SchemaType, value: Scalar<'_>) -> Result<[u8; 32], StoreError> {
    let mut packed = Vec::with_capacity(32);
    write_scalar(ty, value, &mut packed)?;
    let mut word = [0u8; 32];
    match ty {
        SchemaType::FixedBytes(_) => word[..packed.len()].copy_from_slice(&packed),
        SchemaType::Int(_) => word = sign_extend(&packed),
        _ => word[32 - packed.len()..].copy_from_slice(&packed),
    }
    Ok(word)
}

/// Decodes a key word, rejecting words whose padding is not canonical.
pub(crate) fn read_key_word(ty: SchemaType, word: &[u8; 32]) -> Result<FieldValue, StoreError> {
    let width = ty.static_byte_length();
    if width == 0 {
        return Err(StoreError::SchemaViolation(format!(
            "{} cannot be used in a key",
            ty
        )));
    }
    let (packed, canonical) = match ty {
        SchemaType::FixedBytes(_) => {
            let packed = &word[..width];
            (packed, word[width..].iter().all(|b| *b == 0))
        }
        SchemaType::Int(_) => {
            let packed = &word[32 - width..];
            (packed, sign_extend(packed) == *word)
        }
        _ => {
            let packed = &word[32 - width..];
            (packed, word[..32 - width].iter().all(|b| *b == 0))
        }
    };
    if !canonical {
        return Err(StoreError::LayoutMismatch(format!(
            "key word 0x{} is not a canonical {}",
            hex::encode(word),
            ty
        )));
    }
    read_scalar(ty, packed)
}

/// Two's-complement sign extension of a big-endian value to 32 bytes.
fn sign_extend(bytes: &[u8]) -> [u8; 32] {
    let fill = match bytes.first() {
        Some(b) if b & 0x80 != 0 => 0xff,
        _ => 0x00,
    };
    let mut word = [fill; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    fn pack(ty: SchemaType, value: &FieldValue) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        write_scalar(ty, Scalar::from_value(value).unwrap(), &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_uint_big_endian_and_range() {
        assert_eq!(
            pack(SchemaType::Uint(8), &FieldValue::uint(42)).unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 42]
        );
        assert_eq!(pack(SchemaType::Uint(1), &FieldValue::uint(255)).unwrap(), vec![255]);
        assert!(matches!(
            pack(SchemaType::Uint(1), &FieldValue::uint(256)),
            Err(StoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_int_twos_complement() {
        assert_eq!(pack(SchemaType::Int(2), &FieldValue::int(-2)).unwrap(), vec![0xff, 0xfe]);
        assert_eq!(pack(SchemaType::Int(1), &FieldValue::int(-128)).unwrap(), vec![0x80]);
        assert!(pack(SchemaType::Int(1), &FieldValue::int(128)).is_err());
        assert!(pack(SchemaType::Int(1), &FieldValue::int(-129)).is_err());
        assert_eq!(
            read_scalar(SchemaType::Int(2), &[0xff, 0xfe]).unwrap(),
            FieldValue::int(-2)
        );
    }

    #[test]
    fn test_key_words() {
        let word = write_key_word(SchemaType::Int(4), Scalar::Int(&I256::MINUS_ONE)).unwrap();
        assert_eq!(word, [0xff; 32]);

        let word = write_key_word(SchemaType::FixedBytes(2), Scalar::FixedBytes(&[1, 2])).unwrap();
        assert_eq!(&word[..2], &[1, 2]);
        assert!(word[2..].iter().all(|b| *b == 0));
        assert_eq!(
            read_key_word(SchemaType::FixedBytes(2), &word).unwrap(),
            FieldValue::FixedBytes(vec![1, 2])
        );

        let mut dirty = [0u8; 32];
        dirty[0] = 1;
        dirty[31] = 7;
        assert!(read_key_word(SchemaType::Uint(1), &dirty).is_err());
    }

    #[test]
    fn test_invalid_bool_byte() {
        assert!(matches!(
            read_scalar(SchemaType::Bool, &[2]),
            Err(StoreError::LayoutMismatch(_))
        ));
    }
}
