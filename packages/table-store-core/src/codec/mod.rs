//! Record codec.
//!
//! Maps typed field lists to the stored `(static data, encoded lengths,
//! dynamic data)` triple and back:
//! - static fields: big-endian at fixed width, no padding, schema order
//! - dynamic fields: raw bytes (arrays packed element by element), no
//!   separators, lengths recorded in `EncodedLengths`

mod names;
mod packed;

pub use names::{decode_names, encode_names};

use alloy_primitives::B256;

use crate::error::StoreError;
use crate::types::{EncodedLengths, FieldLayout, FieldValue, Record, Schema, SchemaType};

use packed::{element_type, read_key_word, read_scalar, write_key_word, write_scalar, Scalar};

/// Encodes a full field list into its stored triple.
///
/// # Arguments
/// * `schema` - Value schema of the table
/// * `layout` - Field layout derived from `schema`
/// * `fields` - One value per schema field, in schema order
///
/// # Returns
/// `Err(StoreError::SchemaViolation)` on count or type mismatch,
/// `Err(StoreError::LimitExceeded)` if a dynamic field is too long.
pub fn encode_record(
    schema: &Schema,
    layout: &FieldLayout,
    fields: &[FieldValue],
) -> Result<Record, StoreError> {
    layout.ensure_matches(schema)?;
    if fields.len() != schema.num_fields() {
        return Err(StoreError::SchemaViolation(format!(
            "expected {} fields, got {}",
            schema.num_fields(),
            fields.len()
        )));
    }

    let mut static_data = Vec::with_capacity(layout.static_data_length());
    let mut dynamic_data = Vec::new();
    let mut dynamic_lengths = Vec::with_capacity(layout.num_dynamic_fields());

    for (index, (ty, value)) in schema.types().iter().zip(fields).enumerate() {
        if ty.is_dynamic() {
            let before = dynamic_data.len();
            write_dynamic(*ty, value, &mut dynamic_data).map_err(|e| at_field(index, e))?;
            dynamic_lengths.push(dynamic_data.len() - before);
        } else {
            let scalar = Scalar::from_value(value).ok_or_else(|| {
                StoreError::SchemaViolation(format!(
                    "field {}: expected {}, got {} value",
                    index,
                    ty,
                    value.kind()
                ))
            })?;
            write_scalar(*ty, scalar, &mut static_data).map_err(|e| at_field(index, e))?;
        }
    }

    let encoded_lengths = EncodedLengths::pack(&dynamic_lengths)?;
    Ok(Record::new(static_data, encoded_lengths, dynamic_data))
}

/// Decodes a stored triple into its field list.
///
/// # Returns
/// `Err(StoreError::LayoutMismatch)` if the byte lengths disagree with the
/// layout or the encoded lengths, or a field's bytes are malformed.
pub fn decode_record(
    schema: &Schema,
    layout: &FieldLayout,
    static_data: &[u8],
    encoded_lengths: &EncodedLengths,
    dynamic_data: &[u8],
) -> Result<Vec<FieldValue>, StoreError> {
    layout.ensure_matches(schema)?;
    if static_data.len() != layout.static_data_length() {
        return Err(StoreError::LayoutMismatch(format!(
            "static data is {} bytes, layout declares {}",
            static_data.len(),
            layout.static_data_length()
        )));
    }
    encoded_lengths.validate(layout.num_dynamic_fields())?;
    if dynamic_data.len() as u64 != encoded_lengths.total() {
        return Err(StoreError::LayoutMismatch(format!(
            "dynamic data is {} bytes, encoded lengths declare {}",
            dynamic_data.len(),
            encoded_lengths.total()
        )));
    }

    let mut fields = Vec::with_capacity(schema.num_fields());
    let mut offset = 0;
    for (index, len) in layout.static_field_lengths().iter().enumerate() {
        let end = offset + *len as usize;
        let ty = schema.types()[index];
        fields.push(read_scalar(ty, &static_data[offset..end]).map_err(|e| at_field(index, e))?);
        offset = end;
    }

    let mut offset = 0;
    for dynamic_index in 0..layout.num_dynamic_fields() {
        let index = layout.num_static_fields() + dynamic_index;
        let end = offset + encoded_lengths.field_length(dynamic_index) as usize;
        let ty = schema.types()[index];
        fields.push(read_dynamic(ty, &dynamic_data[offset..end]).map_err(|e| at_field(index, e))?);
        offset = end;
    }
    Ok(fields)
}

/// Decodes a `Record` value.
pub fn decode_stored(
    schema: &Schema,
    layout: &FieldLayout,
    record: &Record,
) -> Result<Vec<FieldValue>, StoreError> {
    decode_record(
        schema,
        layout,
        &record.static_data,
        &record.encoded_lengths,
        &record.dynamic_data,
    )
}

/// Encodes a single field in isolation: fixed width for static fields, raw
/// packed bytes for dynamic fields.
pub fn encode_field(
    schema: &Schema,
    layout: &FieldLayout,
    field_index: usize,
    value: &FieldValue,
) -> Result<Vec<u8>, StoreError> {
    layout.ensure_matches(schema)?;
    let ty = field_type(schema, field_index)?;
    let mut out = Vec::new();
    let written = if ty.is_dynamic() {
        write_dynamic(ty, value, &mut out)
    } else {
        let scalar = Scalar::from_value(value).ok_or_else(|| {
            StoreError::SchemaViolation(format!("expected {}, got {} value", ty, value.kind()))
        })?;
        write_scalar(ty, scalar, &mut out)
    };
    written.map_err(|e| at_field(field_index, e))?;
    Ok(out)
}

/// Decodes the encoded bytes of a single field.
pub fn decode_field(
    schema: &Schema,
    layout: &FieldLayout,
    field_index: usize,
    bytes: &[u8],
) -> Result<FieldValue, StoreError> {
    layout.ensure_matches(schema)?;
    let ty = field_type(schema, field_index)?;
    let value = if ty.is_dynamic() {
        read_dynamic(ty, bytes)
    } else {
        read_scalar(ty, bytes)
    };
    value.map_err(|e| at_field(field_index, e))
}

/// Returns the encoded bytes of one field of a stored record.
pub fn read_field<'a>(
    layout: &FieldLayout,
    record: &'a Record,
    field_index: usize,
) -> Result<&'a [u8], StoreError> {
    let range = field_range(layout, record, field_index)?;
    let data = if field_index < layout.num_static_fields() {
        &record.static_data
    } else {
        &record.dynamic_data
    };
    data.get(range.clone()).ok_or_else(|| {
        StoreError::LayoutMismatch(format!(
            "field {} spans bytes {}..{} but the data holds {}",
            field_index,
            range.start,
            range.end,
            data.len()
        ))
    })
}

/// Returns the byte length of one field without copying it.
pub fn field_length(
    layout: &FieldLayout,
    record: &Record,
    field_index: usize,
) -> Result<usize, StoreError> {
    field_range(layout, record, field_index).map(|r| r.len())
}

fn field_range(
    layout: &FieldLayout,
    record: &Record,
    field_index: usize,
) -> Result<std::ops::Range<usize>, StoreError> {
    if field_index >= layout.num_fields() {
        return Err(StoreError::SchemaViolation(format!(
            "field index {} out of range for {} fields",
            field_index,
            layout.num_fields()
        )));
    }
    match layout.static_field_offset(field_index) {
        Some(start) => Ok(start..start + layout.static_field_lengths()[field_index] as usize),
        None => Ok(record.dynamic_field_range(field_index - layout.num_static_fields())),
    }
}

/// Encodes a key tuple, one 32-byte word per key field.
pub fn encode_key_tuple(key_schema: &Schema, values: &[FieldValue]) -> Result<Vec<B256>, StoreError> {
    if values.len() != key_schema.num_fields() {
        return Err(StoreError::SchemaViolation(format!(
            "expected {} key fields, got {}",
            key_schema.num_fields(),
            values.len()
        )));
    }
    key_schema
        .types()
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (ty, value))| {
            let scalar = Scalar::from_value(value).ok_or_else(|| {
                StoreError::SchemaViolation(format!(
                    "key field {}: {} value cannot be a key",
                    index,
                    value.kind()
                ))
            })?;
            write_key_word(*ty, scalar)
                .map(B256::new)
                .map_err(|e| at_field(index, e))
        })
        .collect()
}

/// Decodes a key tuple against its key schema.
pub fn decode_key_tuple(key_schema: &Schema, key: &[B256]) -> Result<Vec<FieldValue>, StoreError> {
    if key.len() != key_schema.num_fields() {
        return Err(StoreError::SchemaViolation(format!(
            "expected {} key words, got {}",
            key_schema.num_fields(),
            key.len()
        )));
    }
    key_schema
        .types()
        .iter()
        .zip(key)
        .enumerate()
        .map(|(index, (ty, word))| read_key_word(*ty, &word.0).map_err(|e| at_field(index, e)))
        .collect()
}

fn field_type(schema: &Schema, field_index: usize) -> Result<SchemaType, StoreError> {
    schema.field_type(field_index).ok_or_else(|| {
        StoreError::SchemaViolation(format!(
            "field index {} out of range for {} fields",
            field_index,
            schema.num_fields()
        ))
    })
}

fn write_dynamic(ty: SchemaType, value: &FieldValue, out: &mut Vec<u8>) -> Result<(), StoreError> {
    match (ty, value) {
        (SchemaType::Bytes, FieldValue::Bytes(b)) => out.extend_from_slice(b),
        (SchemaType::String, FieldValue::String(s)) => out.extend_from_slice(s.as_bytes()),
        (SchemaType::UintArray(_), FieldValue::UintArray(items)) => {
            write_elements(ty, items.iter().map(Scalar::Uint), out)?
        }
        (SchemaType::IntArray(_), FieldValue::IntArray(items)) => {
            write_elements(ty, items.iter().map(Scalar::Int), out)?
        }
        (SchemaType::FixedBytesArray(_), FieldValue::FixedBytesArray(items)) => {
            write_elements(ty, items.iter().map(|b| Scalar::FixedBytes(b)), out)?
        }
        (SchemaType::BoolArray, FieldValue::BoolArray(items)) => {
            write_elements(ty, items.iter().map(|b| Scalar::Bool(*b)), out)?
        }
        (SchemaType::AddressArray, FieldValue::AddressArray(items)) => {
            write_elements(ty, items.iter().map(Scalar::Address), out)?
        }
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

fn write_elements<'a>(
    array_ty: SchemaType,
    items: impl Iterator<Item = Scalar<'a>>,
    out: &mut Vec<u8>,
) -> Result<(), StoreError> {
    let elem_ty = element_type(array_ty).ok_or_else(|| {
        StoreError::SchemaViolation(format!("{} is not an array type", array_ty))
    })?;
    for item in items {
        write_scalar(elem_ty, item, out)?;
    }
    Ok(())
}

fn read_dynamic(ty: SchemaType, bytes: &[u8]) -> Result<FieldValue, StoreError> {
    match ty {
        SchemaType::Bytes => return Ok(FieldValue::Bytes(bytes.to_vec())),
        SchemaType::String => {
            return String::from_utf8(bytes.to_vec())
                .map(FieldValue::String)
                .map_err(|e| StoreError::LayoutMismatch(format!("string is not UTF-8: {}", e)))
        }
        _ => {}
    }

    let elem_ty = element_type(ty)
        .ok_or_else(|| StoreError::SchemaViolation(format!("{} is not a dynamic type", ty)))?;
    let width = elem_ty.static_byte_length();
    if bytes.len() % width != 0 {
        return Err(StoreError::LayoutMismatch(format!(
            "{} data of {} bytes is not a multiple of the {}-byte element width",
            ty,
            bytes.len(),
            width
        )));
    }
    let elements = bytes
        .chunks_exact(width)
        .map(|chunk| read_scalar(elem_ty, chunk))
        .collect::<Result<Vec<_>, _>>()?;

    let mismatch = |kind: &str| StoreError::SchemaViolation(format!("unexpected {} element", kind));
    let value = match ty {
        SchemaType::UintArray(_) => FieldValue::UintArray(
            elements
                .into_iter()
                .map(|v| match v {
                    FieldValue::Uint(u) => Ok(u),
                    other => Err(mismatch(other.kind())),
                })
                .collect::<Result<_, _>>()?,
        ),
        SchemaType::IntArray(_) => FieldValue::IntArray(
            elements
                .into_iter()
                .map(|v| match v {
                    FieldValue::Int(i) => Ok(i),
                    other => Err(mismatch(other.kind())),
                })
                .collect::<Result<_, _>>()?,
        ),
        SchemaType::FixedBytesArray(_) => FieldValue::FixedBytesArray(
            elements
                .into_iter()
                .map(|v| match v {
                    FieldValue::FixedBytes(b) => Ok(b),
                    other => Err(mismatch(other.kind())),
                })
                .collect::<Result<_, _>>()?,
        ),
        SchemaType::BoolArray => FieldValue::BoolArray(
            elements
                .into_iter()
                .map(|v| match v {
                    FieldValue::Bool(b) => Ok(b),
                    other => Err(mismatch(other.kind())),
                })
                .collect::<Result<_, _>>()?,
        ),
        _ => FieldValue::AddressArray(
            elements
                .into_iter()
                .map(|v| match v {
                    FieldValue::Address(a) => Ok(a),
                    other => Err(mismatch(other.kind())),
                })
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(value)
}

/// Prefixes an error message with the failing field index.
fn at_field(index: usize, err: StoreError) -> StoreError {
    match err {
        StoreError::SchemaViolation(msg) => {
            StoreError::SchemaViolation(format!("field {}: {}", index, msg))
        }
        StoreError::LayoutMismatch(msg) => {
            StoreError::LayoutMismatch(format!("field {}: {}", index, msg))
        }
        other => other,
    }
}
