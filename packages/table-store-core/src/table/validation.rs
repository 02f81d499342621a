//! Validation of splice bounds and supplied encoded lengths.

use crate::error::StoreError;
use crate::types::{EncodedLengths, MAX_DYNAMIC_FIELDS};

/// Validates that a static splice stays inside the static data.
///
/// # Arguments
/// * `static_len` - Current static data length
/// * `start` - Splice offset
/// * `data_len` - Number of bytes written
///
/// # Returns
/// `Result<(), StoreError>` with `LayoutMismatch` if the write would start or
/// end past the static data.
pub(crate) fn validate_static_splice(
    static_len: usize,
    start: u64,
    data_len: usize,
) -> Result<(), StoreError> {
    let end = start
        .checked_add(data_len as u64)
        .ok_or_else(|| StoreError::LayoutMismatch("static splice end overflows".to_string()))?;
    if start > static_len as u64 || end > static_len as u64 {
        return Err(StoreError::LayoutMismatch(format!(
            "static splice {}..{} is outside static data of {} bytes",
            start, end, static_len
        )));
    }
    Ok(())
}

/// Validates that a dynamic splice deletes only existing bytes.
///
/// # Arguments
/// * `dynamic_len` - Current dynamic data length
/// * `start` - Splice offset within the dynamic data
/// * `delete_count` - Number of bytes removed at `start`
///
/// # Returns
/// `Result<(), StoreError>` with `LayoutMismatch` if the deleted range runs
/// past the dynamic data.
pub(crate) fn validate_dynamic_splice(
    dynamic_len: usize,
    start: u64,
    delete_count: u64,
) -> Result<(), StoreError> {
    let end = start
        .checked_add(delete_count)
        .ok_or_else(|| StoreError::LayoutMismatch("dynamic splice end overflows".to_string()))?;
    if start > dynamic_len as u64 || end > dynamic_len as u64 {
        return Err(StoreError::LayoutMismatch(format!(
            "dynamic splice deletes {}..{} from dynamic data of {} bytes",
            start, end, dynamic_len
        )));
    }
    Ok(())
}

/// Cross-checks the encoded lengths carried by a dynamic splice against the
/// record being spliced.
///
/// The supplied value must declare exactly the new dynamic length, keep every
/// slot except `field_index`, and move that slot by `data_len - delete_count`.
/// The deleted range must also lie inside that field's current bytes.
///
/// # Arguments
/// * `current` - Encoded lengths stored before the splice
/// * `supplied` - Encoded lengths carried by the event
/// * `field_index` - Dynamic field being spliced
/// * `start` - Splice offset within the dynamic data
/// * `delete_count` - Number of bytes removed
/// * `data_len` - Number of bytes inserted
/// * `num_dynamic_fields` - Dynamic field count of the table
pub(crate) fn verify_encoded_lengths(
    current: &EncodedLengths,
    supplied: &EncodedLengths,
    field_index: usize,
    start: u64,
    delete_count: u64,
    data_len: usize,
    num_dynamic_fields: usize,
) -> Result<(), StoreError> {
    supplied.validate(num_dynamic_fields)?;

    let field_start = current.field_offset(field_index);
    let field_end = field_start + current.field_length(field_index);
    if start < field_start || start + delete_count > field_end {
        return Err(StoreError::LayoutMismatch(format!(
            "splice {}..{} is outside dynamic field {} at {}..{}",
            start,
            start + delete_count,
            field_index,
            field_start,
            field_end
        )));
    }

    let expected_total = current.total().saturating_sub(delete_count) + data_len as u64;
    if supplied.total() != expected_total {
        return Err(StoreError::LayoutMismatch(format!(
            "encoded lengths declare {} dynamic bytes, splice leaves {}",
            supplied.total(),
            expected_total
        )));
    }

    for slot in 0..MAX_DYNAMIC_FIELDS {
        let expected = if slot == field_index {
            current.field_length(slot).saturating_sub(delete_count) + data_len as u64
        } else {
            current.field_length(slot)
        };
        if supplied.field_length(slot) != expected {
            return Err(StoreError::LayoutMismatch(format!(
                "encoded length of dynamic field {} is {}, expected {}",
                slot,
                supplied.field_length(slot),
                expected
            )));
        }
    }
    Ok(())
}
