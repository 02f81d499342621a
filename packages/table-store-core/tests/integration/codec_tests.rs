//! Record codec through the public API.

use alloy_primitives::Address;
use ntest::timeout;

use table_store_core::codec::{decode_record, encode_record, read_field};
use table_store_core::types::{EncodedLengths, FieldLayout, FieldValue, Schema, SchemaType};
use table_store_core::StoreError;

fn profile_schema() -> (Schema, FieldLayout) {
    let schema =
        Schema::value(vec![SchemaType::Uint(8), SchemaType::Address, SchemaType::String]).unwrap();
    let layout = FieldLayout::from_schema(&schema).unwrap();
    (schema, layout)
}

#[timeout(1000)]
#[test]
fn test_uint64_address_string_scenario() {
    let (schema, layout) = profile_schema();
    let fields = vec![
        FieldValue::uint(42),
        FieldValue::Address(Address::repeat_byte(0xaa)),
        FieldValue::string("hi"),
    ];

    let record = encode_record(&schema, &layout, &fields).unwrap();
    assert_eq!(&record.static_data[..8], &42u64.to_be_bytes());
    assert_eq!(&record.static_data[8..], &[0xaa; 20]);
    assert_eq!(record.static_data.len(), layout.static_data_length());
    assert_eq!(record.dynamic_data, b"hi");

    let word = record.encoded_lengths.to_word();
    assert_eq!(&word[25..], &[0, 0, 0, 0, 0, 0, 2]);
    assert_eq!(&word[20..25], &[0, 0, 0, 0, 2]);
    assert!(word[..20].iter().all(|b| *b == 0));

    let decoded = decode_record(
        &schema,
        &layout,
        &record.static_data,
        &record.encoded_lengths,
        &record.dynamic_data,
    )
    .unwrap();
    assert_eq!(decoded, fields);
    assert_eq!(read_field(&layout, &record, 2).unwrap(), b"hi");
}

#[timeout(1000)]
#[test]
fn test_schema_and_layout_words() {
    let (schema, layout) = profile_schema();

    let word = schema.encode();
    assert_eq!(&word[..7], &[0x00, 0x1c, 2, 1, 7, 97, 197]);
    assert!(word[7..].iter().all(|b| *b == 0));
    assert_eq!(Schema::decode(&word).unwrap(), schema);

    let word = layout.encode();
    assert_eq!(&word[..6], &[0x00, 0x1c, 2, 1, 8, 20]);
    assert_eq!(FieldLayout::decode(&word).unwrap(), layout);
}

#[timeout(1000)]
#[test]
fn test_dynamic_field_limit() {
    let six_strings = vec![SchemaType::String; 6];
    assert!(matches!(
        Schema::value(six_strings),
        Err(StoreError::LimitExceeded { .. })
    ));
    assert!(matches!(
        EncodedLengths::pack(&[0; 6]),
        Err(StoreError::LimitExceeded { .. })
    ));
}

#[timeout(1000)]
#[test]
fn test_decode_rejects_wrong_total() {
    let (schema, layout) = profile_schema();
    let record = encode_record(
        &schema,
        &layout,
        &[
            FieldValue::uint(1),
            FieldValue::Address(Address::ZERO),
            FieldValue::string("abc"),
        ],
    )
    .unwrap();
    assert!(matches!(
        decode_record(
            &schema,
            &layout,
            &record.static_data,
            &record.encoded_lengths,
            b"ab",
        ),
        Err(StoreError::LayoutMismatch(_))
    ));
}
