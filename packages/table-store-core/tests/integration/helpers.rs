//! Shared event builders for the integration tests.

use alloy_primitives::{Address, B256, U256};

use table_store_core::codec;
use table_store_core::replica::StoreEvent;
use table_store_core::table::{TableRegistration, TABLES_TABLE_ID};
use table_store_core::types::{FieldValue, ResourceId, Schema, SchemaType};

pub fn position_id() -> ResourceId {
    ResourceId::table("world", "Position").unwrap()
}

/// `Position(bytes32 entity) -> (int32 x, int32 y, string zone)`
pub fn position_registration() -> TableRegistration {
    TableRegistration::new(
        position_id(),
        Schema::key(vec![SchemaType::FixedBytes(32)]).unwrap(),
        Schema::value(vec![SchemaType::Int(4), SchemaType::Int(4), SchemaType::String]).unwrap(),
        vec!["entity".to_string()],
        vec!["x".to_string(), "y".to_string(), "zone".to_string()],
    )
    .unwrap()
}

pub fn balance_id() -> ResourceId {
    ResourceId::table("world", "Balance").unwrap()
}

/// `Balance(address owner) -> (uint256 amount, uint8[] history)`
pub fn balance_registration() -> TableRegistration {
    TableRegistration::new(
        balance_id(),
        Schema::key(vec![SchemaType::Address]).unwrap(),
        Schema::value(vec![SchemaType::Uint(32), SchemaType::UintArray(1)]).unwrap(),
        vec!["owner".to_string()],
        vec!["amount".to_string(), "history".to_string()],
    )
    .unwrap()
}

pub fn bootstrap_event() -> StoreEvent {
    let tables = TableRegistration::tables_table().unwrap();
    StoreEvent::set_record(TABLES_TABLE_ID, tables.key_tuple(), tables.to_record().unwrap())
}

pub fn register_event(registration: &TableRegistration) -> StoreEvent {
    StoreEvent::set_record(
        TABLES_TABLE_ID,
        registration.key_tuple(),
        registration.to_record().unwrap(),
    )
}

pub fn entity(n: u8) -> Vec<B256> {
    vec![B256::with_last_byte(n)]
}

pub fn set_position(n: u8, x: i64, y: i64, zone: &str) -> StoreEvent {
    let registration = position_registration();
    let record = codec::encode_record(
        &registration.value_schema,
        &registration.field_layout,
        &[FieldValue::int(x), FieldValue::int(y), FieldValue::string(zone)],
    )
    .unwrap();
    StoreEvent::set_record(position_id(), entity(n), record)
}

pub fn owner_key(owner: Address) -> Vec<B256> {
    codec::encode_key_tuple(
        &balance_registration().key_schema,
        &[FieldValue::Address(owner)],
    )
    .unwrap()
}

pub fn set_balance(owner: Address, amount: u64, history: &[u8]) -> StoreEvent {
    let registration = balance_registration();
    let record = codec::encode_record(
        &registration.value_schema,
        &registration.field_layout,
        &[
            FieldValue::Uint(U256::from(amount)),
            FieldValue::UintArray(history.iter().map(|h| U256::from(*h)).collect()),
        ],
    )
    .unwrap();
    StoreEvent::set_record(balance_id(), owner_key(owner), record)
}

/// Registry bootstrap plus both world tables.
pub fn world_prelude() -> Vec<StoreEvent> {
    vec![
        bootstrap_event(),
        register_event(&position_registration()),
        register_event(&balance_registration()),
    ]
}
