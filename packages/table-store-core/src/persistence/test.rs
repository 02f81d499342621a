//! Tests for persistence module.

use std::fs;

use alloy_primitives::{Address, B256};
use ntest::timeout;
use tempfile::tempdir;

use crate::codec;
use crate::config::{HaltPolicy, ReplicaConfig, UnknownTablePolicy};
use crate::error::StoreError;
use crate::persistence::{CheckpointManager, CHECKPOINT_VERSION};
use crate::replica::{EventOutcome, ReplicaBuilder, StoreEvent};
use crate::table::{TableRegistration, TABLES_TABLE_ID};
use crate::types::{EncodedLengths, FieldValue, ResourceId, Schema, SchemaType};

fn inventory_id() -> ResourceId {
    ResourceId::table("game", "Inventory").unwrap()
}

fn inventory_registration() -> TableRegistration {
    TableRegistration::new(
        inventory_id(),
        Schema::key(vec![SchemaType::Address, SchemaType::Uint(4)]).unwrap(),
        Schema::value(vec![SchemaType::Uint(2), SchemaType::AddressArray, SchemaType::Bytes])
            .unwrap(),
        vec!["owner".to_string(), "slot".to_string()],
        vec![
            "amount".to_string(),
            "holders".to_string(),
            "meta".to_string(),
        ],
    )
    .unwrap()
}

fn bootstrap_event() -> StoreEvent {
    let tables = TableRegistration::tables_table().unwrap();
    StoreEvent::set_record(TABLES_TABLE_ID, tables.key_tuple(), tables.to_record().unwrap())
}

fn register_inventory() -> StoreEvent {
    let inventory = inventory_registration();
    StoreEvent::set_record(
        TABLES_TABLE_ID,
        inventory.key_tuple(),
        inventory.to_record().unwrap(),
    )
}

fn slot_key(slot: u64) -> Vec<B256> {
    codec::encode_key_tuple(
        &inventory_registration().key_schema,
        &[FieldValue::Address(Address::repeat_byte(1)), FieldValue::uint(slot)],
    )
    .unwrap()
}

fn set_slot(slot: u64) -> StoreEvent {
    let inventory = inventory_registration();
    let record = codec::encode_record(
        &inventory.value_schema,
        &inventory.field_layout,
        &[
            FieldValue::uint(slot * 10),
            FieldValue::AddressArray(vec![Address::repeat_byte(slot as u8)]),
            FieldValue::Bytes(vec![slot as u8; slot as usize]),
        ],
    )
    .unwrap();
    StoreEvent::set_record(inventory_id(), slot_key(slot), record)
}

fn populated_builder(config: ReplicaConfig) -> ReplicaBuilder {
    let mut events = vec![bootstrap_event(), register_inventory()];
    events.extend((0..5u64).map(set_slot));

    let mut builder = ReplicaBuilder::new(config);
    builder.apply_all(events).unwrap();
    builder
}

fn config_in(dir: &std::path::Path) -> ReplicaConfig {
    ReplicaConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[timeout(2000)]
#[test]
fn test_save_and_restore_checkpoint() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = CheckpointManager::new(&config);
    assert!(!manager.exists());
    assert!(manager.restore(config.clone()).unwrap().is_none());

    let builder = populated_builder(config.clone());
    let checkpoint = manager.save(&builder).unwrap();
    assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
    assert_eq!(checkpoint.next_index, 7);
    assert_eq!(checkpoint.table_count, 2);
    assert_eq!(checkpoint.record_count, 7);
    assert!(manager.exists());
    assert!(temp_dir.path().join("replica.json").exists());
    assert!(!temp_dir.path().join("replica.json.tmp").exists());

    let records = manager.load_records(&checkpoint).unwrap();
    assert_eq!(records[0].table_id, TABLES_TABLE_ID);
    assert_eq!(records[0].key_tuple, vec![*TABLES_TABLE_ID.as_word()]);

    let restored = manager.restore(config).unwrap().unwrap();
    assert_eq!(restored.next_index(), 7);
    let original_table = builder.registry().table(&inventory_id()).unwrap();
    let restored_table = restored.registry().table(&inventory_id()).unwrap();
    assert_eq!(restored_table.record_count(), 5);
    for (key, record) in original_table.records() {
        assert_eq!(restored_table.get(key), Some(record));
    }
    assert_eq!(restored_table.key_names, original_table.key_names);
}

#[timeout(2000)]
#[test]
fn test_restored_builder_continues_fold() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = CheckpointManager::new(&config);
    manager.save(&populated_builder(config.clone())).unwrap();

    let mut restored = manager.restore(config).unwrap().unwrap();
    let key = vec![B256::ZERO, B256::ZERO];
    restored
        .apply(StoreEvent::SpliceStaticData {
            table_id: inventory_id(),
            key_tuple: key.clone(),
            start: 0,
            data: vec![0x01, 0x00],
        })
        .unwrap();
    assert_eq!(restored.next_index(), 8);
    assert_eq!(
        restored
            .registry()
            .get_field_value(&inventory_id(), &key, 0)
            .unwrap(),
        Some(FieldValue::uint(256))
    );
}

#[timeout(2000)]
#[test]
fn test_corrupted_replica_detected() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = CheckpointManager::new(&config);
    manager.save(&populated_builder(config.clone())).unwrap();

    let data_path = temp_dir.path().join("replica.json");
    let mut contents = fs::read(&data_path).unwrap();
    let last = contents.len() - 3;
    contents[last] ^= 0x01;
    fs::write(&data_path, contents).unwrap();

    assert!(matches!(
        manager.restore(config),
        Err(StoreError::DataCorruption(_))
    ));
}

#[timeout(2000)]
#[test]
fn test_unsupported_version_rejected() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = CheckpointManager::new(&config);
    manager.save(&populated_builder(config.clone())).unwrap();

    let checkpoint_path = temp_dir.path().join("checkpoint.json");
    let contents = fs::read_to_string(&checkpoint_path).unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    json["version"] = serde_json::json!(99);
    fs::write(&checkpoint_path, json.to_string()).unwrap();

    assert!(matches!(
        manager.load_checkpoint(),
        Err(StoreError::SerializationError(_))
    ));
}

#[timeout(2000)]
#[test]
fn test_buffered_events_survive_checkpoint() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        unknown_table_policy: UnknownTablePolicy::Buffer,
        ..config_in(temp_dir.path())
    };
    let events = vec![set_slot(3), bootstrap_event(), set_slot(4), register_inventory()];

    let mut full = ReplicaBuilder::new(config.clone());
    full.apply_all(events.clone()).unwrap();

    let mut first = ReplicaBuilder::new(config.clone());
    first.apply_all(events[..3].to_vec()).unwrap();
    assert_eq!(first.pending_events(), 2);
    let manager = CheckpointManager::new(&config);
    manager.save(&first).unwrap();

    let mut resumed = manager.restore(config).unwrap().unwrap();
    assert_eq!(resumed.next_index(), 3);
    assert_eq!(resumed.pending_events(), 2);
    let indexes: Vec<u64> = resumed.buffered_events().iter().map(|(i, _)| *i).collect();
    assert_eq!(indexes, vec![0, 2]);

    let summary = resumed.apply_all(events[3..].to_vec()).unwrap();
    assert_eq!(summary.replayed, 2);
    assert_eq!(resumed.pending_events(), 0);
    for slot in [3, 4] {
        assert_eq!(
            resumed.registry().get_record(&inventory_id(), &slot_key(slot)).unwrap(),
            full.registry().get_record(&inventory_id(), &slot_key(slot)).unwrap()
        );
        assert!(resumed
            .registry()
            .get_record(&inventory_id(), &slot_key(slot))
            .unwrap()
            .is_some());
    }
}

#[timeout(2000)]
#[test]
fn test_halted_keys_survive_checkpoint() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        halt_policy: HaltPolicy::Key,
        ..config_in(temp_dir.path())
    };
    let mut builder = populated_builder(config.clone());
    let outcome = builder
        .apply(StoreEvent::SpliceStaticData {
            table_id: inventory_id(),
            key_tuple: slot_key(1),
            start: 100,
            data: vec![1],
        })
        .unwrap();
    assert!(matches!(outcome, EventOutcome::Rejected(_)));

    let manager = CheckpointManager::new(&config);
    manager.save(&builder).unwrap();
    let mut resumed = manager.restore(config).unwrap().unwrap();
    assert!(resumed.is_halted(&inventory_id(), &slot_key(1)));
    assert!(matches!(
        resumed.apply(set_slot(1)).unwrap(),
        EventOutcome::Rejected(_)
    ));
    assert_eq!(resumed.apply(set_slot(2)).unwrap(), EventOutcome::Applied);
}

#[timeout(2000)]
#[test]
fn test_trusted_encoded_lengths_restore_as_stored() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        verify_encoded_lengths: false,
        ..config_in(temp_dir.path())
    };
    let mut builder = populated_builder(config.clone());
    // slot 2 holds 20 bytes of holders and 2 bytes of meta; the supplied
    // lengths disagree with the bytes and are kept as given
    builder
        .apply(StoreEvent::SpliceDynamicData {
            table_id: inventory_id(),
            key_tuple: slot_key(2),
            dynamic_field_index: 1,
            start: 22,
            delete_count: 0,
            encoded_lengths: EncodedLengths::pack(&[20, 10]).unwrap(),
            data: vec![9],
        })
        .unwrap();
    let stored = builder
        .registry()
        .get_record(&inventory_id(), &slot_key(2))
        .unwrap()
        .cloned()
        .unwrap();
    assert_eq!(stored.encoded_lengths.total(), 30);
    assert_eq!(stored.dynamic_data.len(), 23);

    let manager = CheckpointManager::new(&config);
    manager.save(&builder).unwrap();
    let restored = manager.restore(config).unwrap().unwrap();
    assert_eq!(
        restored.registry().get_record(&inventory_id(), &slot_key(2)).unwrap(),
        Some(&stored)
    );
    assert!(matches!(
        restored.registry().validate_records(),
        Err(StoreError::LayoutMismatch(_))
    ));
}
