//! Event stream replay into a replica.

use alloy_primitives::{Address, U256};
use ntest::timeout;

use table_store_core::replica::{EventOutcome, ReplicaBuilder, StoreEvent};
use table_store_core::table::TABLES_TABLE_ID;
use table_store_core::types::{EncodedLengths, FieldValue};
use table_store_core::{HaltPolicy, ReplicaConfig, StoreError};

use super::helpers::*;

#[timeout(2000)]
#[test]
fn test_replay_json_lines_stream() {
    let alice = Address::repeat_byte(0xa1);
    let mut events = world_prelude();
    events.extend([
        set_position(1, -5, 12, "north"),
        set_balance(alice, 1_000, &[1, 2]),
        StoreEvent::SpliceStaticData {
            table_id: position_id(),
            key_tuple: entity(1),
            start: 4,
            data: vec![0, 0, 0, 13],
        },
        StoreEvent::SpliceDynamicData {
            table_id: balance_id(),
            key_tuple: owner_key(alice),
            dynamic_field_index: 0,
            start: 2,
            delete_count: 0,
            encoded_lengths: EncodedLengths::pack(&[3]).unwrap(),
            data: vec![3],
        },
        set_position(2, 0, 0, "south"),
        StoreEvent::DeleteRecord {
            table_id: position_id(),
            key_tuple: entity(2),
        },
    ]);

    let log: String = events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap() + "\n")
        .collect();
    let parsed: Vec<StoreEvent> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(parsed, events);

    let mut builder = ReplicaBuilder::new(ReplicaConfig::default());
    let summary = builder.apply_all(parsed).unwrap();
    assert_eq!(summary.applied, 9);
    assert!(summary.failures.is_empty());
    assert_eq!(builder.next_index(), 9);

    let registry = builder.registry();
    let position = registry.table(&position_id()).unwrap();
    assert_eq!(
        position.get_values(&entity(1)).unwrap(),
        Some(vec![
            FieldValue::int(-5),
            FieldValue::int(13),
            FieldValue::string("north")
        ])
    );
    assert_eq!(position.get(&entity(2)), None);
    assert_eq!(
        registry
            .get_field_value(&balance_id(), &owner_key(alice), 1)
            .unwrap(),
        Some(FieldValue::UintArray(vec![
            U256::from(1u64),
            U256::from(2u64),
            U256::from(3u64)
        ]))
    );
    assert_eq!(registry.record_count(), 3 + 1 + 1);
}

#[timeout(1000)]
#[test]
fn test_first_event_must_bootstrap_registry() {
    let mut builder = ReplicaBuilder::new(ReplicaConfig::default());
    let splice = StoreEvent::SpliceStaticData {
        table_id: TABLES_TABLE_ID,
        key_tuple: vec![*TABLES_TABLE_ID.as_word()],
        start: 0,
        data: vec![0],
    };
    assert!(matches!(
        builder.apply(splice),
        Err(StoreError::UnknownTable { .. })
    ));
}

#[timeout(1000)]
#[test]
fn test_rejected_keys_do_not_block_others() {
    let mut builder = ReplicaBuilder::new(ReplicaConfig {
        halt_policy: HaltPolicy::Key,
        ..Default::default()
    });
    builder.apply_all(world_prelude()).unwrap();

    let bad = StoreEvent::SpliceDynamicData {
        table_id: position_id(),
        key_tuple: entity(7),
        dynamic_field_index: 1,
        start: 0,
        delete_count: 0,
        encoded_lengths: EncodedLengths::ZERO,
        data: vec![],
    };
    let outcome = builder.apply(bad).unwrap();
    assert!(matches!(
        outcome,
        EventOutcome::Rejected(StoreError::StreamIntegrity { index: 3, .. })
    ));
    assert!(matches!(
        builder.apply(set_position(7, 1, 1, "x")).unwrap(),
        EventOutcome::Rejected(_)
    ));
    assert_eq!(
        builder.apply(set_position(8, 1, 1, "y")).unwrap(),
        EventOutcome::Applied
    );
    assert_eq!(builder.next_index(), 6);
}
