//! Snapshot reads during a fold.

use std::sync::Arc;
use std::thread;

use ntest::timeout;

use table_store_core::replica::{ReplicaBuilder, ReplicaSnapshots};
use table_store_core::types::FieldValue;
use table_store_core::ReplicaConfig;

use super::helpers::*;

#[timeout(5000)]
#[test]
fn test_readers_see_whole_events_only() {
    let snapshots = Arc::new(ReplicaSnapshots::new());
    let mut builder = ReplicaBuilder::new(ReplicaConfig::default());
    builder.apply_all(world_prelude()).unwrap();
    builder.apply(set_position(1, 0, 0, "start")).unwrap();
    builder.publish(&snapshots);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let snapshots = Arc::clone(&snapshots);
            thread::spawn(move || {
                let mut last_index = 0;
                for _ in 0..200 {
                    let snapshot = snapshots.load();
                    assert!(snapshot.next_index >= last_index);
                    last_index = snapshot.next_index;

                    let values = snapshot
                        .registry
                        .table(&position_id())
                        .unwrap()
                        .get_values(&entity(1))
                        .unwrap()
                        .unwrap();
                    // x and y are always written together
                    assert_eq!(values[0], values[1]);
                }
            })
        })
        .collect();

    for step in 1..100i64 {
        builder
            .apply(set_position(1, step, step, "moving"))
            .unwrap();
        builder.publish(&snapshots);
    }

    for reader in readers {
        reader.join().unwrap();
    }
    let last = snapshots.load();
    assert_eq!(last.next_index, builder.next_index());
    assert_eq!(
        last.registry
            .get_field_value(&position_id(), &entity(1), 0)
            .unwrap(),
        Some(FieldValue::int(99))
    );
}
