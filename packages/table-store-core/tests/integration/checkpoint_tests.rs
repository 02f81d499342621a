//! Checkpoint and resume.

use alloy_primitives::Address;
use ntest::timeout;
use tempfile::tempdir;

use table_store_core::persistence::CheckpointManager;
use table_store_core::replica::ReplicaBuilder;
use table_store_core::ReplicaConfig;

use super::helpers::*;

#[timeout(2000)]
#[test]
fn test_checkpoint_resume_matches_full_replay() {
    let temp_dir = tempdir().unwrap();
    let config = ReplicaConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };

    let mut events = world_prelude();
    for n in 0..10u8 {
        events.push(set_position(n, n as i64, -(n as i64), "grid"));
        events.push(set_balance(Address::repeat_byte(n), n as u64 * 100, &[n]));
    }
    let (head, tail) = events.split_at(12);

    let mut full = ReplicaBuilder::new(config.clone());
    full.apply_all(events.clone()).unwrap();

    let mut first = ReplicaBuilder::new(config.clone());
    first.apply_all(head.to_vec()).unwrap();
    let manager = CheckpointManager::new(&config);
    manager.save(&first).unwrap();
    drop(first);

    let mut resumed = manager.restore(config).unwrap().unwrap();
    assert_eq!(resumed.next_index(), 12);
    let remaining: Vec<_> = tail.to_vec();
    resumed.apply_all(remaining).unwrap();
    assert_eq!(resumed.next_index(), full.next_index());

    for table in full.registry().tables() {
        let other = resumed.registry().table(&table.id).unwrap();
        assert_eq!(other.record_count(), table.record_count());
        for (key, record) in table.records() {
            assert_eq!(other.get(key), Some(record));
        }
    }
}
