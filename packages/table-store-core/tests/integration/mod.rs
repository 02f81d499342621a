//! Integration test suite.
//!
//! 1. Record codec through the public API
//! 2. Event stream replay into a replica
//! 3. Snapshot reads during a fold
//! 4. Checkpoint and resume

pub mod checkpoint_tests;
pub mod codec_tests;
pub mod helpers;
pub mod replay_tests;
pub mod snapshot_tests;
