//! Test Helper Utilities
//!
//! Shared utilities for testing ensayo-cms

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;
pub mod recording;

// Re-export commonly used items
pub use db_utils::{archived_flag, column_id, create_test_db, mirror_of, progress_for};
pub use fixtures::{named, seed_tree, titled, SeedTree};
pub use recording::RecordingSynchronizer;
