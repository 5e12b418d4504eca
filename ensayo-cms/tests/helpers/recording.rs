//! Synchronizer that records every call before delegating
//!
//! Can be switched to fail every call, standing in for a progress store
//! that is unavailable after the structural transaction committed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ensayo_cms::progress::{ProgressSynchronizer, SqliteProgressSynchronizer};
use ensayo_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct RecordingSynchronizer {
    inner: SqliteProgressSynchronizer,
    calls: Mutex<Vec<(Uuid, Option<Uuid>)>>,
    failing: AtomicBool,
}

impl RecordingSynchronizer {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            inner: SqliteProgressSynchronizer::new(db),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// The real synchronizer, for recording completions in test setup
    pub fn inner(&self) -> &SqliteProgressSynchronizer {
        &self.inner
    }

    pub fn calls(&self) -> Vec<(Uuid, Option<Uuid>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// While set, calls are recorded and then fail without touching progress
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressSynchronizer for RecordingSynchronizer {
    async fn update_progress_for_all(
        &self,
        unit_id: Uuid,
        excluded_group_id: Option<Uuid>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push((unit_id, excluded_group_id));
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Internal(format!(
                "progress store unavailable for unit {}",
                unit_id
            )));
        }
        self.inner
            .update_progress_for_all(unit_id, excluded_group_id)
            .await
    }
}
