//! Cascade engine
//!
//! Applies add, edit and archive operations to one hierarchy node and
//! propagates ancestor references and `archived` flags to every descendant
//! level, root to leaf. Each operation runs in a single SQLite transaction,
//! restarted from the beginning if it loses a lock race with a concurrent
//! writer. The progress synchronizer runs only after that transaction commits.

mod add;
mod archive;
mod edit;
pub mod mirror;

use std::sync::Arc;

use ensayo_common::db::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use ensayo_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::nodes::require_node;
use crate::hierarchy::{Node, NodeInput, NodeKind};
use crate::progress::ProgressSynchronizer;

/// Synchronizer calls owed by a committed cascade, at most one per unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    calls: Vec<(Uuid, Option<Uuid>)>,
}

impl SyncPlan {
    /// Schedule `unit_id`; later requests for the same unit are dropped
    pub fn push(&mut self, unit_id: Uuid, excluded_group_id: Option<Uuid>) {
        if !self.calls.iter().any(|(u, _)| *u == unit_id) {
            self.calls.push((unit_id, excluded_group_id));
        }
    }

    pub fn calls(&self) -> &[(Uuid, Option<Uuid>)] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

pub struct CascadeEngine {
    db: SqlitePool,
    synchronizer: Arc<dyn ProgressSynchronizer>,
    max_lock_wait_ms: u64,
}

impl CascadeEngine {
    pub fn new(db: SqlitePool, synchronizer: Arc<dyn ProgressSynchronizer>) -> Self {
        Self {
            db,
            synchronizer,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    /// Override how long a cascade keeps retrying after losing a lock race
    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    /// Create a node under an existing parent
    pub async fn add_node(&self, kind: NodeKind, input: NodeInput) -> Result<Node> {
        let input = &input;
        let (node, plan) = retry_on_lock("add_node", self.max_lock_wait_ms, || async move {
            let mut tx = self.db.begin().await?;
            let (id, plan) = add::apply_add(&mut tx, kind, input).await?;
            let node = require_node(&mut tx, kind, id).await?;
            tx.commit().await?;
            Ok::<_, Error>((node, plan))
        })
        .await?;

        info!(kind = kind.label(), id = %node.id(), archived = node.archived(), "Added node");
        self.synchronize(plan).await?;
        Ok(node)
    }

    /// Replace a node's fields and cascade to its subtree
    ///
    /// Ancestor references in `input` are the new truth: every descendant's
    /// references and `archived` flag are rewritten to match.
    pub async fn edit_node(&self, kind: NodeKind, id: Uuid, input: NodeInput) -> Result<Node> {
        let input = &input;
        let (node, plan) = retry_on_lock("edit_node", self.max_lock_wait_ms, || async move {
            let mut tx = self.db.begin().await?;
            let plan = edit::apply_edit(&mut tx, kind, id, input).await?;
            let node = require_node(&mut tx, kind, id).await?;
            tx.commit().await?;
            Ok::<_, Error>((node, plan))
        })
        .await?;

        info!(kind = kind.label(), id = %id, archived = node.archived(), "Edited node");
        self.synchronize(plan).await?;
        Ok(node)
    }

    /// Soft-delete a node and its whole subtree
    pub async fn archive_node(&self, kind: NodeKind, id: Uuid) -> Result<Node> {
        let (node, plan) = retry_on_lock("archive_node", self.max_lock_wait_ms, || async move {
            let mut tx = self.db.begin().await?;
            let plan = archive::apply_archive(&mut tx, kind, id).await?;
            let node = require_node(&mut tx, kind, id).await?;
            tx.commit().await?;
            Ok::<_, Error>((node, plan))
        })
        .await?;

        info!(kind = kind.label(), id = %id, "Archived node");
        self.synchronize(plan).await?;
        Ok(node)
    }

    async fn synchronize(&self, plan: SyncPlan) -> Result<()> {
        for &(unit_id, excluded) in plan.calls() {
            debug!(unit_id = %unit_id, excluded = ?excluded, "Synchronizing unit progress");
            self.synchronizer
                .update_progress_for_all(unit_id, excluded)
                .await?;
        }
        Ok(())
    }
}
