//! Learner progress synchronization
//!
//! A unit's completion for a learner is the fraction of the unit's active
//! (non-archived) tool and practical groups the learner has completed.
//! The cascade engine calls [`ProgressSynchronizer::update_progress_for_all`]
//! after committing any change to a unit's active-group membership.

use std::collections::HashSet;

use async_trait::async_trait;
use ensayo_common::db::{retry_on_lock, Progress, DEFAULT_MAX_LOCK_WAIT_MS};
use ensayo_common::uuid_utils::get_uuid;
use ensayo_common::{Error, Result};
use sqlx::types::Json;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::nodes::require_header;
use crate::hierarchy::NodeKind;

#[async_trait]
pub trait ProgressSynchronizer: Send + Sync {
    /// Recompute completion for every learner with progress in `unit_id`
    ///
    /// `excluded_group_id` names a group that has just left the unit. It is
    /// not counted as active and is pruned from completed lists.
    async fn update_progress_for_all(
        &self,
        unit_id: Uuid,
        excluded_group_id: Option<Uuid>,
    ) -> Result<()>;
}

/// Progress synchronizer over the `progress` table
pub struct SqliteProgressSynchronizer {
    db: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteProgressSynchronizer {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    /// Mark a group completed for a learner and recompute the unit
    ///
    /// Creates the learner's progress record on first completion. Completing
    /// a group twice is a no-op.
    pub async fn record_group_completion(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        group_id: Uuid,
    ) -> Result<Progress> {
        let progress = retry_on_lock("record_group_completion", self.max_lock_wait_ms, || {
            self.store_group_completion(user_id, unit_id, group_id)
        })
        .await?;

        info!(
            user_id = %user_id,
            unit_id = %unit_id,
            group_id = %group_id,
            completion = progress.completion,
            "Recorded group completion"
        );
        Ok(progress)
    }

    async fn store_group_completion(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        group_id: Uuid,
    ) -> Result<Progress> {
        let mut tx = self.db.begin().await?;

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if !user_exists {
            return Err(Error::not_found("user", user_id));
        }

        let unit = require_header(&mut tx, NodeKind::Unit, unit_id).await?;
        if unit.archived {
            return Err(Error::Validation(format!("unit {} is archived", unit_id)));
        }
        let module_id = unit
            .ancestry
            .module_id
            .ok_or_else(|| Error::Internal(format!("unit {} has no module", unit_id)))?;

        let group_archived: Option<bool> = sqlx::query_scalar(
            "SELECT archived FROM tool_groups WHERE id = ? AND unit_id = ?
             UNION ALL
             SELECT archived FROM practical_groups WHERE id = ? AND unit_id = ?",
        )
        .bind(group_id.to_string())
        .bind(unit_id.to_string())
        .bind(group_id.to_string())
        .bind(unit_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        match group_archived {
            None => {
                return Err(Error::NotFound(format!(
                    "group {} not found in unit {}",
                    group_id, unit_id
                )))
            }
            Some(true) => return Err(Error::Validation(format!("group {} is archived", group_id))),
            Some(false) => {}
        }

        let existing = sqlx::query(
            "SELECT completed_groups FROM progress WHERE user_id = ? AND unit_id = ?",
        )
        .bind(user_id.to_string())
        .bind(unit_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let mut completed_groups = match existing {
            Some(row) => row.try_get::<Json<Vec<Uuid>>, _>("completed_groups")?.0,
            None => Vec::new(),
        };
        if !completed_groups.contains(&group_id) {
            completed_groups.push(group_id);
        }

        let active = active_group_ids(&mut tx, unit_id, None).await?;
        let completion = completion_fraction(&completed_groups, &active);

        sqlx::query(
            r#"
            INSERT INTO progress (user_id, unit_id, module_id, completed_groups, completion)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, unit_id) DO UPDATE SET
                module_id = excluded.module_id,
                completed_groups = excluded.completed_groups,
                completion = excluded.completion,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id.to_string())
        .bind(unit_id.to_string())
        .bind(module_id.to_string())
        .bind(serde_json::to_string(&completed_groups)?)
        .bind(completion)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Progress {
            user_id,
            unit_id,
            module_id,
            completed_groups,
            completion,
        })
    }

    /// Rewrite every learner's record in `unit_id`; returns (learners, active groups)
    async fn recompute_unit(
        &self,
        unit_id: Uuid,
        excluded_group_id: Option<Uuid>,
    ) -> Result<(usize, usize)> {
        let mut tx = self.db.begin().await?;

        let active = active_group_ids(&mut tx, unit_id, excluded_group_id).await?;

        let rows = sqlx::query("SELECT user_id, completed_groups FROM progress WHERE unit_id = ?")
            .bind(unit_id.to_string())
            .fetch_all(&mut *tx)
            .await?;

        for row in &rows {
            let user_id = get_uuid(row, "user_id")?;
            let mut completed: Vec<Uuid> = row.try_get::<Json<Vec<Uuid>>, _>("completed_groups")?.0;
            if let Some(excluded) = excluded_group_id {
                completed.retain(|g| *g != excluded);
            }
            let completion = completion_fraction(&completed, &active);

            sqlx::query(
                "UPDATE progress SET completed_groups = ?, completion = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE user_id = ? AND unit_id = ?",
            )
            .bind(serde_json::to_string(&completed)?)
            .bind(completion)
            .bind(user_id.to_string())
            .bind(unit_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((rows.len(), active.len()))
    }
}

#[async_trait]
impl ProgressSynchronizer for SqliteProgressSynchronizer {
    async fn update_progress_for_all(
        &self,
        unit_id: Uuid,
        excluded_group_id: Option<Uuid>,
    ) -> Result<()> {
        let (learners, active_groups) =
            retry_on_lock("update_progress_for_all", self.max_lock_wait_ms, || {
                self.recompute_unit(unit_id, excluded_group_id)
            })
            .await?;

        debug!(
            unit_id = %unit_id,
            excluded = ?excluded_group_id,
            learners,
            active_groups,
            "Recomputed unit progress"
        );
        Ok(())
    }
}

/// Active tool and practical group ids of a unit, minus `excluded`
pub(crate) async fn active_group_ids(
    conn: &mut SqliteConnection,
    unit_id: Uuid,
    excluded: Option<Uuid>,
) -> Result<HashSet<Uuid>> {
    let rows = sqlx::query(
        "SELECT id FROM tool_groups WHERE unit_id = ? AND archived = 0
         UNION
         SELECT id FROM practical_groups WHERE unit_id = ? AND archived = 0",
    )
    .bind(unit_id.to_string())
    .bind(unit_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut ids = HashSet::with_capacity(rows.len());
    for row in &rows {
        ids.insert(get_uuid(row, "id")?);
    }
    if let Some(excluded) = excluded {
        ids.remove(&excluded);
    }
    Ok(ids)
}

/// Fraction of `active` present in `completed`; 0.0 when nothing is active
pub fn completion_fraction(completed: &[Uuid], active: &HashSet<Uuid>) -> f64 {
    if active.is_empty() {
        return 0.0;
    }
    let done: HashSet<&Uuid> = completed.iter().filter(|id| active.contains(id)).collect();
    done.len() as f64 / active.len() as f64
}
