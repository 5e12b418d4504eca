use ensayo_common::Result;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::{mirror, SyncPlan};
use crate::db::nodes::{require_header, require_tool};
use crate::hierarchy::NodeKind;

/// Archive a node, then every descendant level shallow first
pub(super) async fn apply_archive(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
) -> Result<SyncPlan> {
    let former = require_header(conn, kind, id).await?;

    let sql = format!(
        "UPDATE {} SET archived = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        kind.table()
    );
    sqlx::query(&sql)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    for &descendant in kind.descendants() {
        let sql = format!(
            "UPDATE {} SET archived = 1, updated_at = CURRENT_TIMESTAMP WHERE {} = ?",
            descendant.table(),
            kind.id_column()
        );
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        debug!(
            kind = kind.label(),
            id = %id,
            descendant = descendant.label(),
            rows = result.rows_affected(),
            "Cascaded archive"
        );
    }

    // The archived tool keeps its mirror entry with the flag set
    match kind {
        NodeKind::Tool => {
            let tool = require_tool(conn, id).await?;
            mirror::upsert_entry(conn, &tool).await?;
        }
        NodeKind::PracticalGroup => {}
        _ => mirror::rebuild_within(conn, kind, id).await?,
    }

    if kind.scopes_progress() {
        purge_learner_data(conn, kind, id).await?;
    }

    let mut plan = SyncPlan::default();
    if kind.is_group() && !former.archived {
        if let Some(unit_id) = former.ancestry.unit_id {
            plan.push(unit_id, None);
        }
    }
    Ok(plan)
}

/// Delete progress tied to the archived subtree's units and modules, and
/// the enrollments in its modules
pub(super) async fn purge_learner_data(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
) -> Result<()> {
    let mut sql = format!(
        "DELETE FROM progress WHERE unit_id IN (SELECT id FROM units WHERE {})",
        kind.subtree_filter(NodeKind::Unit)
    );
    if kind.scopes_enrollments() {
        sql.push_str(&format!(
            " OR module_id IN (SELECT id FROM modules WHERE {})",
            kind.subtree_filter(NodeKind::Module)
        ));
    }

    let mut query = sqlx::query(&sql).bind(id.to_string());
    if kind.scopes_enrollments() {
        query = query.bind(id.to_string());
    }
    let progress_deleted = query.execute(&mut *conn).await?.rows_affected();

    let mut enrollments_deleted = 0;
    if kind.scopes_enrollments() {
        let sql = format!(
            "DELETE FROM enrollments WHERE module_id IN (SELECT id FROM modules WHERE {})",
            kind.subtree_filter(NodeKind::Module)
        );
        enrollments_deleted = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    debug!(
        kind = kind.label(),
        id = %id,
        progress_deleted,
        enrollments_deleted,
        "Purged learner data for archived subtree"
    );
    Ok(())
}
