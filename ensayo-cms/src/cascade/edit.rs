use ensayo_common::Result;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::archive::purge_learner_data;
use super::{mirror, SyncPlan};
use crate::db::bind_values;
use crate::db::nodes::{require_header, require_tool};
use crate::hierarchy::{Ancestry, NodeInput, NodeKind, SqlValue};
use crate::validation::{validate_ancestry, validate_archived, validate_fields};

/// Overwrite one node and rewrite its subtree
///
/// The stored header is read first and everything is validated before the
/// first write, so a missing id or a bad parent leaves the store untouched.
pub(super) async fn apply_edit(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
    input: &NodeInput,
) -> Result<SyncPlan> {
    validate_fields(kind, input)?;
    let former = require_header(conn, kind, id).await?;
    let parent = validate_ancestry(conn, kind, &input.ancestry).await?;
    let archived = input.archived.unwrap_or(former.archived);
    validate_archived(kind, archived, parent.as_ref())?;
    let ancestry = input.ancestry.for_kind(kind);

    let mut plan = SyncPlan::default();

    // Un-archiving a subtree revives every group in it
    if kind.scopes_progress() && !archived {
        for unit_id in units_with_archived_groups(conn, kind, id).await? {
            plan.push(unit_id, None);
        }
    }

    update_own_row(conn, kind, id, input, &ancestry, archived).await?;
    if ancestry != former.ancestry {
        debug!(kind = kind.label(), id = %id, from = ?former.ancestry, to = ?ancestry, "Re-parented node");
    }

    cascade_descendants(conn, kind, id, &ancestry, archived).await?;

    match kind {
        NodeKind::Tool => {
            let tool = require_tool(conn, id).await?;
            if let Some(old_group) = former
                .ancestry
                .tool_group_id
                .filter(|g| *g != tool.tool_group_id)
            {
                mirror::remove_entry(conn, old_group, id).await?;
            }
            mirror::upsert_entry(conn, &tool).await?;
        }
        NodeKind::PracticalGroup => {}
        _ => mirror::rebuild_within(conn, kind, id).await?,
    }

    if kind.scopes_progress() {
        if archived {
            purge_learner_data(conn, kind, id).await?;
        } else if let (NodeKind::Unit, Some(module_id)) = (kind, ancestry.module_id) {
            sqlx::query("UPDATE progress SET module_id = ?, updated_at = CURRENT_TIMESTAMP WHERE unit_id = ?")
                .bind(module_id.to_string())
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?;
        }
    }

    if kind.is_group() {
        plan_group_sync(&mut plan, id, &former.ancestry, former.archived, &ancestry, archived);
    }

    Ok(plan)
}

/// Which units lose or gain an active group when a group is edited
fn plan_group_sync(
    plan: &mut SyncPlan,
    group_id: Uuid,
    former: &Ancestry,
    was_archived: bool,
    current: &Ancestry,
    archived: bool,
) {
    let (was_active, is_active) = (!was_archived, !archived);
    match (former.unit_id, current.unit_id) {
        (Some(old_unit), Some(new_unit)) if old_unit != new_unit => {
            if was_active {
                plan.push(old_unit, Some(group_id));
            }
            if is_active {
                plan.push(new_unit, None);
            }
        }
        (_, Some(unit)) if was_active != is_active => plan.push(unit, None),
        _ => {}
    }
}

async fn update_own_row(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
    input: &NodeInput,
    ancestry: &Ancestry,
    archived: bool,
) -> Result<()> {
    let mut assignments = Vec::new();
    let mut values = Vec::new();
    for (column, value) in input.own_fields(kind) {
        assignments.push(format!("{} = ?", column));
        values.push(value);
    }
    for (ancestor, ancestor_id) in ancestry.require(kind)? {
        assignments.push(format!("{} = ?", ancestor.id_column()));
        values.push(SqlValue::Id(ancestor_id));
    }
    assignments.push("archived = ?".to_string());
    values.push(SqlValue::Bool(archived));
    assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());
    values.push(SqlValue::Id(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        kind.table(),
        assignments.join(", ")
    );
    bind_values(sqlx::query(&sql), values)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rewrite the edited node's references and `archived` on every descendant
///
/// Levels are visited shallow first. Rows are selected by the edited node's
/// own id, which never changes, so no level reads a stale filter.
async fn cascade_descendants(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
    ancestry: &Ancestry,
    archived: bool,
) -> Result<()> {
    let refs = ancestry.require(kind)?;

    for &descendant in kind.descendants() {
        let mut assignments: Vec<String> = refs
            .iter()
            .map(|(a, _)| format!("{} = ?", a.id_column()))
            .collect();
        assignments.push("archived = ?".to_string());
        assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());

        let mut values: Vec<SqlValue> = refs.iter().map(|(_, r)| SqlValue::Id(*r)).collect();
        values.push(SqlValue::Bool(archived));
        values.push(SqlValue::Id(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            descendant.table(),
            assignments.join(", "),
            kind.id_column()
        );
        let result = bind_values(sqlx::query(&sql), values)
            .execute(&mut *conn)
            .await?;

        debug!(
            kind = kind.label(),
            id = %id,
            descendant = descendant.label(),
            rows = result.rows_affected(),
            archived,
            "Cascaded edit"
        );
    }
    Ok(())
}

/// Units under `(kind, id)` holding at least one archived group
async fn units_with_archived_groups(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
) -> Result<Vec<Uuid>> {
    let filter = kind.subtree_filter(NodeKind::ToolGroup);
    let sql = format!(
        "SELECT unit_id FROM tool_groups WHERE {filter} AND archived = 1
         UNION
         SELECT unit_id FROM practical_groups WHERE {filter} AND archived = 1",
        filter = filter
    );
    let unit_ids: Vec<String> = sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .bind(id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    unit_ids
        .iter()
        .map(|raw| ensayo_common::uuid_utils::parse(raw))
        .collect()
}
