//! ToolGroup `tools` mirror maintenance
//!
//! The `tools` column on `tool_groups` is a denormalized copy of the group's
//! Tool rows. It is rewritten inside the same transaction as every Tool
//! write, after the Tool row itself.

use ensayo_common::db::{MirroredTool, Tool};
use ensayo_common::uuid_utils::get_uuid;
use ensayo_common::{Error, Result};
use sqlx::types::Json;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::hierarchy::NodeKind;

async fn load(conn: &mut SqliteConnection, group_id: Uuid) -> Result<Vec<MirroredTool>> {
    let tools: Option<Json<Vec<MirroredTool>>> =
        sqlx::query_scalar("SELECT tools FROM tool_groups WHERE id = ?")
            .bind(group_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
    tools
        .map(|t| t.0)
        .ok_or_else(|| Error::not_found("tool group", group_id))
}

async fn store(conn: &mut SqliteConnection, group_id: Uuid, tools: &[MirroredTool]) -> Result<()> {
    sqlx::query("UPDATE tool_groups SET tools = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(serde_json::to_string(tools)?)
        .bind(group_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rewrite the tool's entry in place, appending it if absent
pub async fn upsert_entry(conn: &mut SqliteConnection, tool: &Tool) -> Result<()> {
    let group_id = tool.tool_group_id;
    let mut tools = load(conn, group_id).await?;
    let entry = MirroredTool::from(tool);
    match tools.iter_mut().find(|t| t.id == entry.id) {
        Some(existing) => *existing = entry,
        None => tools.push(entry),
    }
    store(conn, group_id, &tools).await?;
    debug!(group_id = %group_id, tool_id = %tool.id, "Mirrored tool into group");
    Ok(())
}

/// Drop a tool that moved to another group
pub async fn remove_entry(conn: &mut SqliteConnection, group_id: Uuid, tool_id: Uuid) -> Result<()> {
    let mut tools = load(conn, group_id).await?;
    let before = tools.len();
    tools.retain(|t| t.id != tool_id);
    if tools.len() != before {
        store(conn, group_id, &tools).await?;
        debug!(group_id = %group_id, tool_id = %tool_id, "Removed tool from group mirror");
    }
    Ok(())
}

/// Regenerate a group's mirror from its Tool rows
pub async fn rebuild(conn: &mut SqliteConnection, group_id: Uuid) -> Result<()> {
    let rows = sqlx::query("SELECT * FROM tools WHERE tool_group_id = ? ORDER BY created_at, rowid")
        .bind(group_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    let mut tools = Vec::with_capacity(rows.len());
    for row in &rows {
        tools.push(MirroredTool::from(&Tool::from_row(row)?));
    }
    store(conn, group_id, &tools).await
}

/// Rebuild every tool group inside the subtree rooted at `(kind, id)`
///
/// Used after bulk cascades that rewrite Tool archived flags.
pub async fn rebuild_within(conn: &mut SqliteConnection, kind: NodeKind, id: Uuid) -> Result<()> {
    if !(kind == NodeKind::ToolGroup || kind.contains(NodeKind::ToolGroup)) {
        return Ok(());
    }

    let sql = format!(
        "SELECT id FROM tool_groups WHERE {}",
        kind.subtree_filter(NodeKind::ToolGroup)
    );
    let rows = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    for row in &rows {
        rebuild(conn, get_uuid(row, "id")?).await?;
    }
    debug!(kind = kind.label(), id = %id, groups = rows.len(), "Rebuilt tool group mirrors");
    Ok(())
}
