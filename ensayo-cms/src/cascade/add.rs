use ensayo_common::uuid_utils;
use ensayo_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{mirror, SyncPlan};
use crate::db::nodes::{next_sequence_number, require_tool};
use crate::db::{bind_values, placeholders};
use crate::hierarchy::{NodeInput, NodeKind, SqlValue};
use crate::validation::{validate_ancestry, validate_fields};

/// Insert a new node; returns its id and the synchronizer calls owed
///
/// Children of an archived parent are created archived.
pub(super) async fn apply_add(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    input: &NodeInput,
) -> Result<(Uuid, SyncPlan)> {
    validate_fields(kind, input)?;
    let parent = validate_ancestry(conn, kind, &input.ancestry).await?;
    let refs = input.ancestry.require(kind)?;

    let archived =
        input.archived.unwrap_or(false) || parent.as_ref().is_some_and(|p| p.archived);
    let id = uuid_utils::generate();

    let mut columns = vec!["id"];
    let mut values = vec![SqlValue::Id(id)];
    for (column, value) in input.own_fields(kind) {
        columns.push(column);
        values.push(value);
    }
    if kind == NodeKind::Unit && input.sequence_number.is_none() {
        if let Some(module_id) = input.ancestry.module_id {
            columns.push("sequence_number");
            values.push(SqlValue::Integer(next_sequence_number(conn, module_id).await?));
        }
    }
    for (ancestor, ancestor_id) in refs {
        columns.push(ancestor.id_column());
        values.push(SqlValue::Id(ancestor_id));
    }
    columns.push("archived");
    values.push(SqlValue::Bool(archived));

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table(),
        columns.join(", "),
        placeholders(columns.len())
    );
    bind_values(sqlx::query(&sql), values)
        .execute(&mut *conn)
        .await?;

    let mut plan = SyncPlan::default();
    match kind {
        NodeKind::Tool => {
            let tool = require_tool(conn, id).await?;
            mirror::upsert_entry(conn, &tool).await?;
        }
        NodeKind::ToolGroup | NodeKind::PracticalGroup if !archived => {
            if let Some(unit_id) = input.ancestry.unit_id {
                plan.push(unit_id, None);
            }
        }
        _ => {}
    }

    Ok((id, plan))
}
