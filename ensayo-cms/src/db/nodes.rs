//! Hierarchy node reads
//!
//! Every function takes a connection so the cascade can run them inside its
//! transaction; handlers pass a pooled connection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ensayo_common::db::Tool;
use ensayo_common::uuid_utils::get_uuid;
use ensayo_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{bind_values, placeholders, SearchTerm};
use crate::hierarchy::{Ancestry, Node, NodeKind, SqlValue};

/// The part of a node the cascade diffs against before overwriting
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHeader {
    pub kind: NodeKind,
    pub id: Uuid,
    pub archived: bool,
    pub ancestry: Ancestry,
}

pub async fn load_header(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
) -> Result<Option<NodeHeader>> {
    let mut columns = vec!["id", "archived"];
    columns.extend(kind.ancestor_kinds().iter().map(|a| a.id_column()));
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        columns.join(", "),
        kind.table()
    );

    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut ancestry = Ancestry::default();
    for &a in kind.ancestor_kinds() {
        ancestry.set(a, Some(get_uuid(&row, a.id_column())?));
    }

    Ok(Some(NodeHeader {
        kind,
        id,
        archived: row.try_get("archived")?,
        ancestry,
    }))
}

/// [`load_header`], failing with NotFound
pub async fn require_header(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    id: Uuid,
) -> Result<NodeHeader> {
    load_header(conn, kind, id)
        .await?
        .ok_or_else(|| Error::not_found(kind.label(), id))
}

pub async fn load_node(conn: &mut SqliteConnection, kind: NodeKind, id: Uuid) -> Result<Option<Node>> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", kind.table());
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| Node::from_row(kind, &row)).transpose()
}

/// [`load_node`], failing with NotFound
pub async fn require_node(conn: &mut SqliteConnection, kind: NodeKind, id: Uuid) -> Result<Node> {
    load_node(conn, kind, id)
        .await?
        .ok_or_else(|| Error::not_found(kind.label(), id))
}

pub async fn require_tool(conn: &mut SqliteConnection, id: Uuid) -> Result<Tool> {
    let row = sqlx::query("SELECT * FROM tools WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("tool", id))?;
    Tool::from_row(&row)
}

/// Next free unit position within a module
pub async fn next_sequence_number(conn: &mut SqliteConnection, module_id: Uuid) -> Result<i64> {
    let next: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM units WHERE module_id = ?",
    )
    .bind(module_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(next)
}

/// Row selection for [`list_nodes`]
#[derive(Debug, Clone, Default)]
pub struct ListFilter<'a> {
    /// Case-insensitive substring of the title (name for tools)
    pub search: Option<&'a str>,
    /// Restrict to children of one ancestor
    pub parent: Option<(NodeKind, Uuid)>,
    /// Hide archived nodes (learner-facing views)
    pub active_only: bool,
}

pub async fn list_nodes(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    filter: &ListFilter<'_>,
) -> Result<Vec<Node>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some((parent_kind, parent_id)) = filter.parent {
        clauses.push(format!("{} = ?", parent_kind.id_column()));
        values.push(SqlValue::Id(parent_id));
    }
    if filter.active_only {
        clauses.push("archived = 0".to_string());
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let order = match kind {
        NodeKind::Unit => "sequence_number, created_at, rowid",
        _ => "created_at, rowid",
    };
    let sql = format!("SELECT * FROM {}{} ORDER BY {}", kind.table(), where_sql, order);

    let rows = bind_values(sqlx::query(&sql), values)
        .fetch_all(&mut *conn)
        .await?;

    let search = SearchTerm::parse(filter.search);
    let mut nodes = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(term) = &search {
            let title: Option<String> = row.try_get(kind.title_column())?;
            if !title.is_some_and(|t| term.matches(&t)) {
                continue;
            }
        }
        nodes.push(Node::from_row(kind, row)?);
    }
    Ok(nodes)
}

/// A node in an admin list, with the titles of its ancestors
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedNode {
    #[serde(flatten)]
    pub node: Node,
    pub parent_titles: BTreeMap<&'static str, String>,
}

pub async fn list_with_parents(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    filter: &ListFilter<'_>,
) -> Result<Vec<ListedNode>> {
    let nodes = list_nodes(conn, kind, filter).await?;
    let mut titles = parent_titles(conn, kind, &nodes).await?;
    Ok(nodes
        .into_iter()
        .map(|node| {
            let parent_titles = titles.remove(&node.id()).unwrap_or_default();
            ListedNode {
                node,
                parent_titles,
            }
        })
        .collect())
}

/// Ancestor titles per node, keyed by [`NodeKind::field_key`]
async fn parent_titles(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    nodes: &[Node],
) -> Result<HashMap<Uuid, BTreeMap<&'static str, String>>> {
    let mut result: HashMap<Uuid, BTreeMap<&'static str, String>> = HashMap::new();
    let ancestries: Vec<(Uuid, Ancestry)> = nodes.iter().map(|n| (n.id(), n.ancestry())).collect();

    for &ancestor in kind.ancestor_kinds() {
        let ids: BTreeSet<Uuid> = ancestries
            .iter()
            .filter_map(|(_, a)| a.get(ancestor))
            .collect();
        if ids.is_empty() {
            continue;
        }

        let sql = format!(
            "SELECT id, {} AS title FROM {} WHERE id IN ({})",
            ancestor.title_column(),
            ancestor.table(),
            placeholders(ids.len())
        );
        let values = ids.iter().copied().map(SqlValue::Id).collect();
        let rows = bind_values(sqlx::query(&sql), values)
            .fetch_all(&mut *conn)
            .await?;

        let mut titles = HashMap::with_capacity(rows.len());
        for row in &rows {
            let title: String = row.try_get("title")?;
            titles.insert(get_uuid(row, "id")?, title);
        }

        for (node_id, ancestry) in &ancestries {
            if let Some(title) = ancestry.get(ancestor).and_then(|id| titles.get(&id)) {
                result
                    .entry(*node_id)
                    .or_default()
                    .insert(ancestor.field_key(), title.clone());
            }
        }
    }

    Ok(result)
}
