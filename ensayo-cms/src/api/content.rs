//! `/api/content`: learner-facing catalog browsing
//!
//! Only active nodes are visible. An archived or unknown parent is a 404.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{collection, parse_id};
use crate::db::nodes::{list_nodes, load_node, ListFilter};
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::{Node, NodeKind};
use crate::AppState;

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/courseSections", get(course_sections))
        .route("/courses/:course_section_id", get(courses))
        .route("/modules/:course_id", get(modules))
        .route("/units/:module_id", get(units))
        .route("/lessons/:unit_id", get(lessons))
        .route("/tools/:tool_group_id", get(tools))
        .route("/practicals/:practical_group_id", get(practical))
}

async fn active_node(conn: &mut SqliteConnection, kind: NodeKind, id: Uuid) -> ApiResult<Node> {
    match load_node(conn, kind, id).await? {
        Some(node) if !node.archived() => Ok(node),
        _ => Err(ApiError::NotFound(format!("{} {} not found", kind.label(), id))),
    }
}

async fn active_children(
    conn: &mut SqliteConnection,
    parent: (NodeKind, Uuid),
    kind: NodeKind,
) -> ApiResult<Vec<Node>> {
    let filter = ListFilter {
        parent: Some(parent),
        active_only: true,
        ..Default::default()
    };
    Ok(list_nodes(conn, kind, &filter).await?)
}

async fn children_of(
    state: &AppState,
    parent_kind: NodeKind,
    raw_id: &str,
    kind: NodeKind,
) -> ApiResult<Json<Value>> {
    let parent_id = parse_id(raw_id, parent_kind.id_field())?;
    let mut conn = state.db.acquire().await?;
    active_node(&mut conn, parent_kind, parent_id).await?;
    let nodes = active_children(&mut conn, (parent_kind, parent_id), kind).await?;
    collection(kind.collection_key(), nodes)
}

/// GET /api/content/courseSections
async fn course_sections(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    let filter = ListFilter {
        active_only: true,
        ..Default::default()
    };
    let nodes = list_nodes(&mut conn, NodeKind::CourseSection, &filter).await?;
    collection(NodeKind::CourseSection.collection_key(), nodes)
}

/// GET /api/content/courses/:courseSectionId
async fn courses(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    children_of(&state, NodeKind::CourseSection, &id, NodeKind::Course).await
}

/// GET /api/content/modules/:courseId
async fn modules(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    children_of(&state, NodeKind::Course, &id, NodeKind::Module).await
}

/// GET /api/content/units/:moduleId
///
/// Ordered by sequence number.
async fn units(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    children_of(&state, NodeKind::Module, &id, NodeKind::Unit).await
}

/// GET /api/content/lessons/:unitId
async fn lessons(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let unit_id = parse_id(&id, "unitId")?;
    let mut conn = state.db.acquire().await?;
    let unit = active_node(&mut conn, NodeKind::Unit, unit_id).await?;
    let parent = (NodeKind::Unit, unit_id);
    let tool_groups = active_children(&mut conn, parent, NodeKind::ToolGroup).await?;
    let practical_groups = active_children(&mut conn, parent, NodeKind::PracticalGroup).await?;

    Ok(Json(json!({
        "unit": unit,
        "toolGroups": tool_groups,
        "practicalGroups": practical_groups,
    })))
}

/// GET /api/content/tools/:toolGroupId
///
/// Tools come from the group's embedded mirror.
async fn tools(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let group_id = parse_id(&id, "toolGroupId")?;
    let mut conn = state.db.acquire().await?;
    let Node::ToolGroup(group) = active_node(&mut conn, NodeKind::ToolGroup, group_id).await? else {
        return Err(ApiError::Internal(format!("tool group {} has an unexpected shape", group_id)));
    };
    let unit = active_node(&mut conn, NodeKind::Unit, group.unit_id).await?;
    let tools: Vec<_> = group.tools.iter().filter(|t| !t.archived).cloned().collect();

    Ok(Json(json!({
        "toolGroup": group,
        "tools": tools,
        "unit": unit,
    })))
}

/// GET /api/content/practicals/:practicalGroupId
async fn practical(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let group_id = parse_id(&id, "practicalGroupId")?;
    let mut conn = state.db.acquire().await?;
    let Node::PracticalGroup(group) =
        active_node(&mut conn, NodeKind::PracticalGroup, group_id).await?
    else {
        return Err(ApiError::Internal(format!(
            "practical group {} has an unexpected shape",
            group_id
        )));
    };
    let unit = active_node(&mut conn, NodeKind::Unit, group.unit_id).await?;

    Ok(Json(json!({
        "practicalGroup": group,
        "unit": unit,
    })))
}
