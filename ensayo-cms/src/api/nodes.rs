//! Admin CRUD handlers shared by every hierarchy level
//!
//! Each kind gets `add{Kind}`, `getAll{Kind}s`, `edit{Kind}/:id` and
//! `archive{Kind}/:id`, all backed by the cascade engine.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{collection, parse_id};
use crate::db::nodes::{list_with_parents, ListFilter};
use crate::error::ApiResult;
use crate::hierarchy::{Node, NodeInput, NodeKind};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// Routes for one kind
pub fn node_routes(kind: NodeKind) -> Router<AppState> {
    let name = kind.route_name();
    Router::new()
        .route(
            &format!("/add{}", name),
            post(
                move |state: State<AppState>, body: Result<Json<NodeInput>, JsonRejection>| {
                    add_node(kind, state, body)
                },
            ),
        )
        .route(
            &format!("/getAll{}s", name),
            get(move |state: State<AppState>, query: Query<SearchQuery>| {
                list_nodes(kind, state, query)
            }),
        )
        .route(
            &format!("/edit{}/:id", name),
            put(
                move |state: State<AppState>,
                      path: Path<String>,
                      body: Result<Json<NodeInput>, JsonRejection>| {
                    edit_node(kind, state, path, body)
                },
            ),
        )
        .route(
            &format!("/archive{}/:id", name),
            put(move |state: State<AppState>, path: Path<String>| {
                archive_node(kind, state, path)
            }),
        )
}

async fn add_node(
    kind: NodeKind,
    State(state): State<AppState>,
    body: Result<Json<NodeInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let Json(input) = body?;
    let node = state.engine.add_node(kind, input).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn list_nodes(
    kind: NodeKind,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    let filter = ListFilter {
        search: query.search.as_deref(),
        ..Default::default()
    };
    let nodes = list_with_parents(&mut conn, kind, &filter).await?;
    collection(kind.collection_key(), nodes)
}

async fn edit_node(
    kind: NodeKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<NodeInput>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let id = parse_id(&id, "id")?;
    let Json(input) = body?;
    let node = state.engine.edit_node(kind, id, input).await?;
    Ok(Json(node))
}

async fn archive_node(
    kind: NodeKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Node>> {
    let id = parse_id(&id, "id")?;
    let node = state.engine.archive_node(kind, id).await?;
    Ok(Json(node))
}
