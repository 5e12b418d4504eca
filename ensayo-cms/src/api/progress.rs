//! `/api/progress`: learner activity

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use ensayo_common::db::Progress;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{collection, parse_id};
use crate::db::learners;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGroupRequest {
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub group_id: Uuid,
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/completeGroup", post(complete_group))
        .route("/:user_id", get(list_progress))
}

/// POST /api/progress/completeGroup
async fn complete_group(
    State(state): State<AppState>,
    body: Result<Json<CompleteGroupRequest>, JsonRejection>,
) -> ApiResult<Json<Progress>> {
    let Json(req) = body?;
    let progress = state
        .progress
        .record_group_completion(req.user_id, req.unit_id, req.group_id)
        .await?;
    Ok(Json(progress))
}

/// GET /api/progress/:userId
async fn list_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_id(&user_id, "userId")?;
    let progress = learners::list_progress(&state.db, user_id).await?;
    collection("progress", progress)
}
