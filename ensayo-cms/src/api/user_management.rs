//! `/api/userManagement`: admin views over learners

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::nodes::SearchQuery;
use super::{collection, parse_id};
use crate::db::learners;
use crate::error::ApiResult;
use crate::AppState;

pub fn user_management_routes() -> Router<AppState> {
    Router::new()
        .route("/countTotalUsers", get(count_total_users))
        .route("/countEnrolledUsers", get(count_enrolled_users))
        .route("/courseEnrollees", get(course_enrollees))
        .route("/getUsers", get(get_users))
        .route("/getUserDetails/:user_id", get(get_user_details))
}

async fn count_total_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = learners::count_users(&state.db).await?;
    Ok(Json(json!({ "count": count })))
}

async fn count_enrolled_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = learners::count_enrolled_users(&state.db).await?;
    Ok(Json(json!({ "count": count })))
}

/// Enrollment count per active module
async fn course_enrollees(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let modules = learners::module_enrollee_counts(&state.db).await?;
    collection("modules", modules)
}

async fn get_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let users = learners::list_users(&state.db, query.search.as_deref()).await?;
    collection("users", users)
}

async fn get_user_details(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_id(&user_id, "userId")?;
    let user = learners::get_user(&state.db, user_id).await?;
    let enrolled_modules = learners::enrolled_modules(&state.db, user_id).await?;
    let progress = learners::list_progress(&state.db, user_id).await?;

    Ok(Json(json!({
        "user": user,
        "enrolledModules": enrolled_modules,
        "progress": progress,
    })))
}
