//! `/api/users`: learner accounts and module enrollment

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use ensayo_common::db::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::learners;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub user_id: Uuid,
    pub module_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub user_id: Uuid,
    pub enrolled_modules: Vec<Uuid>,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/enroll", post(enroll))
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(req) = body?;
    let user = learners::create_user(&state.db, &req.username, req.email.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/users/enroll
async fn enroll(
    State(state): State<AppState>,
    body: Result<Json<EnrollRequest>, JsonRejection>,
) -> ApiResult<Json<EnrollResponse>> {
    let Json(req) = body?;
    let enrolled_modules = learners::enroll(&state.db, req.user_id, req.module_id).await?;
    Ok(Json(EnrollResponse {
        user_id: req.user_id,
        enrolled_modules,
    }))
}
