//! Presigned upload URL endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::storage::{self, PresignedUpload, Presigner};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    #[serde(default)]
    pub extension: Option<String>,
}

fn presigner(state: &AppState) -> ApiResult<&Presigner> {
    state
        .presigner
        .as_deref()
        .ok_or_else(|| ApiError::Upstream("asset storage is not configured".to_string()))
}

/// GET /api/contentManagement/uploadImage
pub async fn upload_image(State(state): State<AppState>) -> ApiResult<Json<PresignedUpload>> {
    let upload = storage::presign_upload(presigner(&state)?, storage::image_key())?;
    info!(key = %upload.key, "Presigned image upload");
    Ok(Json(upload))
}

/// GET /api/lessonManagement/uploadObject?extension=glb
pub async fn upload_object(
    State(state): State<AppState>,
    Query(query): Query<ObjectQuery>,
) -> ApiResult<Json<PresignedUpload>> {
    let extension = query
        .extension
        .ok_or_else(|| ApiError::BadRequest("extension is required".to_string()))?;
    let key = storage::object_key(&extension)?;
    let upload = storage::presign_upload(presigner(&state)?, key)?;
    info!(key = %upload.key, "Presigned object upload");
    Ok(Json(upload))
}
