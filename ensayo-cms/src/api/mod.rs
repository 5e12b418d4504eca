//! HTTP API handlers for ensayo-cms

pub mod content;
pub mod content_management;
pub mod health;
pub mod lesson_management;
pub mod nodes;
pub mod progress;
pub mod uploads;
pub mod user_management;
pub mod users;

pub use content::content_routes;
pub use content_management::content_management_routes;
pub use health::health_routes;
pub use lesson_management::lesson_management_routes;
pub use progress::progress_routes;
pub use user_management::user_management_routes;
pub use users::user_routes;

use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Parse an id from a path segment
pub(crate) fn parse_id(raw: &str, field: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("{} '{}' is not a valid id", field, raw)))
}

/// `{"<key>": [...], "totalCount": n}`
pub(crate) fn collection<T: Serialize>(key: &str, items: Vec<T>) -> ApiResult<Json<Value>> {
    let total = items.len();
    let items = serde_json::to_value(items)
        .map_err(|e| ApiError::Internal(format!("Serialize {} failed: {}", key, e)))?;

    let mut body = Map::new();
    body.insert(key.to_string(), items);
    body.insert("totalCount".to_string(), Value::from(total));
    Ok(Json(Value::Object(body)))
}
