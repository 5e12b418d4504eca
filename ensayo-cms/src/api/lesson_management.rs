//! `/api/lessonManagement`: tool groups, practical groups and tools

use axum::{routing::get, Router};

use super::nodes::node_routes;
use super::uploads::upload_object;
use crate::hierarchy::NodeKind;
use crate::AppState;

pub fn lesson_management_routes() -> Router<AppState> {
    [NodeKind::ToolGroup, NodeKind::PracticalGroup, NodeKind::Tool]
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(node_routes(kind)))
        .route("/uploadObject", get(upload_object))
}
