//! `/api/contentManagement`: course sections, courses, modules and units

use axum::{routing::get, Router};

use super::nodes::node_routes;
use super::uploads::upload_image;
use crate::hierarchy::NodeKind;
use crate::AppState;

pub fn content_management_routes() -> Router<AppState> {
    [
        NodeKind::CourseSection,
        NodeKind::Course,
        NodeKind::Module,
        NodeKind::Unit,
    ]
    .into_iter()
    .fold(Router::new(), |router, kind| router.merge(node_routes(kind)))
    .route("/uploadImage", get(upload_image))
}
