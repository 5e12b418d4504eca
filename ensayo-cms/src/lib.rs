//! ensayo-cms library - content management service
//!
//! Admin and learner REST API over the content hierarchy, with the cascade
//! engine keeping ancestor references, archive flags, tool group mirrors and
//! learner progress consistent.

use std::sync::Arc;

use axum::Router;
use ensayo_common::db::DEFAULT_MAX_LOCK_WAIT_MS;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cascade;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod progress;
pub mod storage;
pub mod validation;

pub use error::{ApiError, ApiResult};

use cascade::CascadeEngine;
use progress::SqliteProgressSynchronizer;
use storage::Presigner;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Add/edit/archive with cascade
    pub engine: Arc<CascadeEngine>,
    /// Learner progress (also the engine's synchronizer)
    pub progress: Arc<SqliteProgressSynchronizer>,
    /// Upload URL signer, `None` when storage is not configured
    pub presigner: Option<Arc<Presigner>>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, presigner: Option<Presigner>) -> Self {
        Self::with_max_lock_wait(db, presigner, DEFAULT_MAX_LOCK_WAIT_MS)
    }

    /// Create application state whose writers retry lock races for `max_lock_wait_ms`
    pub fn with_max_lock_wait(
        db: SqlitePool,
        presigner: Option<Presigner>,
        max_lock_wait_ms: u64,
    ) -> Self {
        let progress = Arc::new(
            SqliteProgressSynchronizer::new(db.clone()).with_max_lock_wait(max_lock_wait_ms),
        );
        let engine = Arc::new(
            CascadeEngine::new(db.clone(), progress.clone()).with_max_lock_wait(max_lock_wait_ms),
        );
        Self {
            db,
            engine,
            progress,
            presigner: presigner.map(Arc::new),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/contentManagement", api::content_management_routes())
        .nest("/api/lessonManagement", api::lesson_management_routes())
        .nest("/api/content", api::content_routes())
        .nest("/api/users", api::user_routes())
        .nest("/api/progress", api::progress_routes())
        .nest("/api/userManagement", api::user_management_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
