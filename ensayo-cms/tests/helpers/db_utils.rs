//! Database Test Utilities
//!
//! Raw reads used to assert on stored state without going through the
//! code under test.

use ensayo_cms::hierarchy::NodeKind;
use ensayo_common::db::{init_database, MirroredTool, Progress};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Create a temporary database with the full schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Should create temp dir");
    let db_path = temp_dir.path().join("test_ensayo.db");
    let pool = init_database(&db_path)
        .await
        .expect("Should initialize test database");
    (temp_dir, pool)
}

/// Stored `archived` flag of one node
pub async fn archived_flag(pool: &SqlitePool, kind: NodeKind, id: Uuid) -> bool {
    let sql = format!("SELECT archived FROM {} WHERE id = ?", kind.table());
    sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .expect("Node should exist")
}

/// Stored ancestor reference column of one node
pub async fn column_id(pool: &SqlitePool, kind: NodeKind, id: Uuid, column: NodeKind) -> Uuid {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", column.id_column(), kind.table());
    let raw: String = sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .expect("Node should exist");
    Uuid::parse_str(&raw).expect("Stored id should parse")
}

/// The embedded `tools` mirror of a tool group
pub async fn mirror_of(pool: &SqlitePool, group_id: Uuid) -> Vec<MirroredTool> {
    let tools: Json<Vec<MirroredTool>> =
        sqlx::query_scalar("SELECT tools FROM tool_groups WHERE id = ?")
            .bind(group_id.to_string())
            .fetch_one(pool)
            .await
            .expect("Tool group should exist");
    tools.0
}

/// A learner's progress row for one unit, if any
pub async fn progress_for(pool: &SqlitePool, user_id: Uuid, unit_id: Uuid) -> Option<Progress> {
    let row = sqlx::query("SELECT * FROM progress WHERE user_id = ? AND unit_id = ?")
        .bind(user_id.to_string())
        .bind(unit_id.to_string())
        .fetch_optional(pool)
        .await
        .expect("Progress query should succeed")?;
    Some(Progress::from_row(&row).expect("Progress row should decode"))
}
