//! Tests for database initialization on first run and reopen

use ensayo_common::db::init::init_database;
use tempfile::TempDir;

const TABLES: &[&str] = &[
    "schema_version",
    "course_sections",
    "courses",
    "modules",
    "units",
    "tool_groups",
    "practical_groups",
    "tools",
    "users",
    "enrollments",
    "progress",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sub").join("ensayo.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ensayo.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO course_sections (id, title) VALUES ('cs-1', 'Workshop')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.as_ref().err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_sections")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Reopen must preserve existing rows");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("ensayo.db")).await.unwrap();

    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "Table {} should exist", table);
    }
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("ensayo.db")).await.unwrap();

    let version: i32 =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(version, ensayo_common::db::CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("ensayo.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO courses (id, title, course_section_id) VALUES ('c-1', 'Orphan', 'missing')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "Course without a section must be rejected");
}
