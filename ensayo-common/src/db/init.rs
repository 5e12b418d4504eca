//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date on
//! every start. All statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// SQLite busy timeout applied to every connection
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets the client-facing readers proceed while a cascade writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    create_schema(&pool).await?;

    // Versioned migrations run after CREATE TABLE IF NOT EXISTS
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by the content service
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    // Content hierarchy, root first so REFERENCES targets exist
    create_course_sections_table(pool).await?;
    create_courses_table(pool).await?;
    create_modules_table(pool).await?;
    create_units_table(pool).await?;
    create_tool_groups_table(pool).await?;
    create_practical_groups_table(pool).await?;
    create_tools_table(pool).await?;

    // Learner data
    create_users_table(pool).await?;
    create_enrollments_table(pool).await?;
    create_progress_table(pool).await?;

    create_reference_indexes(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_course_sections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_sections (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            course_id TEXT NOT NULL REFERENCES courses(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_units_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            course_id TEXT NOT NULL REFERENCES courses(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            sequence_number INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the tool_groups table
///
/// `tools` is the JSON mirror of the group's Tool rows.
async fn create_tool_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tool_groups (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            course_id TEXT NOT NULL REFERENCES courses(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            unit_id TEXT NOT NULL REFERENCES units(id),
            tools TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_practical_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS practical_groups (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image TEXT,
            simulation_path TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            course_id TEXT NOT NULL REFERENCES courses(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            unit_id TEXT NOT NULL REFERENCES units(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tools_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tools (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            model_path TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            course_section_id TEXT NOT NULL REFERENCES course_sections(id),
            course_id TEXT NOT NULL REFERENCES courses(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            unit_id TEXT NOT NULL REFERENCES units(id),
            tool_group_id TEXT NOT NULL REFERENCES tool_groups(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the enrollments link table (a learner's enrolled modules)
async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            user_id TEXT NOT NULL REFERENCES users(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            enrolled_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, module_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the progress table
///
/// One row per learner and unit. `completed_groups` is a JSON array of group
/// ids; `completion` is the fraction of the unit's active groups completed.
async fn create_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress (
            user_id TEXT NOT NULL REFERENCES users(id),
            unit_id TEXT NOT NULL REFERENCES units(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            completed_groups TEXT NOT NULL DEFAULT '[]',
            completion REAL NOT NULL DEFAULT 0.0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, unit_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Indexes on every ancestor-reference column
///
/// Cascade updates filter descendants by these columns.
async fn create_reference_indexes(pool: &SqlitePool) -> Result<()> {
    const INDEXES: &[(&str, &str)] = &[
        ("courses", "course_section_id"),
        ("modules", "course_section_id"),
        ("modules", "course_id"),
        ("units", "course_section_id"),
        ("units", "course_id"),
        ("units", "module_id"),
        ("tool_groups", "course_section_id"),
        ("tool_groups", "course_id"),
        ("tool_groups", "module_id"),
        ("tool_groups", "unit_id"),
        ("practical_groups", "course_section_id"),
        ("practical_groups", "course_id"),
        ("practical_groups", "module_id"),
        ("practical_groups", "unit_id"),
        ("tools", "course_section_id"),
        ("tools", "course_id"),
        ("tools", "module_id"),
        ("tools", "unit_id"),
        ("tools", "tool_group_id"),
        ("progress", "module_id"),
        ("enrollments", "module_id"),
    ];

    for (table, column) in INDEXES {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})",
            table = table,
            column = column
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}
