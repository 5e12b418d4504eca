//! Learner accounts, module enrollments and progress reads

use ensayo_common::db::{Module, Progress, User};
use ensayo_common::uuid_utils::{self, get_uuid};
use ensayo_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::SearchTerm;

pub async fn create_user(pool: &SqlitePool, username: &str, email: Option<&str>) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::Validation("username is required".to_string()));
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(pool)
        .await?;
    if taken {
        return Err(Error::Validation(format!("username '{}' is already taken", username)));
    }

    let user = User {
        id: uuid_utils::generate(),
        username: username.to_string(),
        email: email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
    };

    sqlx::query("INSERT INTO users (id, username, email) VALUES (?, ?, ?)")
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .execute(pool)
        .await?;

    info!(user_id = %user.id, "Created learner {}", user.username);
    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<User> {
    let row = sqlx::query("SELECT id, username, email FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    User::from_row(&row)
}

pub async fn list_users(pool: &SqlitePool, search: Option<&str>) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT id, username, email FROM users ORDER BY created_at, rowid")
        .fetch_all(pool)
        .await?;

    let users = rows.iter().map(User::from_row).collect::<Result<Vec<_>>>()?;
    Ok(match SearchTerm::parse(search) {
        Some(term) => users.into_iter().filter(|u| term.matches(&u.username)).collect(),
        None => users,
    })
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Learners enrolled in at least one module
pub async fn count_enrolled_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM enrollments")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Enroll a learner in an active module
///
/// Enrolling twice is a no-op. Returns the learner's enrolled module ids.
pub async fn enroll(pool: &SqlitePool, user_id: Uuid, module_id: Uuid) -> Result<Vec<Uuid>> {
    get_user(pool, user_id).await?;

    let archived: Option<bool> = sqlx::query_scalar("SELECT archived FROM modules WHERE id = ?")
        .bind(module_id.to_string())
        .fetch_optional(pool)
        .await?;
    match archived {
        None => return Err(Error::not_found("module", module_id)),
        Some(true) => {
            return Err(Error::Validation(format!(
                "module {} is archived and cannot be enrolled in",
                module_id
            )))
        }
        Some(false) => {}
    }

    sqlx::query("INSERT OR IGNORE INTO enrollments (user_id, module_id) VALUES (?, ?)")
        .bind(user_id.to_string())
        .bind(module_id.to_string())
        .execute(pool)
        .await?;

    enrolled_module_ids(pool, user_id).await
}

pub async fn enrolled_module_ids(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT module_id FROM enrollments WHERE user_id = ? ORDER BY enrolled_at, rowid",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(|r| get_uuid(r, "module_id")).collect()
}

pub async fn enrolled_modules(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Module>> {
    let rows = sqlx::query(
        "SELECT m.* FROM modules m
         JOIN enrollments e ON e.module_id = m.id
         WHERE e.user_id = ?
         ORDER BY e.enrolled_at, e.rowid",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(Module::from_row).collect()
}

/// Enrollment count for one active module
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEnrollees {
    pub module_id: Uuid,
    pub title: String,
    pub course_id: Uuid,
    pub enrollees: i64,
}

pub async fn module_enrollee_counts(pool: &SqlitePool) -> Result<Vec<ModuleEnrollees>> {
    let rows = sqlx::query(
        "SELECT m.id, m.title, m.course_id, COUNT(e.user_id) AS enrollees
         FROM modules m
         LEFT JOIN enrollments e ON e.module_id = m.id
         WHERE m.archived = 0
         GROUP BY m.id
         ORDER BY m.created_at, m.rowid",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ModuleEnrollees> {
            Ok(ModuleEnrollees {
                module_id: get_uuid(row, "id")?,
                title: row.try_get("title")?,
                course_id: get_uuid(row, "course_id")?,
                enrollees: row.try_get("enrollees")?,
            })
        })
        .collect()
}

pub async fn list_progress(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Progress>> {
    get_user(pool, user_id).await?;
    let rows = sqlx::query(
        "SELECT user_id, unit_id, module_id, completed_groups, completion
         FROM progress WHERE user_id = ? ORDER BY updated_at, rowid",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(Progress::from_row).collect()
}
