//! Database models
//!
//! One struct per table. JSON field names are camelCase to match the admin
//! and client front-ends.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::uuid_utils::get_uuid;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSection {
    pub id: Uuid,
    pub title: String,
    pub archived: bool,
}

impl CourseSection {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            archived: row.try_get("archived")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
}

impl Course {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
    pub course_id: Uuid,
}

impl Module {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
            course_id: get_uuid(row, "course_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub sequence_number: i64,
}

impl Unit {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
            course_id: get_uuid(row, "course_id")?,
            module_id: get_uuid(row, "module_id")?,
            sequence_number: row.try_get("sequence_number")?,
        })
    }
}

/// Denormalized copy of a Tool embedded in its ToolGroup
///
/// Never authoritative: the `tools` table is the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredTool {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    pub archived: bool,
}

impl From<&Tool> for MirroredTool {
    fn from(tool: &Tool) -> Self {
        Self {
            id: tool.id,
            name: tool.name.clone(),
            description: tool.description.clone(),
            model_path: tool.model_path.clone(),
            archived: tool.archived,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolGroup {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub unit_id: Uuid,
    pub tools: Vec<MirroredTool>,
}

impl ToolGroup {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let tools: sqlx::types::Json<Vec<MirroredTool>> = row.try_get("tools")?;
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
            course_id: get_uuid(row, "course_id")?,
            module_id: get_uuid(row, "module_id")?,
            unit_id: get_uuid(row, "unit_id")?,
            tools: tools.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticalGroup {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub simulation_path: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub unit_id: Uuid,
}

impl PracticalGroup {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            simulation_path: row.try_get("simulation_path")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
            course_id: get_uuid(row, "course_id")?,
            module_id: get_uuid(row, "module_id")?,
            unit_id: get_uuid(row, "unit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub model_path: Option<String>,
    pub archived: bool,
    pub course_section_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub unit_id: Uuid,
    pub tool_group_id: Uuid,
}

impl Tool {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            model_path: row.try_get("model_path")?,
            archived: row.try_get("archived")?,
            course_section_id: get_uuid(row, "course_section_id")?,
            course_id: get_uuid(row, "course_id")?,
            module_id: get_uuid(row, "module_id")?,
            unit_id: get_uuid(row, "unit_id")?,
            tool_group_id: get_uuid(row, "tool_group_id")?,
        })
    }
}

/// Learner account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
        })
    }
}

/// A learner's completion record for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub module_id: Uuid,
    pub completed_groups: Vec<Uuid>,
    pub completion: f64,
}

impl Progress {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let completed: sqlx::types::Json<Vec<Uuid>> = row.try_get("completed_groups")?;
        Ok(Self {
            user_id: get_uuid(row, "user_id")?,
            unit_id: get_uuid(row, "unit_id")?,
            module_id: get_uuid(row, "module_id")?,
            completed_groups: completed.0,
            completion: row.try_get("completion")?,
        })
    }
}
