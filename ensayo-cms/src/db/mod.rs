//! Query layer over the content hierarchy and learner tables

pub mod learners;
pub mod nodes;

use crate::hierarchy::SqlValue;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

/// Untyped SQLite statement
pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind values in order onto a dynamically built statement
///
/// Ids are stored as hyphenated TEXT.
pub(crate) fn bind_values<'q>(mut query: SqliteQuery<'q>, values: Vec<SqlValue>) -> SqliteQuery<'q> {
    for value in values {
        query = match value {
            SqlValue::Text(text) => query.bind(text),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Id(id) => query.bind(id.to_string()),
        };
    }
    query
}

/// Case-insensitive substring filter
///
/// SQLite's `lower()` only folds ASCII, so matching happens on decoded rows
/// with Unicode lowercasing on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// `None` for a missing or blank query
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.to_lowercase()))
    }

    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.0)
    }
}

/// `?, ?, ?` with `n` placeholders
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
