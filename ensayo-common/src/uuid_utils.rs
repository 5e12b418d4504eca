//! UUID utilities
//!
//! SQLite stores every identifier as hyphenated TEXT; these helpers keep the
//! conversion in one place.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", s, e)))
}

/// Read a required UUID column
pub fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    parse(&raw)
}

/// Read a nullable UUID column
pub fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_generated() {
        let id = generate();
        assert_eq!(parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse("not-a-uuid"), Err(Error::Internal(_))));
    }
}
