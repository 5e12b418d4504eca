//! Server-side checks run before any cascade write

use ensayo_common::{Error, Result};
use sqlx::SqliteConnection;

use crate::db::nodes::{load_header, NodeHeader};
use crate::hierarchy::{Ancestry, NodeInput, NodeKind};

/// Required own fields: a non-blank title (name for tools)
pub fn validate_fields(kind: NodeKind, input: &NodeInput) -> Result<()> {
    let present = input
        .display_name(kind)
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false);
    if !present {
        return Err(Error::Validation(format!(
            "{} is required for a {}",
            kind.title_column(),
            kind.label()
        )));
    }

    if matches!(input.sequence_number, Some(seq) if seq < 0) {
        return Err(Error::Validation(
            "sequenceNumber must not be negative".to_string(),
        ));
    }

    Ok(())
}

/// Check the supplied ancestor references against the stored hierarchy
///
/// Every ancestor id must be present, the parent must exist, and the
/// parent's own ancestry must agree with the remaining references.
/// Returns the parent's header (`None` for course sections).
pub async fn validate_ancestry(
    conn: &mut SqliteConnection,
    kind: NodeKind,
    ancestry: &Ancestry,
) -> Result<Option<NodeHeader>> {
    let required = ancestry.require(kind)?;
    let Some(parent_kind) = kind.parent() else {
        return Ok(None);
    };
    let Some(parent_id) = ancestry.get(parent_kind) else {
        return Err(Error::Validation(format!(
            "{} is required for a {}",
            parent_kind.id_field(),
            kind.label()
        )));
    };

    let parent = load_header(conn, parent_kind, parent_id)
        .await?
        .ok_or_else(|| {
            Error::Validation(format!(
                "{} {} does not exist",
                parent_kind.label(),
                parent_id
            ))
        })?;

    for (ancestor, id) in required {
        if ancestor == parent_kind {
            continue;
        }
        if parent.ancestry.get(ancestor) != Some(id) {
            return Err(Error::Validation(format!(
                "{} {} does not belong to {} {}",
                parent_kind.label(),
                parent_id,
                ancestor.label(),
                id
            )));
        }
    }

    Ok(Some(parent))
}

/// An active node may not sit under an archived parent
pub fn validate_archived(kind: NodeKind, archived: bool, parent: Option<&NodeHeader>) -> Result<()> {
    match parent {
        Some(p) if p.archived && !archived => Err(Error::Validation(format!(
            "cannot keep {} active under archived {} {}",
            kind.label(),
            p.kind.label(),
            p.id
        ))),
        _ => Ok(()),
    }
}
