//! Compiler-managed metadata attributes carried on every persisted item.

use crate::value::{Document, Value};

/// Schema version tag. Stamped at the record's current version, never the
/// version it was created at.
pub const VERSION_ATTR: &str = "_v";

/// Revision counter. Starts at 0 on insert, +1 on every successful update.
pub const REVISION_ATTR: &str = "_i";

/// Soft-delete flag. Set true by delete, never physically removed unless the
/// store item is hard-deleted.
pub const TOMBSTONE_ATTR: &str = "_d";

/// Entity type tag.
pub const ENTITY_ATTR: &str = "_e";

/// All metadata attribute names, for shape validators that must skip them.
pub const ALL: [&str; 4] = [VERSION_ATTR, REVISION_ATTR, TOMBSTONE_ATTR, ENTITY_ATTR];

#[must_use]
pub fn is_meta_attr(name: &str) -> bool {
    ALL.contains(&name)
}

/// Read the stored schema version tag, if present and numeric.
#[must_use]
pub fn read_version(doc: &Document) -> Option<u32> {
    doc.get(VERSION_ATTR)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

/// Read the stored revision counter, if present and numeric.
#[must_use]
pub fn read_revision(doc: &Document) -> Option<u64> {
    doc.get(REVISION_ATTR).and_then(Value::as_u64)
}

pub fn stamp_version(doc: &mut Document, version: u32) {
    doc.insert(VERSION_ATTR.to_string(), Value::from(u64::from(version)));
}
