//! Observability: in-process operation counters. This module never looks at
//! engine internals; the entity layer reports events into it.

use std::cell::RefCell;
use std::collections::BTreeMap;

///
/// OpKind
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
    Remove,
    Get,
    Query,
    Scan,
    BatchGet,
    BatchWrite,
}

impl OpKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Remove => "remove",
            Self::Get => "get",
            Self::Query => "query",
            Self::Scan => "scan",
            Self::BatchGet => "batch_get",
            Self::BatchWrite => "batch_write",
        }
    }
}

thread_local! {
    static COUNTS: RefCell<BTreeMap<OpKind, u64>> = RefCell::new(BTreeMap::new());
}

pub(crate) fn record(op: OpKind) {
    COUNTS.with_borrow_mut(|counts| {
        *counts.entry(op).or_insert(0) += 1;
    });
}

/// Snapshot of per-operation event counts since the last reset.
#[must_use]
pub fn report() -> BTreeMap<OpKind, u64> {
    COUNTS.with_borrow(Clone::clone)
}

pub fn reset() {
    COUNTS.with_borrow_mut(BTreeMap::clear);
}
