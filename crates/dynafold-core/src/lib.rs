//! Core runtime for Dynafold: the value codec, expression compilers, schema
//! evolution, index derivation, and the table/entity engines, with the
//! ergonomics exported via the `prelude`.

// public exports are one module level down
pub mod entity;
pub mod error;
pub mod expr;
pub mod index;
pub mod meta;
pub mod obs;
pub mod schema;
pub mod table;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Maximum keys accepted by one grouped read.
///
/// The store rejects larger batches at the wire; enforcing the same limit
/// here fails the request before anything is dispatched.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Maximum put/delete elements accepted by one grouped write.
pub const MAX_BATCH_WRITE_REQUESTS: usize = 25;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No transports, compilers, or codec internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        entity::{Entity, EntityDef, EntityQuery, EntityScan, SortBound},
        error::Error,
        expr::{Condition, Update},
        index::{IndexDef, KeySlot},
        schema::{FieldDef, SchemaChain, Shape, VersionDef},
        table::Table,
        value::{Document, Value},
    };
}
