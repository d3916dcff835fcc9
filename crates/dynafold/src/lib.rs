//! Dynafold: a schema-first entity engine over a DynamoDB-style item store.
//!
//! ## Crate layout
//! - `core::value`: the attribute value model and wire codec.
//! - `core::expr`: condition/key/update expression compilers.
//! - `core::schema`: versioned shapes with forward migrations.
//! - `core::index`: declarative index-key derivation.
//! - `core::table`: the raw operation surface over one table.
//! - `core::entity`: the engine composing all of the above.
//!
//! The `prelude` module mirrors the surface used by application code.

pub use dynafold_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::error::Error;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::prelude::*;
}
