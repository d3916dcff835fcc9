//! Expression compilation: structured predicate and update trees lowered to
//! the store's expression strings plus name/value placeholder maps.
//!
//! All clauses of one request (key condition, filter, update, condition,
//! projection) compile through a single [`Aliases`] allocator so placeholders
//! never collide across clauses.

mod aliases;
mod condition;
mod key;
mod update;


use thiserror::Error as ThisError;

pub use aliases::Aliases;
pub use condition::{CompareOp, Condition};
pub use key::{KeyCondition, SortCondition};
pub use update::Update;

///
/// ExprError
///
/// Structural failures while compiling an expression tree. These are caller
/// contract violations, caught before anything reaches the wire.
///

#[derive(Debug, ThisError)]
pub enum ExprError {
    #[error("boolean group has no operands")]
    EmptyBooleanGroup,

    #[error("update expression has no operations")]
    EmptyUpdate,

    #[error("begins_with requires a string value, got {kind}")]
    BeginsWithNotText { kind: crate::value::ValueKind },

    #[error("projection has no attributes")]
    EmptyProjection,
}

/// Compile a projection attribute allow-list, interning names through the
/// shared allocator.
pub fn compile_projection(attrs: &[String], aliases: &mut Aliases) -> Result<String, ExprError> {
    if attrs.is_empty() {
        return Err(ExprError::EmptyProjection);
    }

    let parts: Vec<String> = attrs.iter().map(|attr| aliases.name(attr)).collect();

    Ok(parts.join(", "))
}
