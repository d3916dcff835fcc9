use crate::{
    expr::ExprError,
    index::IndexError,
    schema::{ChainError, SchemaError},
    table::WireError,
    value::CodecError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-wide taxonomy. Every operation returns one of these to the caller;
/// nothing is swallowed and nothing is retried internally. Optimistic
/// concurrency losers see `NoItemToUpdate`; throttled callers see
/// `Wire(Throttling)` and retry above this layer.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// Insert condition failed: the primary key already exists.
    #[error("item already exists")]
    ItemAlreadyExists,

    /// Update condition failed: missing item or stale revision. The store's
    /// conditional-write failure carries no discriminant between the two
    /// causes; distinguishing them would cost a follow-up read, which this
    /// layer deliberately does not issue.
    #[error("no item to update (missing item or stale revision)")]
    NoItemToUpdate,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

///
/// RequestError
///
/// Request-shape violations caught before anything is dispatched.
///

#[derive(Debug, ThisError)]
pub enum RequestError {
    #[error("batch get accepts at most {max} keys, got {count}")]
    BatchGetTooLarge { count: usize, max: usize },

    #[error("batch write accepts at most {max} requests, got {count}")]
    BatchWriteTooLarge { count: usize, max: usize },

    #[error("batch write requires at least one request")]
    EmptyBatchWrite,

    #[error("entity declares no index named {name:?}")]
    UnknownIndex { name: String },

    #[error("index {index:?} has no sort key, but the query supplies a sort bound")]
    NoSortKey { index: String },
}
