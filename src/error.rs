//! Error types for the core retrieval engine.

use thiserror::Error;

/// Errors that can occur during index construction, mutation, search, or
/// persistence.
///
/// A failed mutating call never leaves the target index in a state
/// observably different from before the call.
#[derive(Debug, Error)]
pub enum Error {
    /// A required parameter was missing (e.g. an empty query, a null
    /// config field that must be set explicitly).
    #[error("required input missing: {0}")]
    NullInput(&'static str),

    /// A supplied argument is structurally invalid: dimension mismatch,
    /// `token_id >= vocab_size`, `count > max_nonzeros`, `k == 0`, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `delete`/`update` referenced an id that does not exist or is
    /// already deleted.
    #[error("not found: id {id}")]
    NotFound {
        /// The id that could not be located.
        id: u64,
    },

    /// Allocation failed. The operation is guaranteed to have left the
    /// index unmodified.
    #[error("out of memory")]
    OutOfMemory,

    /// The file could not be opened, or a read/write was short.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A loaded file failed validation: bad magic, version mismatch, or
    /// an internal field inconsistent with the index's own invariants
    /// (e.g. `token_id >= vocab_size`).
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
