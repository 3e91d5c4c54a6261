//! Rich diagnostic error types for the noema cognitive core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the noema core.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum NoemaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(noema::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(noema::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(noema::store::serde),
        help(
            "Failed to serialize or deserialize a stored row. This usually means \
             the stored data format has changed between versions."
        )
    )]
    Serialization { message: String },

    #[error("compression error: {message}")]
    #[diagnostic(
        code(noema::store::compress),
        help("The stored content could not be compressed or decompressed.")
    )]
    Compression { message: String },
}

// ---------------------------------------------------------------------------
// Memory errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MemoryError {
    #[error("vector index error: {message}")]
    #[diagnostic(
        code(noema::memory::index),
        help(
            "The similarity index failed. Search falls back to a bounded keyword \
             scan automatically; this error only surfaces on the write path."
        )
    )]
    Index { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Skill errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SkillError {
    #[error("skill not found: \"{name}\"")]
    #[diagnostic(
        code(noema::skill::not_found),
        help("No skill with this name is registered. Learn it first with `learn_skill`.")
    )]
    NotFound { name: String },

    #[error("unknown skill category: \"{category}\"")]
    #[diagnostic(
        code(noema::skill::category),
        help(
            "Valid categories are: coding, research, communication, analysis, \
             automation, integration."
        )
    )]
    UnknownCategory { category: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("edge endpoint does not exist: node {node_id}")]
    #[diagnostic(
        code(noema::graph::missing_endpoint),
        help(
            "Both endpoints of an edge must be existing nodes. \
             Create the node with `add_node` first; the edge was not inserted."
        )
    )]
    MissingEndpoint { node_id: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Reasoner errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReasonError {
    #[error("reasoner is not available at {url}")]
    #[diagnostic(
        code(noema::reason::unavailable),
        help("Start Ollama with `ollama serve`, or inject a different Reasoner.")
    )]
    Unavailable { url: String },

    #[error("reasoner request failed: {message}")]
    #[diagnostic(
        code(noema::reason::request_failed),
        help("Check that the reasoning service is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse reasoner response: {message}")]
    #[diagnostic(
        code(noema::reason::parse_error),
        help(
            "The model returned an unexpected response format. Candidate-producing \
             callers treat this as zero candidates; only direct callers see it."
        )
    )]
    ParseError { message: String },
}

/// Convenience alias for functions returning noema results.
pub type NoemaResult<T> = std::result::Result<T, NoemaError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Result type for skill operations.
pub type SkillResult<T> = std::result::Result<T, SkillError>;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for reasoner operations.
pub type ReasonResult<T> = std::result::Result<T, ReasonError>;
