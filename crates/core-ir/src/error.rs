//! Compiler error kinds.
//!
//! Errors are raised locally and propagate to the top-level driver; within a
//! pass, recoverable situations ("no absorption possible") are returned as
//! plain status values, never as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed input graph or unknown attribute value.
    #[error("parse error: {0}")]
    Parse(String),

    /// A node-level invariant was violated.  Carries the offending node's
    /// fully qualified name.
    #[error("validation failed at `{node}`: {msg}")]
    Validation { node: String, msg: String },

    /// A pass-internal invariant was violated (dangling arc, ID collision,
    /// malformed FIFO during absorption, ...).
    #[error("transform error: {0}")]
    Transform(String),

    /// Cycle in the residual graph, or an arc violating the post-schedule
    /// ordering check.
    #[error("schedule error: {0}")]
    Schedule(String),

    /// Partition-graph cycle with zero total initial conditions.
    #[error("inter-thread deadlock: {0}")]
    Deadlock(String),

    /// An exporter or dumper could not write its artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<core_types::TypeParseError> for CompileError {
    fn from(e: core_types::TypeParseError) -> Self {
        CompileError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
