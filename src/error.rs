//! Errors raised while building or analysing an operation graph.

use std::fmt::Display;

use itertools::Itertools;
use thiserror::Error;

use crate::graph::OpId;

/// Structural, type and I/O failures.
///
/// Everything but the I/O variants is a contract violation in the input
/// graph: the analysis stops at the first one it meets.
#[derive(Debug, Error)]
pub enum Error {
    /// Operations that could not be ordered because they depend on each other.
    #[error("operation graph contains a cycle through {}", join(.0))]
    Cycle(Vec<OpId>),

    /// Kind with neither a built-in class nor an override.
    #[error("no noise classification registered for operation kind `{0}`")]
    MissingClassification(String),

    /// Override table entry that cannot be applied.
    #[error("invalid override for `{kind}`: {reason}")]
    InvalidOverride {
        /// Kind the override targets.
        kind: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Kind name that is neither built in nor `extern:`-prefixed.
    #[error("unknown operation kind `{0}`")]
    UnknownKind(String),

    /// Operand list length not accepted by the kind or its class.
    #[error("{op}: `{kind}` expects {expected} operand(s), got {found}")]
    OperandCount {
        /// Offending operation.
        op: OpId,
        /// Its kind.
        kind: String,
        /// Accepted count, as text.
        expected: String,
        /// Count given.
        found: usize,
    },

    /// Operand naming an operation outside the graph.
    #[error("{op}: operand {index} refers to unknown operation {target}")]
    UnknownOperation {
        /// Offending operation.
        op: OpId,
        /// Operand position.
        index: usize,
        /// Id it refers to.
        target: usize,
    },

    /// Output tag naming an operation outside the graph.
    #[error("output refers to unknown operation {0}")]
    UnknownOutput(usize),

    /// Operand whose element is encrypted where clear is required, or the reverse.
    #[error("{op}: operand {index} has type {found}, expected {expected}")]
    Type {
        /// Offending operation.
        op: OpId,
        /// Operand position.
        index: usize,
        /// Element kind required.
        expected: &'static str,
        /// Type actually found.
        found: String,
    },

    /// Operand position past the end of the operand list.
    #[error("{op}: operand index {index} out of range")]
    OperandIndex {
        /// Offending operation.
        op: OpId,
        /// Requested position.
        index: usize,
    },

    /// Clear/encrypted operand lookup on an operation of another class.
    #[error("{op}: `{kind}` is not a custom binary operation")]
    NotCustomBinary {
        /// Offending operation.
        op: OpId,
        /// Its kind.
        kind: String,
    },

    /// Integer width outside `1..=MAX_WIDTH`.
    #[error("integer width {0} outside 1..={max}", max = crate::types::MAX_WIDTH)]
    InvalidWidth(u32),

    /// Tensor whose element count does not fit in `usize`.
    #[error("tensor shape [{}] has too many elements", join(.0))]
    ShapeOverflow(Vec<usize>),

    /// Second write to the bound cache for the same operation.
    #[error("{0}: noise bound computed twice")]
    AlreadyComputed(OpId),

    /// Operand read before its bound was computed.
    #[error("{op}: bound of operand {index} ({target}) is not computed yet")]
    Unresolved {
        /// Reading operation.
        op: OpId,
        /// Operand position.
        index: usize,
        /// Operation not yet visited.
        target: OpId,
    },

    /// Clear constant that does not match its declared type.
    #[error("invalid constant: {0}")]
    InvalidConstant(String),

    /// Location string not of the form `file[:line[:column]]`.
    #[error("invalid location `{0}`")]
    Location(String),

    /// Reading a graph or config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON graph or config.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Writing the CSV report failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

fn join<T: Display>(items: &[T]) -> String {
    items.iter().join(", ")
}
