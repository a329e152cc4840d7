use thiserror::Error;

use crate::model::FlowId;

/// Failure that aborts processing of one flow. Sibling flows are unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("malformed sample in flow {flow}: {reason}")]
    MalformedSample { flow: FlowId, reason: String },
}

/// Failure of the batch-level alignment step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignError {
    #[error("flow {flow} has no parsable start timestamp; cannot establish a common origin")]
    MissingTimestamp { flow: FlowId },
    #[error("series {label} has {actual} values but the grid has {expected} points")]
    GridMismatch { label: String, expected: usize, actual: usize },
}

/// Non-fatal data problems. The offending point (or the whole flow, for
/// `InsufficientData`) is dropped and processing continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("counter regression in flow {flow} at sample {index}")]
    CounterRegression { flow: FlowId, index: usize },
    #[error("time regression in flow {flow} at sample {index}")]
    TimeRegression { flow: FlowId, index: usize },
    #[error("flow {flow} has fewer than 2 points; contributing zero")]
    InsufficientData { flow: FlowId },
}
