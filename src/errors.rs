//! Typed error hierarchy for the lattice orchestration core.
//!
//! Each subsystem gets its own enum:
//! - `GenerationError` — generation client transport and blocking failures
//! - `ParseError` — structured response decoding failures
//! - `TemplateError` — prompt template lookup and formatting failures
//! - `ConfigError` — construction-time configuration validation failures
//! - `ReasoningError` — reasoning tree node decision failures
//! - `CouncilError` — council critique pipeline failures (caught internally)
//! - `QaValidationError` — checklist QA validation failures
//! - `DecompositionError` — top-level wrapper surfacing from the engine

use thiserror::Error;

use crate::reasoning::{NodeStage, NodeType};

/// Errors from the generation client boundary.
///
/// Both variants are retryable by the caller; the client itself never
/// retries. Retry policy belongs to the orchestration layer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The underlying transport failed (network, auth, provider error).
    #[error("generation request failed: {0}")]
    Failed(#[source] anyhow::Error),

    /// The service responded but returned no usable text.
    #[error("generation returned no usable text{}", .reason.as_deref().map(|r| format!(" (blocked: {r})")).unwrap_or_default())]
    EmptyOrBlocked { reason: Option<String> },
}

/// Errors from decoding a structured field out of raw generation output.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The cleaned text did not decode as a structured document.
    #[error("failed to decode structured response: {source}; excerpt: {excerpt}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        /// Truncated copy of the raw response for diagnostics.
        excerpt: String,
    },

    /// The expected top-level key was absent.
    #[error("expected key '{field}' not found in response (available keys: {available:?})")]
    MissingField {
        field: String,
        available: Vec<String>,
    },

    /// The value under the key decoded but had the wrong shape.
    #[error("value under '{field}' has the wrong shape: expected {expected}")]
    InvalidShape {
        field: String,
        expected: &'static str,
    },
}

/// Errors from the prompt template provider.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("prompt template '{name}' not found")]
    NotFound { name: String },

    #[error("missing required argument '{argument}' for prompt template '{template}'")]
    MissingArgument { template: String, argument: String },
}

/// Configuration validation failures, raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Errors from reasoning tree operations.
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// Alternative generation produced an empty candidate set.
    #[error("no {node_type} alternatives produced")]
    NoAlternatives { node_type: NodeType },

    /// The evaluation array does not align with the alternative array.
    #[error("evaluation count ({evaluations}) does not match alternative count ({alternatives})")]
    EvaluationCountMismatch {
        alternatives: usize,
        evaluations: usize,
    },

    /// A stage of the node decision state machine failed. There are no
    /// retries between stages; the node decision is atomic to the caller.
    #[error("{node_type} node decision failed while {stage}: {source}")]
    NodeDecisionFailed {
        node_type: NodeType,
        stage: NodeStage,
        #[source]
        source: Box<ReasoningError>,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Errors inside the council critique pipeline.
///
/// These never escape `Council::review_and_refine` — any failure there is
/// converted into returning the original steps unchanged.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// A revised step failed structural validation.
    #[error("revised step {index} is invalid: {reason}")]
    InvalidStep { index: usize, reason: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Errors from QA validation of a finished checklist.
#[derive(Debug, Error)]
pub enum QaValidationError {
    #[error("validation results missing required field '{field}'")]
    MissingResultField { field: &'static str },

    #[error("validation score is not numeric")]
    InvalidScore,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Top-level error surfacing from `ChecklistEngine::generate_checklist`.
///
/// The caller sees either a complete checklist or exactly one of these;
/// there is no partial result.
#[derive(Debug, Error)]
pub enum DecompositionError {
    /// The selected child list for a node could not be interpreted as
    /// phases or tasks.
    #[error("selected {node_type} children could not be interpreted: {source}")]
    InvalidChildren {
        node_type: NodeType,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
