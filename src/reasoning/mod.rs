//! Reasoning tree: explore alternatives at each decomposition node, score
//! them against independent criteria, and select a winner with a
//! justification.
//!
//! The flow per node is a fixed three-stage machine — generating,
//! evaluating, selecting — with no retries between stages. Any stage
//! failure surfaces as a node-level failure; a node decision is atomic
//! from the caller's perspective.

pub mod alternatives;
pub mod evaluator;
pub mod selector;
pub mod tree;

pub use alternatives::AlternativeGenerator;
pub use evaluator::{AggregatedEvaluation, Evaluation, MultiCriteriaEvaluator, aggregate};
pub use selector::{Selection, Selector};
pub use tree::{NodeDecision, ReasoningTree};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One complete competing proposal for a node's children: an ordered list
/// of phase-like or task-like entities, kept untyped until selected.
pub type Alternative = Vec<Value>;

/// Justification used whenever exploration is disabled.
pub const DISABLED_JUSTIFICATION: &str = "Default selection (exploration disabled)";

/// Which level of the hierarchy a node decision produces children for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Phase,
    Task,
}

impl NodeType {
    /// Singular form, used in template names and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Task => "task",
        }
    }

    /// The top-level key a direct generation responds under.
    pub fn plural_key(&self) -> &'static str {
        match self {
            Self::Phase => "phases",
            Self::Task => "tasks",
        }
    }

    /// Template for direct (non-exploratory) generation.
    pub fn generation_template(&self) -> &'static str {
        match self {
            Self::Phase => "generate_phases",
            Self::Task => "generate_tasks",
        }
    }

    /// Template for alternative-set generation.
    pub fn alternatives_template(&self) -> &'static str {
        match self {
            Self::Phase => "generate_phase_alternatives",
            Self::Task => "generate_task_alternatives",
        }
    }

    /// Template for scoring an alternative against one criterion.
    pub fn evaluation_template(&self, criterion: &str) -> String {
        format!("evaluate_{}_{}", self.as_str(), criterion)
    }

    /// Template for justifying the selected alternative.
    pub fn justify_template(&self) -> &'static str {
        match self {
            Self::Phase => "justify_phase_selection",
            Self::Task => "justify_task_selection",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage of the node decision machine a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStage {
    Generating,
    Evaluating,
    Selecting,
}

impl std::fmt::Display for NodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Generating => "generating",
            Self::Evaluating => "evaluating",
            Self::Selecting => "selecting",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_template_names() {
        assert_eq!(NodeType::Phase.generation_template(), "generate_phases");
        assert_eq!(NodeType::Task.alternatives_template(), "generate_task_alternatives");
        assert_eq!(
            NodeType::Phase.evaluation_template("coherence"),
            "evaluate_phase_coherence"
        );
        assert_eq!(NodeType::Task.justify_template(), "justify_task_selection");
    }

    #[test]
    fn node_type_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&NodeType::Phase).unwrap(), r#""phase""#);
    }

    #[test]
    fn node_stage_displays_lowercase() {
        assert_eq!(NodeStage::Generating.to_string(), "generating");
        assert_eq!(NodeStage::Selecting.to_string(), "selecting");
    }
}
