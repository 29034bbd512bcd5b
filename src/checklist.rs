//! The hierarchical checklist data model.
//!
//! A checklist is goal → phases → tasks → steps, plus a parallel audit
//! trail of [`ReasoningRecord`]s describing how each level's children were
//! chosen. The tree is built once by the engine and immutable afterward;
//! only the council may later revise leaf steps in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reasoning::{AggregatedEvaluation, Alternative};

/// A terminal leaf of the checklist: one executable instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within its task. Assigned as `phase{i}_task{j}_step{k}` when
    /// the generation omitted one.
    #[serde(default)]
    pub step_id: String,
    /// The instruction text. Backfilled from `description` or a
    /// synthesized default when absent.
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One task within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningRecord>,
}

/// One phase of the checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Audit trail for how this phase's tasks were chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningRecord>,
}

/// Audit trail for one node decision: what was considered, how it scored,
/// and why the winner won. Never consulted for control flow afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningRecord {
    pub alternatives: Vec<Alternative>,
    pub evaluations: Vec<AggregatedEvaluation>,
    pub justification: String,
}

/// Metadata carried alongside the tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistMetadata {
    /// The caller-supplied context, verbatim.
    pub context: Value,
    /// RFC3339 timestamp of assembly.
    pub generated_at: String,
    /// Reasoning records keyed by node path, e.g. `phases` for the root
    /// decision and `phase2.tasks` for the third phase's task decision.
    pub reasoning: BTreeMap<String, ReasoningRecord>,
}

/// The root output of a decomposition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub goal: String,
    pub phases: Vec<Phase>,
    pub metadata: ChecklistMetadata,
}

impl Checklist {
    /// Create an empty checklist for a goal.
    pub fn new(goal: &str, context: Value) -> Self {
        Self {
            goal: goal.to_string(),
            phases: Vec::new(),
            metadata: ChecklistMetadata {
                context,
                generated_at: String::new(),
                reasoning: BTreeMap::new(),
            },
        }
    }

    /// Total number of steps across every task.
    pub fn step_count(&self) -> usize {
        self.phases
            .iter()
            .flat_map(|p| p.tasks.iter())
            .map(|t| t.steps.len())
            .sum()
    }
}

/// Fill in missing `step_id` and `prompt` fields deterministically.
///
/// `step_id` becomes `phase{i}_task{j}_step{k}`; `prompt` falls back to
/// the step's `description`, then to a synthesized default naming the
/// task. Calling this twice on an already-backfilled list is a no-op.
pub fn backfill_steps(steps: &mut [Step], phase_idx: usize, task_idx: usize, task_name: &str) {
    for (i, step) in steps.iter_mut().enumerate() {
        if step.step_id.is_empty() {
            step.step_id = format!("phase{phase_idx}_task{task_idx}_step{i}");
        }
        if step.prompt.is_empty() {
            step.prompt = match &step.description {
                Some(description) if !description.is_empty() => description.clone(),
                _ => format!("Implement step {} for task '{}'", i + 1, task_name),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bare_step() -> Step {
        Step {
            step_id: String::new(),
            prompt: String::new(),
            description: None,
        }
    }

    #[test]
    fn backfill_assigns_deterministic_ids() {
        let mut steps = vec![bare_step(), bare_step()];
        backfill_steps(&mut steps, 2, 1, "wire the parser");

        assert_eq!(steps[0].step_id, "phase2_task1_step0");
        assert_eq!(steps[1].step_id, "phase2_task1_step1");
    }

    #[test]
    fn backfill_prompt_falls_back_to_description_then_default() {
        let mut steps = vec![
            Step {
                step_id: String::new(),
                prompt: String::new(),
                description: Some("read the config".to_string()),
            },
            bare_step(),
        ];
        backfill_steps(&mut steps, 0, 0, "setup");

        assert_eq!(steps[0].prompt, "read the config");
        assert_eq!(steps[1].prompt, "Implement step 2 for task 'setup'");
    }

    #[test]
    fn backfill_is_idempotent() {
        let mut steps = vec![
            Step {
                step_id: "custom_id".to_string(),
                prompt: "do the thing".to_string(),
                description: None,
            },
            bare_step(),
        ];
        backfill_steps(&mut steps, 1, 3, "t");
        let first_pass = steps.clone();
        backfill_steps(&mut steps, 1, 3, "t");

        assert_eq!(steps, first_pass);
        assert_eq!(steps[0].step_id, "custom_id");
        assert_eq!(steps[0].prompt, "do the thing");
    }

    #[test]
    fn step_deserializes_with_missing_fields() {
        let step: Step = serde_json::from_value(json!({"description": "only this"})).unwrap();
        assert!(step.step_id.is_empty());
        assert!(step.prompt.is_empty());
        assert_eq!(step.description.as_deref(), Some("only this"));
    }

    #[test]
    fn step_count_sums_across_tasks() {
        let mut checklist = Checklist::new("g", json!({}));
        checklist.phases = vec![Phase {
            name: "p".to_string(),
            description: String::new(),
            tasks: vec![
                Task {
                    name: "a".to_string(),
                    description: String::new(),
                    steps: vec![bare_step(), bare_step()],
                    reasoning: None,
                },
                Task {
                    name: "b".to_string(),
                    description: String::new(),
                    steps: vec![bare_step()],
                    reasoning: None,
                },
            ],
            reasoning: None,
        }];
        assert_eq!(checklist.step_count(), 3);
    }

    #[test]
    fn checklist_serialization_round_trips() {
        let mut checklist = Checklist::new("ship it", json!({"team": "core"}));
        checklist.metadata.generated_at = "2026-01-01T00:00:00Z".to_string();
        checklist
            .metadata
            .reasoning
            .insert("phases".to_string(), ReasoningRecord::default());

        let value = serde_json::to_value(&checklist).unwrap();
        assert_eq!(value["goal"], "ship it");
        assert_eq!(value["metadata"]["context"]["team"], "core");
        assert!(value["metadata"]["reasoning"]["phases"].is_object());

        let back: Checklist = serde_json::from_value(value).unwrap();
        assert_eq!(back.goal, "ship it");
    }
}
