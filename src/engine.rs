//! The hierarchical decomposition engine.
//!
//! Drives the whole run: phases via the reasoning tree, tasks per phase
//! via the reasoning tree, steps per task via a direct generation call,
//! threading accumulated context (goal, ancestors, siblings) into every
//! prompt. Any failure at any stage aborts the run — the caller sees a
//! complete checklist or a single error, never a partial tree.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::checklist::{Checklist, Phase, Step, Task, backfill_steps};
use crate::client::GenerationClient;
use crate::config::{DecompositionLimits, EngineConfig, GenerationParams};
use crate::errors::{ConfigError, DecompositionError, ParseError};
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::reasoning::{NodeType, ReasoningTree};
use crate::response;

/// Shape of a phase-like or task-like entity inside a selected
/// alternative. Anything beyond a name and description is ignored.
#[derive(Debug, Deserialize)]
struct ChildDraft {
    name: String,
    #[serde(default)]
    description: String,
}

/// Generates hierarchical checklists from high-level goals.
pub struct ChecklistEngine {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    tree: ReasoningTree,
    limits: DecompositionLimits,
    params: GenerationParams,
}

impl std::fmt::Debug for ChecklistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecklistEngine")
            .field("limits", &self.limits)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ChecklistEngine {
    /// Build an engine, validating the configuration up front.
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tree = ReasoningTree::new(
            client.clone(),
            prompts.clone(),
            config.reasoning,
            config.limits,
            config.generation.clone(),
        );
        Ok(Self {
            client,
            prompts,
            tree,
            limits: config.limits,
            params: config.generation,
        })
    }

    /// Generate a complete checklist for a goal.
    pub async fn generate_checklist(
        &self,
        goal: &str,
        context: Option<Value>,
    ) -> Result<Checklist, DecompositionError> {
        let context = context.unwrap_or_else(|| Value::Object(Default::default()));
        let mut checklist = Checklist::new(goal, context.clone());

        info!(goal, "generating phases");
        let decision = self.tree.decide(goal, &context, NodeType::Phase).await?;
        let mut phases: Vec<Phase> = decode_children(decision.children, NodeType::Phase)?
            .into_iter()
            .map(|draft| Phase {
                name: draft.name,
                description: draft.description,
                tasks: Vec::new(),
                reasoning: None,
            })
            .collect();
        checklist
            .metadata
            .reasoning
            .insert("phases".to_string(), decision.record);

        for phase_idx in 0..phases.len() {
            info!(phase_idx, phase = %phases[phase_idx].name, "generating tasks");
            let phase_context = json!({
                "goal": goal,
                "phase_idx": phase_idx,
                "phase_name": phases[phase_idx].name,
                "phase_description": phases[phase_idx].description,
                "phases": serde_json::to_value(&phases).unwrap_or_default(),
            });

            let decision = self
                .tree
                .decide(goal, &phase_context, NodeType::Task)
                .await?;
            let tasks: Vec<Task> = decode_children(decision.children, NodeType::Task)?
                .into_iter()
                .map(|draft| Task {
                    name: draft.name,
                    description: draft.description,
                    steps: Vec::new(),
                    reasoning: None,
                })
                .collect();

            phases[phase_idx].tasks = tasks;
            phases[phase_idx].reasoning = Some(decision.record.clone());
            checklist
                .metadata
                .reasoning
                .insert(format!("phase{phase_idx}.tasks"), decision.record);

            for task_idx in 0..phases[phase_idx].tasks.len() {
                let phase = &phases[phase_idx];
                let task = &phase.tasks[task_idx];
                info!(phase_idx, task_idx, task = %task.name, "generating steps");
                let task_context = json!({
                    "goal": goal,
                    "phase_idx": phase_idx,
                    "phase_name": phase.name,
                    "phase_description": phase.description,
                    "task_idx": task_idx,
                    "task_name": task.name,
                    "task_description": task.description,
                    "phases": serde_json::to_value(&phases).unwrap_or_default(),
                    "tasks": serde_json::to_value(&phase.tasks).unwrap_or_default(),
                });

                let mut steps = self.generate_steps(goal, &task_context).await?;
                let task_name = phases[phase_idx].tasks[task_idx].name.clone();
                backfill_steps(&mut steps, phase_idx, task_idx, &task_name);
                debug!(phase_idx, task_idx, steps = steps.len(), "steps generated");
                phases[phase_idx].tasks[task_idx].steps = steps;
            }
        }

        checklist.phases = phases;
        checklist.metadata.generated_at = Utc::now().to_rfc3339();
        info!(
            phases = checklist.phases.len(),
            steps = checklist.step_count(),
            "checklist complete"
        );
        Ok(checklist)
    }

    /// Direct step generation — steps are generated once per task, never
    /// reasoning-tree-selected.
    async fn generate_steps(
        &self,
        goal: &str,
        task_context: &Value,
    ) -> Result<Vec<Step>, DecompositionError> {
        let args = vec![
            ("goal", goal.to_string()),
            ("phase_name", context_str(task_context, "phase_name")),
            ("task_name", context_str(task_context, "task_name")),
            (
                "task_description",
                context_str(task_context, "task_description"),
            ),
            ("context", pretty_json(task_context)),
            ("max_steps", self.limits.max_steps_per_task.to_string()),
        ];
        let prompt = self.prompts.format("generate_steps", &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        let items = response::extract_array(&raw, "steps")?;

        items
            .into_iter()
            .map(|value| {
                serde_json::from_value::<Step>(value).map_err(|_| {
                    DecompositionError::Parse(ParseError::InvalidShape {
                        field: "steps".to_string(),
                        expected: "a list of step objects",
                    })
                })
            })
            .collect()
    }
}

fn context_str(context: &Value, key: &str) -> String {
    context
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("N/A")
        .to_string()
}

fn decode_children(
    children: Vec<Value>,
    node_type: NodeType,
) -> Result<Vec<ChildDraft>, DecompositionError> {
    children
        .into_iter()
        .map(|value| {
            serde_json::from_value::<ChildDraft>(value)
                .map_err(|source| DecompositionError::InvalidChildren { node_type, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::config::ReasoningConfig;
    use crate::errors::{GenerationError, ReasoningError, TemplateError};

    struct EchoPrompts;

    impl PromptProvider for EchoPrompts {
        fn format(&self, name: &str, _args: &[(&str, &str)]) -> Result<String, TemplateError> {
            Ok(name.to_string())
        }
    }

    struct RoutedClient {
        routes: Vec<(&'static str, String)>,
        prompts_seen: Mutex<Vec<String>>,
    }

    impl RoutedClient {
        fn new(routes: Vec<(&'static str, String)>) -> Self {
            Self {
                routes,
                prompts_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for RoutedClient {
        async fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationError> {
            self.prompts_seen.lock().unwrap().push(prompt.to_string());
            for (needle, response) in &self.routes {
                if prompt.contains(needle) {
                    return Ok(response.clone());
                }
            }
            Err(GenerationError::Failed(anyhow::anyhow!(
                "no route for {prompt}"
            )))
        }
    }

    fn engine_with(
        client: Arc<RoutedClient>,
        reasoning: ReasoningConfig,
    ) -> ChecklistEngine {
        let config = EngineConfig {
            reasoning,
            ..Default::default()
        };
        ChecklistEngine::new(client, Arc::new(EchoPrompts), config).unwrap()
    }

    fn direct_routes() -> Vec<(&'static str, String)> {
        vec![
            (
                "generate_phases",
                r#"{"phases": [
                    {"name": "Design", "description": "sketch it"},
                    {"name": "Build", "description": "make it"}
                ]}"#
                .to_string(),
            ),
            (
                "generate_tasks",
                r#"{"tasks": [{"name": "Task A", "description": "do a"}]}"#.to_string(),
            ),
            (
                "generate_steps",
                r#"{"steps": [
                    {"prompt": "open the editor"},
                    {"description": "save the file"}
                ]}"#
                .to_string(),
            ),
        ]
    }

    #[tokio::test]
    async fn builds_full_tree_with_backfilled_steps() {
        let client = Arc::new(RoutedClient::new(direct_routes()));
        let engine = engine_with(client, ReasoningConfig::disabled());

        let checklist = engine
            .generate_checklist("write a parser", None)
            .await
            .unwrap();

        assert_eq!(checklist.goal, "write a parser");
        assert_eq!(checklist.phases.len(), 2);
        assert_eq!(checklist.phases[0].tasks.len(), 1);
        let steps = &checklist.phases[1].tasks[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_id, "phase1_task0_step0");
        assert_eq!(steps[0].prompt, "open the editor");
        assert_eq!(steps[1].prompt, "save the file");
        assert!(!checklist.metadata.generated_at.is_empty());
    }

    #[tokio::test]
    async fn records_reasoning_at_every_node() {
        let client = Arc::new(RoutedClient::new(direct_routes()));
        let engine = engine_with(client, ReasoningConfig::disabled());

        let checklist = engine.generate_checklist("goal", None).await.unwrap();

        assert!(checklist.metadata.reasoning.contains_key("phases"));
        assert!(checklist.metadata.reasoning.contains_key("phase0.tasks"));
        assert!(checklist.metadata.reasoning.contains_key("phase1.tasks"));
        assert!(checklist.phases[0].reasoning.is_some());
    }

    #[tokio::test]
    async fn drives_one_generation_call_per_node() {
        let client = Arc::new(RoutedClient::new(direct_routes()));
        let engine = engine_with(client.clone(), ReasoningConfig::disabled());

        engine.generate_checklist("goal", None).await.unwrap();

        // One phases call, one task call per phase, one step call per task.
        let prompts = client.prompts_seen.lock().unwrap();
        let count = |needle: &str| prompts.iter().filter(|p| p.contains(needle)).count();
        assert_eq!(count("generate_phases"), 1);
        assert_eq!(count("generate_tasks"), 2);
        assert_eq!(count("generate_steps"), 2);
    }

    #[tokio::test]
    async fn node_failure_aborts_with_no_partial_result() {
        // Tasks route missing: the second-level decision fails.
        let client = Arc::new(RoutedClient::new(vec![(
            "generate_phases",
            r#"{"phases": [{"name": "Only", "description": "d"}]}"#.to_string(),
        )]));
        let engine = engine_with(client, ReasoningConfig::disabled());

        let err = engine.generate_checklist("goal", None).await.unwrap_err();
        assert!(matches!(
            err,
            DecompositionError::Reasoning(ReasoningError::NodeDecisionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unnamed_children_are_rejected() {
        let client = Arc::new(RoutedClient::new(vec![(
            "generate_phases",
            r#"{"phases": [{"description": "no name"}]}"#.to_string(),
        )]));
        let engine = engine_with(client, ReasoningConfig::disabled());

        let err = engine.generate_checklist("goal", None).await.unwrap_err();
        assert!(matches!(
            err,
            DecompositionError::InvalidChildren {
                node_type: NodeType::Phase,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalid_step_shape_is_rejected() {
        let mut routes = direct_routes();
        routes.retain(|(needle, _)| *needle != "generate_steps");
        routes.push(("generate_steps", r#"{"steps": ["just a string"]}"#.to_string()));
        let client = Arc::new(RoutedClient::new(routes));
        let engine = engine_with(client, ReasoningConfig::disabled());

        let err = engine.generate_checklist("goal", None).await.unwrap_err();
        assert!(matches!(
            err,
            DecompositionError::Parse(ParseError::InvalidShape { .. })
        ));
    }

    #[tokio::test]
    async fn explored_run_selects_and_records_alternatives() {
        let config = ReasoningConfig::default()
            .with_alternatives_count(1)
            .with_criteria(vec!["coherence".to_string()]);
        let client = Arc::new(RoutedClient::new(vec![
            (
                "generate_phase_alternatives",
                r#"{"alternatives": [
                    [{"name": "Lean", "description": ""}],
                    [{"name": "Thorough", "description": ""}]
                ]}"#
                .to_string(),
            ),
            (
                "generate_task_alternatives",
                r#"{"alternatives": [[{"name": "T", "description": ""}]]}"#.to_string(),
            ),
            (
                "evaluate_phase_coherence",
                r#"{"evaluation": {"score": 0.4, "justification": "j"}}"#.to_string(),
            ),
            (
                "evaluate_task_coherence",
                r#"{"evaluation": {"score": 0.9, "justification": "j"}}"#.to_string(),
            ),
            ("justify_phase_selection", "phases justified".to_string()),
            ("justify_task_selection", "tasks justified".to_string()),
            (
                "generate_steps",
                r#"{"steps": [{"prompt": "only step"}]}"#.to_string(),
            ),
        ]));
        let engine = engine_with(client, config);

        let checklist = engine.generate_checklist("goal", None).await.unwrap();

        let root = &checklist.metadata.reasoning["phases"];
        assert_eq!(root.alternatives.len(), 2);
        assert_eq!(root.justification, "phases justified");
        assert_eq!(checklist.phases.len(), 1);
        assert_eq!(checklist.phases[0].name, "Lean");
        assert_eq!(checklist.phases[0].tasks[0].steps[0].prompt, "only step");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_construction() {
        let config = EngineConfig {
            limits: DecompositionLimits::default().with_max_phases(0),
            ..Default::default()
        };
        let client = Arc::new(RoutedClient::new(Vec::new()));
        let err = ChecklistEngine::new(client, Arc::new(EchoPrompts), config).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroLimit { field: "max_phases" }));
    }
}
