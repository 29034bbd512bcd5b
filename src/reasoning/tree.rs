//! The per-node decision machine: generate → evaluate → select.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::checklist::ReasoningRecord;
use crate::client::GenerationClient;
use crate::config::{DecompositionLimits, GenerationParams, ReasoningConfig};
use crate::errors::ReasoningError;
use crate::prompts::PromptProvider;
use crate::reasoning::{
    Alternative, AlternativeGenerator, MultiCriteriaEvaluator, NodeStage, NodeType, Selector,
};

/// The outcome of one node decision: the authoritative child list plus
/// the audit trail of how it was chosen.
#[derive(Debug, Clone)]
pub struct NodeDecision {
    pub children: Alternative,
    pub alternative_index: usize,
    pub record: ReasoningRecord,
}

/// Composes generation, evaluation, and selection into one atomic node
/// decision. There is no partial or resumable state for a single node.
pub struct ReasoningTree {
    generator: AlternativeGenerator,
    evaluator: MultiCriteriaEvaluator,
    selector: Selector,
}

impl ReasoningTree {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: ReasoningConfig,
        limits: DecompositionLimits,
        params: GenerationParams,
    ) -> Self {
        Self {
            generator: AlternativeGenerator::new(
                client.clone(),
                prompts.clone(),
                config.clone(),
                limits,
                params.clone(),
            ),
            evaluator: MultiCriteriaEvaluator::new(
                client.clone(),
                prompts.clone(),
                config.clone(),
                params.clone(),
            ),
            selector: Selector::new(client, prompts, config, params),
        }
    }

    /// Decide the children of one decomposition node.
    pub async fn decide(
        &self,
        goal: &str,
        context: &Value,
        node_type: NodeType,
    ) -> Result<NodeDecision, ReasoningError> {
        let alternatives = self
            .generator
            .generate(goal, context, node_type)
            .await
            .map_err(|source| stage_failure(node_type, NodeStage::Generating, source))?;

        let evaluations = self.evaluator.evaluate(goal, &alternatives, node_type).await;

        let selection = self
            .selector
            .select_best(goal, &alternatives, &evaluations, node_type)
            .await
            .map_err(|source| stage_failure(node_type, NodeStage::Selecting, source))?;

        info!(
            %node_type,
            selected = selection.alternative_index,
            children = selection.selected.len(),
            "node decision complete"
        );

        Ok(NodeDecision {
            children: selection.selected,
            alternative_index: selection.alternative_index,
            record: ReasoningRecord {
                alternatives,
                evaluations,
                justification: selection.justification,
            },
        })
    }
}

fn stage_failure(node_type: NodeType, stage: NodeStage, source: ReasoningError) -> ReasoningError {
    ReasoningError::NodeDecisionFailed {
        node_type,
        stage,
        source: Box::new(source),
    }
}
