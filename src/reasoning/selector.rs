//! Winner selection among evaluated alternatives.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::GenerationClient;
use crate::config::{GenerationParams, ReasoningConfig};
use crate::errors::ReasoningError;
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::reasoning::{AggregatedEvaluation, Alternative, DISABLED_JUSTIFICATION, NodeType};

/// The authoritative pick for a node, with its audit context.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    /// The winning alternative — always one of the generated candidates.
    pub selected: Alternative,
    pub alternative_index: usize,
    pub justification: String,
    pub evaluation: AggregatedEvaluation,
}

/// Picks the highest-scoring alternative and justifies the pick.
pub struct Selector {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    config: ReasoningConfig,
    params: GenerationParams,
}

impl Selector {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: ReasoningConfig,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            prompts,
            config,
            params,
        }
    }

    /// Select the best alternative.
    ///
    /// Ties resolve to the lowest index. The natural-language
    /// justification is requested from the generation service; if that
    /// request fails, a synthesized justification embedding the winning
    /// score is used instead — justification failure never fails the
    /// selection. With exploration disabled, index 0 wins with a fixed
    /// justification and no generation call.
    pub async fn select_best(
        &self,
        goal: &str,
        alternatives: &[Alternative],
        evaluations: &[AggregatedEvaluation],
        node_type: NodeType,
    ) -> Result<Selection, ReasoningError> {
        if alternatives.is_empty() {
            return Err(ReasoningError::NoAlternatives { node_type });
        }

        if !self.config.enabled {
            info!(%node_type, "exploration disabled, selecting first alternative");
            return Ok(Selection {
                selected: alternatives[0].clone(),
                alternative_index: 0,
                justification: DISABLED_JUSTIFICATION.to_string(),
                evaluation: evaluations.first().cloned().unwrap_or(AggregatedEvaluation {
                    alternative_index: 0,
                    total_score: 1.0,
                    ..Default::default()
                }),
            });
        }

        if evaluations.len() != alternatives.len() {
            return Err(ReasoningError::EvaluationCountMismatch {
                alternatives: alternatives.len(),
                evaluations: evaluations.len(),
            });
        }

        let mut best_idx = 0;
        for (idx, evaluation) in evaluations.iter().enumerate().skip(1) {
            if evaluation.total_score > evaluations[best_idx].total_score {
                best_idx = idx;
            }
        }
        let best = &evaluations[best_idx];
        info!(
            %node_type,
            best_idx,
            score = best.total_score,
            "alternative selected"
        );

        let justification = self
            .justify(goal, alternatives, evaluations, best_idx, node_type)
            .await;

        Ok(Selection {
            selected: alternatives[best_idx].clone(),
            alternative_index: best_idx,
            justification,
            evaluation: best.clone(),
        })
    }

    /// Ask the service to explain the pick; synthesize on failure.
    async fn justify(
        &self,
        goal: &str,
        alternatives: &[Alternative],
        evaluations: &[AggregatedEvaluation],
        best_idx: usize,
        node_type: NodeType,
    ) -> String {
        match self
            .request_justification(goal, alternatives, evaluations, best_idx, node_type)
            .await
        {
            Ok(justification) => justification,
            Err(err) => {
                warn!(%err, "justification generation failed, synthesizing");
                format!(
                    "Selected based on highest overall score ({:.2}) across evaluation criteria (justification generation failed: {err})",
                    evaluations[best_idx].total_score
                )
            }
        }
    }

    async fn request_justification(
        &self,
        goal: &str,
        alternatives: &[Alternative],
        evaluations: &[AggregatedEvaluation],
        best_idx: usize,
        node_type: NodeType,
    ) -> Result<String, ReasoningError> {
        let alternatives_json = pretty_json(&serde_json::to_value(alternatives).unwrap_or_default());
        let evaluations_json = pretty_json(&serde_json::to_value(evaluations).unwrap_or_default());
        let args = vec![
            ("goal", goal.to_string()),
            ("alternatives", alternatives_json),
            ("evaluations", evaluations_json),
            ("best_idx", best_idx.to_string()),
        ];
        let prompt = self
            .prompts
            .format(node_type.justify_template(), &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        debug!("selection justification generated");
        Ok(raw.trim().to_string())
    }
}
