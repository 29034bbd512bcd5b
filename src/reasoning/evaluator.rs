//! Concurrent multi-criteria scoring of candidate alternatives.
//!
//! Every (alternative, criterion) pair becomes one evaluation task; all
//! tasks run in a single fan-out batch and are joined in submission
//! order. A task's failure never aborts the batch — it is converted into
//! a zero-score sentinel carrying the failure reason as justification.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::GenerationClient;
use crate::config::{GenerationParams, ReasoningConfig};
use crate::errors::{ParseError, ReasoningError};
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::reasoning::{Alternative, DISABLED_JUSTIFICATION, NodeType};
use crate::response;

/// One reading of one alternative against one criterion.
///
/// `score` is `None` when the reading failed; the failure reason lands in
/// `justification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub alternative_index: usize,
    pub criterion: String,
    pub score: Option<f64>,
    pub justification: String,
}

/// Per-alternative rollup of every criterion reading.
///
/// `total_score` is the arithmetic mean of the readings that produced a
/// valid number; failed readings are recorded as `0.0` in
/// `criteria_scores` for audit but excluded from the mean. An alternative
/// with no valid readings gets `total_score = 0.0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedEvaluation {
    pub alternative_index: usize,
    pub criteria_scores: BTreeMap<String, f64>,
    pub justifications: BTreeMap<String, String>,
    pub total_score: f64,
}

/// Scores alternative sets against the configured criteria.
pub struct MultiCriteriaEvaluator {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    config: ReasoningConfig,
    params: GenerationParams,
}

impl MultiCriteriaEvaluator {
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

    /// Evaluate every alternative against every criterion.
    ///
    /// Never fails: individual readings degrade to sentinels, and with
    /// exploration disabled each alternative gets a trivial 1.0 aggregate
    /// so the selector's interface stays uniform across modes.
    pub async fn evaluate(
        &self,
        goal: &str,
        alternatives: &[Alternative],
        node_type: NodeType,
    ) -> Vec<AggregatedEvaluation> {
        if !self.config.enabled {
            info!(%node_type, "exploration disabled, skipping evaluation");
            return alternatives
                .iter()
                .enumerate()
                .map(|(i, _)| AggregatedEvaluation {
                    alternative_index: i,
                    criteria_scores: BTreeMap::new(),
                    justifications: BTreeMap::from([(
                        "disabled".to_string(),
                        DISABLED_JUSTIFICATION.to_string(),
                    )]),
                    total_score: 1.0,
                })
                .collect();
        }

        let mut tasks = Vec::with_capacity(alternatives.len() * self.config.criteria.len());
        for (alt_idx, alternative) in alternatives.iter().enumerate() {
            for criterion in &self.config.criteria {
                tasks.push(self.evaluate_one(goal, alternative, node_type, alt_idx, criterion));
            }
        }

        info!(
            %node_type,
            alternatives = alternatives.len(),
            tasks = tasks.len(),
            "running evaluation batch"
        );
        let evaluations = join_all(tasks).await;

        aggregate(&evaluations, alternatives.len())
    }

    /// One reading. Failures are caught here, at the task boundary.
    async fn evaluate_one(
        &self,
        goal: &str,
        alternative: &Alternative,
        node_type: NodeType,
        alt_idx: usize,
        criterion: &str,
    ) -> Evaluation {
        match self.score_criterion(goal, alternative, node_type, criterion).await {
            Ok((score, justification)) => {
                debug!(alt_idx, criterion, score, "criterion scored");
                Evaluation {
                    alternative_index: alt_idx,
                    criterion: criterion.to_string(),
                    score: Some(score),
                    justification,
                }
            }
            Err(err) => {
                warn!(alt_idx, criterion, %err, "criterion evaluation failed");
                Evaluation {
                    alternative_index: alt_idx,
                    criterion: criterion.to_string(),
                    score: None,
                    justification: format!("Evaluation failed: {err}"),
                }
            }
        }
    }

    async fn score_criterion(
        &self,
        goal: &str,
        alternative: &Alternative,
        node_type: NodeType,
        criterion: &str,
    ) -> Result<(f64, String), ReasoningError> {
        let alternative_json = pretty_json(&Value::Array(alternative.clone()));
        let args = vec![
            ("goal", goal.to_string()),
            ("alternative", alternative_json),
        ];
        let prompt = self
            .prompts
            .format(&node_type.evaluation_template(criterion), &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        let evaluation = response::extract_object(&raw, "evaluation")?;

        if !evaluation.contains_key("score") || !evaluation.contains_key("justification") {
            return Err(ParseError::InvalidShape {
                field: "evaluation".to_string(),
                expected: "an object with 'score' and 'justification'",
            }
            .into());
        }

        let score = numeric_score(&evaluation["score"]).ok_or(ParseError::InvalidShape {
            field: "score".to_string(),
            expected: "a number",
        })?;
        let justification = evaluation["justification"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok((score, justification))
    }
}

/// Accept a numeric score, or a string that parses as one.
fn numeric_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Roll readings up per alternative: mean of available valid scores,
/// failed readings audited as `0.0` but excluded from the mean.
pub fn aggregate(evaluations: &[Evaluation], num_alternatives: usize) -> Vec<AggregatedEvaluation> {
    let mut aggregated: Vec<AggregatedEvaluation> = (0..num_alternatives)
        .map(|i| AggregatedEvaluation {
            alternative_index: i,
            ..Default::default()
        })
        .collect();
    let mut sums = vec![0.0_f64; num_alternatives];
    let mut counts = vec![0_usize; num_alternatives];

    for evaluation in evaluations {
        let idx = evaluation.alternative_index;
        if idx >= num_alternatives {
            warn!(idx, "evaluation references unknown alternative, skipping");
            continue;
        }
        let agg = &mut aggregated[idx];
        agg.criteria_scores
            .insert(evaluation.criterion.clone(), evaluation.score.unwrap_or(0.0));
        agg.justifications
            .insert(evaluation.criterion.clone(), evaluation.justification.clone());
        if let Some(score) = evaluation.score {
            sums[idx] += score;
            counts[idx] += 1;
        }
    }

    for (idx, agg) in aggregated.iter_mut().enumerate() {
        agg.total_score = if counts[idx] > 0 {
            sums[idx] / counts[idx] as f64
        } else {
            0.0
        };
        debug!(idx, total_score = agg.total_score, "alternative aggregated");
    }

    aggregated
}
