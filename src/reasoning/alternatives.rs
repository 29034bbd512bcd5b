//! Candidate alternative generation for a decomposition node.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::GenerationClient;
use crate::config::{DecompositionLimits, GenerationParams, ReasoningConfig};
use crate::errors::{ParseError, ReasoningError};
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::reasoning::{Alternative, NodeType};
use crate::response;

/// Produces competing candidate child lists for one decomposition node.
pub struct AlternativeGenerator {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    config: ReasoningConfig,
    limits: DecompositionLimits,
    params: GenerationParams,
}

impl AlternativeGenerator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: ReasoningConfig,
        limits: DecompositionLimits,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            prompts,
            config,
            limits,
            params,
        }
    }

    /// Generate the candidate set for a node.
    ///
    /// With exploration enabled this issues one generation call per
    /// alternative slot and collects every candidate list those calls
    /// return. With exploration disabled it degrades to a single direct
    /// generation wrapped as a one-element set.
    pub async fn generate(
        &self,
        goal: &str,
        context: &Value,
        node_type: NodeType,
    ) -> Result<Vec<Alternative>, ReasoningError> {
        if !self.config.enabled {
            info!(%node_type, "exploration disabled, generating single alternative");
            return self.generate_single(goal, context, node_type).await;
        }

        info!(
            %node_type,
            slots = self.config.alternatives_count,
            "generating alternative sets"
        );

        let mut alternatives: Vec<Alternative> = Vec::new();
        for slot in 0..self.config.alternatives_count {
            let args = self.alternative_args(goal, context, node_type);
            let prompt = self
                .prompts
                .format(node_type.alternatives_template(), &arg_refs(&args))?;
            let raw = self.client.generate(&prompt, &self.params).await?;
            let candidates = parse_alternatives(&raw)?;
            debug!(slot, count = candidates.len(), "collected candidate lists");
            alternatives.extend(candidates);
        }

        if alternatives.is_empty() {
            return Err(ReasoningError::NoAlternatives { node_type });
        }

        info!(%node_type, count = alternatives.len(), "alternative sets generated");
        Ok(alternatives)
    }

    /// Degraded path: one direct generation call, parsed under the plural
    /// key and wrapped as a one-element alternative set.
    async fn generate_single(
        &self,
        goal: &str,
        context: &Value,
        node_type: NodeType,
    ) -> Result<Vec<Alternative>, ReasoningError> {
        let args = self.direct_args(goal, context, node_type);
        let prompt = self
            .prompts
            .format(node_type.generation_template(), &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        let children = response::extract_array(&raw, node_type.plural_key())?;

        if children.is_empty() {
            return Err(ReasoningError::NoAlternatives { node_type });
        }

        Ok(vec![children])
    }

    fn alternative_args(
        &self,
        goal: &str,
        context: &Value,
        node_type: NodeType,
    ) -> Vec<(&'static str, String)> {
        let mut args = self.direct_args(goal, context, node_type);
        args.push((
            "alternatives_count",
            self.config.alternatives_count.to_string(),
        ));
        args
    }

    fn direct_args(
        &self,
        goal: &str,
        context: &Value,
        node_type: NodeType,
    ) -> Vec<(&'static str, String)> {
        let mut args = vec![
            ("goal", goal.to_string()),
            ("context", pretty_json(context)),
        ];
        match node_type {
            NodeType::Phase => {
                args.push(("max_phases", self.limits.max_phases.to_string()));
            }
            NodeType::Task => {
                args.push(("phase_name", context_str(context, "phase_name")));
                args.push(("phase_description", context_str(context, "phase_description")));
                args.push(("max_tasks", self.limits.max_tasks_per_phase.to_string()));
            }
        }
        args
    }
}

/// Read a string field out of the node context, defaulting when absent.
fn context_str(context: &Value, key: &str) -> String {
    context
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("N/A")
        .to_string()
}

/// Parse an `alternatives` field shaped as a list of lists.
fn parse_alternatives(raw: &str) -> Result<Vec<Alternative>, ReasoningError> {
    let items = response::extract_array(raw, "alternatives")?;
    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(children) => candidates.push(children),
            _ => {
                return Err(ParseError::InvalidShape {
                    field: "alternatives".to_string(),
                    expected: "a list of lists",
                }
                .into());
            }
        }
    }
    Ok(candidates)
}
