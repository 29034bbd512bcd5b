//! Council critique: an independent multi-perspective refinement pass
//! over a task's finished steps.
//!
//! Each enabled persona critiques the steps concurrently; a persona's
//! failure becomes a failure-text critique rather than aborting the
//! batch, and every persona's output — success or failure text — is fed
//! to the synthesis call. The synthesized revision is validated
//! structurally before it replaces anything.
//!
//! Refinement is strictly best-effort: any failure anywhere in the
//! pipeline returns the original steps unchanged. It must never corrupt
//! or drop already-valid output.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::checklist::Step;
use crate::client::GenerationClient;
use crate::config::{CouncilConfig, GenerationParams};
use crate::errors::CouncilError;
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::response;

/// Orchestrates persona critiques and step revision.
pub struct Council {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    config: CouncilConfig,
    params: GenerationParams,
}

impl Council {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: CouncilConfig,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            prompts,
            config,
            params,
        }
    }

    /// Review and refine a step list.
    ///
    /// Never fails to the caller: when the council is disabled (or has no
    /// enabled personas), the steps are empty, or anything in the
    /// pipeline goes wrong, the input is returned unchanged.
    pub async fn review_and_refine(&self, steps: &[Step], context: &Value) -> Vec<Step> {
        if !self.config.is_active() || steps.is_empty() {
            info!("council critique inactive or no steps, skipping refinement");
            return steps.to_vec();
        }

        match self.refine(steps, context).await {
            Ok(revised) => {
                info!(steps = revised.len(), "council refinement complete");
                revised
            }
            Err(err) => {
                error!(%err, "council critique failed, returning original steps");
                steps.to_vec()
            }
        }
    }

    async fn refine(&self, steps: &[Step], context: &Value) -> Result<Vec<Step>, CouncilError> {
        let steps_json = pretty_json(&serde_json::to_value(steps).unwrap_or_default());
        let context_json = pretty_json(context);

        let critiques = self.gather_critiques(&steps_json, &context_json).await;
        let revised = self.revise(&steps_json, &critiques, &context_json).await?;
        self.to_steps(revised, steps)
    }

    /// Fan out one critique per enabled persona. Results align with the
    /// persona order; a failed critique is recorded as failure text.
    async fn gather_critiques(
        &self,
        steps_json: &str,
        context_json: &str,
    ) -> Vec<(String, String)> {
        let personas = self.config.enabled_personas();
        info!(personas = personas.len(), "gathering council critiques");

        let tasks = personas
            .iter()
            .map(|persona| self.critique_one(persona, steps_json, context_json));
        let results = join_all(tasks).await;

        personas
            .into_iter()
            .zip(results)
            .map(|(persona, result)| match result {
                Ok(text) => {
                    debug!(persona, "critique received");
                    (persona.to_string(), text)
                }
                Err(err) => {
                    warn!(persona, %err, "critique generation failed");
                    (
                        persona.to_string(),
                        format!("Critique generation failed: {err}"),
                    )
                }
            })
            .collect()
    }

    async fn critique_one(
        &self,
        persona: &str,
        steps_json: &str,
        context_json: &str,
    ) -> Result<String, CouncilError> {
        let template = format!("critique_{persona}");
        let args = vec![
            ("steps", steps_json.to_string()),
            ("context", context_json.to_string()),
        ];
        let prompt = self.prompts.format(&template, &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        Ok(raw.trim().to_string())
    }

    /// Synthesize every critique into one revision request.
    async fn revise(
        &self,
        steps_json: &str,
        critiques: &[(String, String)],
        context_json: &str,
    ) -> Result<Vec<Value>, CouncilError> {
        let critiques_value = Value::Object(
            critiques
                .iter()
                .map(|(persona, text)| (persona.clone(), Value::String(text.clone())))
                .collect(),
        );
        let args = vec![
            ("steps", steps_json.to_string()),
            ("critiques", pretty_json(&critiques_value)),
            ("context", context_json.to_string()),
        ];
        let prompt = self.prompts.format("revise_steps", &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;
        Ok(response::extract_array(&raw, "revised_steps")?)
    }

    /// Validate the revised list structurally and convert it back into
    /// steps. A missing `step_id` is tolerated: it is backfilled from the
    /// same-index original step when one exists.
    fn to_steps(&self, revised: Vec<Value>, original: &[Step]) -> Result<Vec<Step>, CouncilError> {
        let mut steps = Vec::with_capacity(revised.len());

        for (index, value) in revised.into_iter().enumerate() {
            let Value::Object(map) = value else {
                return Err(CouncilError::InvalidStep {
                    index,
                    reason: "not an object".to_string(),
                });
            };

            let description = map
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);

            let prompt = match map.get("prompt") {
                Some(Value::String(text)) if !text.is_empty() => text.clone(),
                Some(_) => {
                    return Err(CouncilError::InvalidStep {
                        index,
                        reason: "'prompt' is not non-empty text".to_string(),
                    });
                }
                None => match &description {
                    Some(text) if !text.is_empty() => text.clone(),
                    _ => {
                        return Err(CouncilError::InvalidStep {
                            index,
                            reason: "missing 'prompt' or 'description'".to_string(),
                        });
                    }
                },
            };

            let step_id = match map.get("step_id").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    warn!(index, "revised step missing step_id, backfilling");
                    original
                        .get(index)
                        .map(|step| step.step_id.clone())
                        .unwrap_or_else(|| format!("step{index}"))
                }
            };

            steps.push(Step {
                step_id,
                prompt,
                description,
            });
        }

        Ok(steps)
    }
}
