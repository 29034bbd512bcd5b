//! QA validation of a finished checklist.
//!
//! An advisory pass that asks the generation service to judge the whole
//! checklist against quality criteria. Disabled by default; when disabled
//! it returns a passing report without any generation call. Unlike the
//! council, QA failures propagate to the caller — the checklist itself is
//! never modified here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::checklist::Checklist;
use crate::client::GenerationClient;
use crate::config::{GenerationParams, QaConfig};
use crate::errors::QaValidationError;
use crate::prompts::{PromptProvider, arg_refs, pretty_json};
use crate::response;

/// Outcome of a QA pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub score: f64,
    pub feedback: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Judges a finished checklist against configured criteria.
pub struct QaValidator {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptProvider>,
    config: QaConfig,
    params: GenerationParams,
}

impl QaValidator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptProvider>,
        config: QaConfig,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            prompts,
            config,
            params,
        }
    }

    /// Validate the checklist.
    pub async fn validate_checklist(
        &self,
        checklist: &Checklist,
    ) -> Result<ValidationReport, QaValidationError> {
        if !self.config.enabled {
            info!("QA validation disabled, skipping");
            return Ok(ValidationReport {
                passed: true,
                score: 1.0,
                feedback: "QA validation is disabled.".to_string(),
                issues: Vec::new(),
                suggestions: Vec::new(),
            });
        }

        info!("running QA validation");
        let checklist_json = pretty_json(&serde_json::to_value(checklist).unwrap_or_default());
        let criteria_json =
            pretty_json(&serde_json::to_value(&self.config.criteria).unwrap_or_default());
        let args = vec![
            ("checklist", checklist_json),
            ("criteria", criteria_json),
        ];
        let prompt = self
            .prompts
            .format("qa_validate_checklist", &arg_refs(&args))?;
        let raw = self.client.generate(&prompt, &self.params).await?;

        let results = response::extract_object(&raw, "validation_results")?;
        for field in ["score", "feedback", "issues", "suggestions"] {
            if !results.contains_key(field) {
                return Err(QaValidationError::MissingResultField { field });
            }
        }

        let score = match &results["score"] {
            Value::Number(n) => n.as_f64().ok_or(QaValidationError::InvalidScore)?,
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| QaValidationError::InvalidScore)?,
            _ => return Err(QaValidationError::InvalidScore),
        };
        let feedback = results["feedback"].as_str().unwrap_or_default().to_string();
        let issues = string_list(&results["issues"]);
        let suggestions = string_list(&results["suggestions"]);

        let passed = score >= self.config.passing_score_threshold;
        info!(score, passed, "QA validation complete");
        Ok(ValidationReport {
            passed,
            score,
            feedback,
            issues,
            suggestions,
        })
    }
}

/// Coerce a JSON value into a list of strings; non-lists become empty.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => {
            warn!("expected a list in validation results, substituting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::{GenerationError, TemplateError};

    struct EchoPrompts;

    impl PromptProvider for EchoPrompts {
        fn format(&self, name: &str, _args: &[(&str, &str)]) -> Result<String, TemplateError> {
            Ok(name.to_string())
        }
    }

    struct FixedClient {
        calls: AtomicUsize,
        response: String,
    }

    impl FixedClient {
        fn new(response: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for FixedClient {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn validator(client: Arc<FixedClient>, config: QaConfig) -> QaValidator {
        QaValidator::new(client, Arc::new(EchoPrompts), config, GenerationParams::default())
    }

    fn checklist() -> Checklist {
        Checklist::new("goal", serde_json::json!({}))
    }

    #[tokio::test]
    async fn disabled_returns_passing_report_without_calls() {
        let client = Arc::new(FixedClient::new(""));
        let report = validator(client.clone(), QaConfig::default())
            .validate_checklist(&checklist())
            .await
            .unwrap();

        assert!(report.passed);
        assert_eq!(report.score, 1.0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scores_against_threshold() {
        let response = r#"{"validation_results": {
            "score": 0.85,
            "feedback": "solid",
            "issues": ["phase 2 is thin"],
            "suggestions": ["add a verification step"]
        }}"#;
        let report = validator(Arc::new(FixedClient::new(response)), QaConfig::enabled())
            .validate_checklist(&checklist())
            .await
            .unwrap();

        assert!(report.passed);
        assert_eq!(report.score, 0.85);
        assert_eq!(report.issues, vec!["phase 2 is thin"]);
    }

    #[tokio::test]
    async fn below_threshold_fails_the_report() {
        let response = r#"{"validation_results": {
            "score": "0.4",
            "feedback": "gaps",
            "issues": [],
            "suggestions": []
        }}"#;
        let report = validator(Arc::new(FixedClient::new(response)), QaConfig::enabled())
            .validate_checklist(&checklist())
            .await
            .unwrap();

        // A string score that parses as a number is accepted.
        assert_eq!(report.score, 0.4);
        assert!(!report.passed);
    }

    #[tokio::test]
    async fn missing_required_field_is_an_error() {
        let response = r#"{"validation_results": {"score": 0.9, "feedback": "f", "issues": []}}"#;
        let err = validator(Arc::new(FixedClient::new(response)), QaConfig::enabled())
            .validate_checklist(&checklist())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QaValidationError::MissingResultField {
                field: "suggestions"
            }
        ));
    }

    #[tokio::test]
    async fn non_list_issues_become_empty() {
        let response = r#"{"validation_results": {
            "score": 0.9,
            "feedback": "f",
            "issues": "not a list",
            "suggestions": []
        }}"#;
        let report = validator(Arc::new(FixedClient::new(response)), QaConfig::enabled())
            .validate_checklist(&checklist())
            .await
            .unwrap();
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn non_numeric_score_is_an_error() {
        let response = r#"{"validation_results": {
            "score": "high",
            "feedback": "f",
            "issues": [],
            "suggestions": []
        }}"#;
        let err = validator(Arc::new(FixedClient::new(response)), QaConfig::enabled())
            .validate_checklist(&checklist())
            .await
            .unwrap_err();
        assert!(matches!(err, QaValidationError::InvalidScore));
    }
}
