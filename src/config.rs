//! Typed configuration records for the orchestration core.
//!
//! Every component receives an explicit, validated configuration record
//! instead of an untyped settings map. Validation happens once, at
//! construction of the engine, and fails fast with [`ConfigError`].

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Default model used for all generation calls.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default nucleus-sampling threshold.
pub const DEFAULT_TOP_P: f64 = 0.95;

/// Default top-k cutoff.
pub const DEFAULT_TOP_K: u32 = 40;

/// Default output-length cap, in tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Default number of candidate alternatives explored per node.
pub const DEFAULT_ALTERNATIVES_COUNT: usize = 3;

/// Default evaluation criteria for scoring alternatives.
pub const DEFAULT_EVALUATION_CRITERIA: &[&str] =
    &["risks", "coherence", "completeness", "clarity"];

/// Default criteria for QA validation of a finished checklist.
pub const DEFAULT_QA_CRITERIA: &[&str] =
    &["completeness", "actionability", "clarity", "logical_flow"];

/// Default minimum QA score considered passing.
pub const DEFAULT_QA_PASSING_THRESHOLD: f64 = 0.8;

/// Model selection and sampling parameters for generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl GenerationParams {
    /// Set the model name.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the nucleus-sampling threshold.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the output-length cap.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Validate sampling parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model name is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                field: "temperature",
                min: 0.0,
                max: 2.0,
                value: self.temperature,
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::OutOfRange {
                field: "top_p",
                min: 0.0,
                max: 1.0,
                value: self.top_p,
            });
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_output_tokens",
            });
        }
        Ok(())
    }
}

/// Soft limits communicated to the generation step at each level of the
/// hierarchy. These bound what is asked for, not what is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecompositionLimits {
    pub max_phases: usize,
    pub max_tasks_per_phase: usize,
    pub max_steps_per_task: usize,
}

impl Default for DecompositionLimits {
    fn default() -> Self {
        Self {
            max_phases: 7,
            max_tasks_per_phase: 7,
            max_steps_per_task: 10,
        }
    }
}

impl DecompositionLimits {
    /// Set the maximum number of phases.
    pub fn with_max_phases(mut self, max: usize) -> Self {
        self.max_phases = max;
        self
    }

    /// Set the maximum number of tasks per phase.
    pub fn with_max_tasks_per_phase(mut self, max: usize) -> Self {
        self.max_tasks_per_phase = max;
        self
    }

    /// Set the maximum number of steps per task.
    pub fn with_max_steps_per_task(mut self, max: usize) -> Self {
        self.max_steps_per_task = max;
        self
    }

    /// Validate that every limit is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_phases == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_phases" });
        }
        if self.max_tasks_per_phase == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_tasks_per_phase",
            });
        }
        if self.max_steps_per_task == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_steps_per_task",
            });
        }
        Ok(())
    }
}

/// Get the default evaluation criteria as owned strings.
pub fn default_evaluation_criteria() -> Vec<String> {
    DEFAULT_EVALUATION_CRITERIA
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Configuration for the reasoning tree (alternative exploration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Whether exploration is enabled. When disabled, every node decision
    /// degrades to a single generation call and a default selection.
    pub enabled: bool,
    /// How many candidate alternative sets to request per node.
    pub alternatives_count: usize,
    /// Criteria each alternative is scored against.
    pub criteria: Vec<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alternatives_count: DEFAULT_ALTERNATIVES_COUNT,
            criteria: default_evaluation_criteria(),
        }
    }
}

impl ReasoningConfig {
    /// Create a disabled configuration.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the number of alternatives explored per node.
    pub fn with_alternatives_count(mut self, count: usize) -> Self {
        self.alternatives_count = count;
        self
    }

    /// Replace the evaluation criteria.
    pub fn with_criteria(mut self, criteria: Vec<String>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Validate the exploration settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.alternatives_count == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "alternatives_count",
            });
        }
        if self.enabled && self.criteria.is_empty() {
            return Err(ConfigError::Invalid(
                "evaluation criteria list is empty while exploration is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named critique viewpoint for the council.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Persona {
    /// Create an enabled persona.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }

    /// Create a disabled persona.
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
        }
    }
}

/// Configuration for the council critique pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub personas: Vec<Persona>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            personas: Vec::new(),
        }
    }
}

impl CouncilConfig {
    /// Create an enabled configuration with the given personas.
    pub fn with_personas(personas: Vec<Persona>) -> Self {
        Self {
            enabled: true,
            personas,
        }
    }

    /// Create a disabled configuration.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            personas: Vec::new(),
        }
    }

    /// Names of the personas that will actually critique.
    pub fn enabled_personas(&self) -> Vec<&str> {
        self.personas
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Whether the council will do any work. A configuration with no
    /// enabled personas behaves exactly as a disabled one.
    pub fn is_active(&self) -> bool {
        self.enabled && self.personas.iter().any(|p| p.enabled)
    }
}

/// Configuration for QA validation of the finished checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Disabled by default; validation is advisory.
    pub enabled: bool,
    /// Criteria the checklist is judged against.
    pub criteria: Vec<String>,
    /// Minimum score considered passing.
    pub passing_score_threshold: f64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            criteria: DEFAULT_QA_CRITERIA.iter().map(|s| s.to_string()).collect(),
            passing_score_threshold: DEFAULT_QA_PASSING_THRESHOLD,
        }
    }
}

impl QaConfig {
    /// Create an enabled configuration with defaults.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the passing threshold.
    pub fn with_passing_threshold(mut self, threshold: f64) -> Self {
        self.passing_score_threshold = threshold;
        self
    }

    /// Validate the QA settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.passing_score_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "passing_score_threshold",
                min: 0.0,
                max: 1.0,
                value: self.passing_score_threshold,
            });
        }
        if self.enabled && self.criteria.is_empty() {
            return Err(ConfigError::Invalid(
                "QA criteria list is empty while validation is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aggregate configuration for the decomposition engine and its
/// collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub limits: DecompositionLimits,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub council: CouncilConfig,
    #[serde(default)]
    pub qa: QaConfig,
}

impl EngineConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        self.limits.validate()?;
        self.reasoning.validate()?;
        self.qa.validate()?;
        Ok(())
    }
}
