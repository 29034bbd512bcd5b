//! Prompt template provider.
//!
//! The orchestration core asks for prompts by name and never embeds prompt
//! text itself. [`PromptProvider`] is the seam; [`StaticPrompts`] is an
//! in-memory implementation with a built-in default template set covering
//! every name the core consumes. On-disk template storage stays outside
//! this crate.
//!
//! Template syntax: `{name}` substitutes a named argument, `{{` and `}}`
//! emit literal braces. A placeholder with no matching argument fails with
//! [`TemplateError::MissingArgument`]; extra arguments are ignored.

use std::collections::HashMap;

use crate::errors::TemplateError;

/// Named prompt templates, formatted with named arguments.
pub trait PromptProvider: Send + Sync {
    /// Format the named template with the given arguments.
    fn format(&self, name: &str, args: &[(&str, &str)]) -> Result<String, TemplateError>;
}

/// In-memory template registry.
#[derive(Debug, Clone, Default)]
pub struct StaticPrompts {
    templates: HashMap<String, String>,
}

impl StaticPrompts {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-loaded with the built-in default templates.
    pub fn builtin() -> Self {
        let mut prompts = Self::new();
        for (name, body) in builtin_templates() {
            prompts.insert(name, body);
        }
        prompts
    }

    /// Register or replace a template.
    pub fn insert(&mut self, name: &str, body: &str) {
        self.templates.insert(name.to_string(), body.to_string());
    }

    /// Register or replace a template, builder-style.
    pub fn with_template(mut self, name: &str, body: &str) -> Self {
        self.insert(name, body);
        self
    }

    /// Whether a template with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl PromptProvider for StaticPrompts {
    fn format(&self, name: &str, args: &[(&str, &str)]) -> Result<String, TemplateError> {
        let body = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
            })?;
        render(name, body, args)
    }
}

/// Borrow owned argument pairs for [`PromptProvider::format`].
pub(crate) fn arg_refs<'a>(args: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a str)> {
    args.iter().map(|(key, value)| (*key, value.as_str())).collect()
}

/// Render a JSON value for embedding in a prompt.
pub(crate) fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Render a template body against named arguments.
fn render(name: &str, body: &str, args: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut placeholder = String::new();
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    placeholder.push(inner);
                }
                let value = args
                    .iter()
                    .find(|(key, _)| *key == placeholder)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| TemplateError::MissingArgument {
                        template: name.to_string(),
                        argument: placeholder.clone(),
                    })?;
                out.push_str(value);
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

/// The default template set. Each body instructs the service to answer
/// with JSON under the exact top-level key its caller extracts.
fn builtin_templates() -> Vec<(&'static str, &'static str)> {
    let mut templates = vec![
        (
            "generate_phases",
            r#"You are decomposing a goal into implementation phases.

Goal: {goal}

Context:
{context}

Produce at most {max_phases} phases. Each phase needs a short name and a
one-paragraph description. Respond ONLY with JSON in this exact format:
{{"phases": [{{"name": "...", "description": "..."}}]}}"#,
        ),
        (
            "generate_tasks",
            r#"You are decomposing one phase of a plan into tasks.

Goal: {goal}
Phase: {phase_name}
Phase description: {phase_description}

Context:
{context}

Produce at most {max_tasks} tasks for this phase. Respond ONLY with JSON in
this exact format:
{{"tasks": [{{"name": "...", "description": "..."}}]}}"#,
        ),
        (
            "generate_steps",
            r#"You are writing the concrete steps for one task of a plan.

Goal: {goal}
Phase: {phase_name}
Task: {task_name}
Task description: {task_description}

Context:
{context}

Produce at most {max_steps} steps. Each step is an actionable instruction.
Respond ONLY with JSON in this exact format:
{{"steps": [{{"step_id": "...", "prompt": "...", "description": "..."}}]}}"#,
        ),
        (
            "generate_phase_alternatives",
            r#"You are proposing one of {alternatives_count} independent phase
decompositions for a goal. Propose a complete, self-contained set of
phases; do not reference other proposals.

Goal: {goal}

Context:
{context}

Use at most {max_phases} phases. Respond ONLY with JSON in this exact
format, where each inner list is one complete candidate decomposition:
{{"alternatives": [[{{"name": "...", "description": "..."}}]]}}"#,
        ),
        (
            "generate_task_alternatives",
            r#"You are proposing one of {alternatives_count} independent task
breakdowns for a phase. Propose a complete, self-contained set of tasks;
do not reference other proposals.

Goal: {goal}
Phase: {phase_name}
Phase description: {phase_description}

Context:
{context}

Use at most {max_tasks} tasks. Respond ONLY with JSON in this exact
format, where each inner list is one complete candidate breakdown:
{{"alternatives": [[{{"name": "...", "description": "..."}}]]}}"#,
        ),
        (
            "justify_phase_selection",
            r#"A phase decomposition was chosen from several candidates.

Goal: {goal}

Candidates:
{alternatives}

Evaluations:
{evaluations}

Candidate {best_idx} was selected. In a short paragraph of plain text,
explain why it is the strongest choice for this goal."#,
        ),
        (
            "justify_task_selection",
            r#"A task breakdown was chosen from several candidates.

Goal: {goal}

Candidates:
{alternatives}

Evaluations:
{evaluations}

Candidate {best_idx} was selected. In a short paragraph of plain text,
explain why it is the strongest choice for this goal."#,
        ),
        (
            "revise_steps",
            r#"A council of reviewers critiqued the steps below. Revise the steps to
address the critiques while keeping their intent and order.

Context:
{context}

Original steps:
{steps}

Critiques:
{critiques}

Respond ONLY with JSON in this exact format, keeping step_id values where
they exist:
{{"revised_steps": [{{"step_id": "...", "prompt": "..."}}]}}"#,
        ),
        (
            "qa_validate_checklist",
            r#"Assess the quality of this checklist against the criteria below.

Criteria:
{criteria}

Checklist:
{checklist}

Score from 0.0 to 1.0. Respond ONLY with JSON in this exact format:
{{"validation_results": {{"score": 0.0, "feedback": "...", "issues": [], "suggestions": []}}}}"#,
        ),
    ];

    templates.extend(evaluation_templates());
    templates
}

/// Build one evaluation template body at compile time.
macro_rules! evaluation_body {
    ($subject:literal, $focus:literal) => {
        concat!(
            "Evaluate this candidate ",
            $subject,
            " for the ",
            $focus,
            ".\n\nGoal: {goal}\n\nCandidate:\n{alternative}\n\n",
            "Score from 0.0 (worst) to 1.0 (best). Respond ONLY with JSON in this\n",
            "exact format:\n",
            "{{\"evaluation\": {{\"score\": 0.0, \"justification\": \"...\"}}}}"
        )
    };
}

/// Evaluation templates, one per (node type, default criterion) pair.
fn evaluation_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "evaluate_phase_risks",
            evaluation_body!("phase decomposition", "risks it carries: failure modes, dependencies on unknowns, irreversible choices"),
        ),
        (
            "evaluate_phase_coherence",
            evaluation_body!("phase decomposition", "coherence: whether the phases form a logical, well-ordered progression"),
        ),
        (
            "evaluate_phase_completeness",
            evaluation_body!("phase decomposition", "completeness: whether anything the goal requires is missing"),
        ),
        (
            "evaluate_phase_clarity",
            evaluation_body!("phase decomposition", "clarity: whether each phase is unambiguous and actionable"),
        ),
        (
            "evaluate_task_risks",
            evaluation_body!("task breakdown", "risks it carries: failure modes, dependencies on unknowns, irreversible choices"),
        ),
        (
            "evaluate_task_coherence",
            evaluation_body!("task breakdown", "coherence: whether the tasks form a logical, well-ordered progression"),
        ),
        (
            "evaluate_task_completeness",
            evaluation_body!("task breakdown", "completeness: whether anything the phase requires is missing"),
        ),
        (
            "evaluate_task_clarity",
            evaluation_body!("task breakdown", "clarity: whether each task is unambiguous and actionable"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_core_template_names() {
        let prompts = StaticPrompts::builtin();
        for name in [
            "generate_phases",
            "generate_tasks",
            "generate_steps",
            "generate_phase_alternatives",
            "generate_task_alternatives",
            "evaluate_phase_risks",
            "evaluate_task_clarity",
            "justify_phase_selection",
            "justify_task_selection",
            "revise_steps",
            "qa_validate_checklist",
        ] {
            assert!(prompts.contains(name), "missing builtin template {name}");
        }
    }

    #[test]
    fn format_substitutes_named_arguments() {
        let prompts = StaticPrompts::new().with_template("greet", "Hello {name}, goal is {goal}");
        let out = prompts
            .format("greet", &[("name", "reviewer"), ("goal", "ship it")])
            .unwrap();
        assert_eq!(out, "Hello reviewer, goal is ship it");
    }

    #[test]
    fn format_ignores_extra_arguments() {
        let prompts = StaticPrompts::new().with_template("t", "only {a}");
        let out = prompts.format("t", &[("a", "1"), ("unused", "2")]).unwrap();
        assert_eq!(out, "only 1");
    }

    #[test]
    fn missing_template_fails_with_not_found() {
        let prompts = StaticPrompts::new();
        let err = prompts.format("nope", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { name } if name == "nope"));
    }

    #[test]
    fn missing_argument_names_the_placeholder() {
        let prompts = StaticPrompts::new().with_template("t", "needs {goal} and {context}");
        let err = prompts.format("t", &[("goal", "x")]).unwrap_err();
        match err {
            TemplateError::MissingArgument { template, argument } => {
                assert_eq!(template, "t");
                assert_eq!(argument, "context");
            }
            other => panic!("expected MissingArgument, got {other}"),
        }
    }

    #[test]
    fn doubled_braces_render_as_literals() {
        let prompts = StaticPrompts::new().with_template("t", r#"{{"key": "{value}"}}"#);
        let out = prompts.format("t", &[("value", "v")]).unwrap();
        assert_eq!(out, r#"{"key": "v"}"#);
    }

    #[test]
    fn builtin_phase_template_renders_json_example() {
        let prompts = StaticPrompts::builtin();
        let out = prompts
            .format(
                "generate_phases",
                &[("goal", "build a compiler"), ("context", "{}"), ("max_phases", "7")],
            )
            .unwrap();
        assert!(out.contains("build a compiler"));
        assert!(out.contains(r#"{"phases":"#));
        assert!(!out.contains("{goal}"));
    }

    #[test]
    fn builtin_evaluation_template_renders() {
        let prompts = StaticPrompts::builtin();
        let out = prompts
            .format(
                "evaluate_phase_coherence",
                &[("goal", "g"), ("alternative", "[]")],
            )
            .unwrap();
        assert!(out.contains(r#"{"evaluation":"#));
    }
}
