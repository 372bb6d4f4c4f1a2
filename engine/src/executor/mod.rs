//! Task executor
//!
//! Consumes a [`Plan`] and runs its steps in stored order, respecting the
//! dependency map. A step whose dependencies are not all completed is
//! *skipped* — no result is recorded and no error is raised. Tool steps
//! resolve `$ref` inputs against prior results and dispatch through the
//! registry; tool-less steps consult the reasoning service with a digest of
//! what happened so far.
//!
//! Failure handling: everything that goes wrong inside a single step (unknown
//! tool, tool error, reasoning error) is recovered into that step's
//! [`StepResult`]. A failing non-optional step is retried in place — the last
//! result is replaced, not appended — until it succeeds or its retry budget
//! is exhausted, at which point the remaining plan is abandoned without an
//! error. Only an error escaping the per-step boundary fails the whole
//! `execute_plan` call.

use crate::llm::ReasoningService;
use crate::planner::{Plan, Step, StepStatus};
use crate::tools::ToolRegistry;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sdk::types::ToolInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Characters of each prior output shown in the reasoning digest
const RESULT_PREVIEW_CHARS: usize = 100;

/// Recorded outcome of one step execution attempt
///
/// A retry overwrites the previous entry for its step rather than appending
/// a new one, so the result list holds at most one entry per executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Id of the step this result belongs to
    pub step_id: String,

    /// Step description, copied for self-contained records
    pub description: String,

    /// When the attempt started
    pub started_at: DateTime<Utc>,

    /// When the attempt finished
    pub finished_at: DateTime<Utc>,

    /// Whether the attempt succeeded
    pub success: bool,

    /// Tool or reasoning output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Error message when the attempt failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status of a plan execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// Introspection record for one `execute_plan` call
///
/// Only one execution is tracked at a time; completed records move to the
/// history. A plan that stops early on retry exhaustion still finishes as
/// `Completed` — "ran to the end" and "succeeded" are conflated here, a
/// documented modeling gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub started_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes plans produced by the planner
pub struct TaskExecutor {
    /// Tool registry for dispatching tool steps
    tools: Arc<ToolRegistry>,

    /// Fallback "thinking" path for tool-less steps
    reasoner: Arc<dyn ReasoningService>,

    /// Records of finished executions, oldest first
    execution_history: Vec<ExecutionRecord>,

    /// Record of the execution in flight, if any
    current_execution: Option<ExecutionRecord>,
}

impl TaskExecutor {
    pub fn new(tools: Arc<ToolRegistry>, reasoner: Arc<dyn ReasoningService>) -> Self {
        Self {
            tools,
            reasoner,
            execution_history: Vec::new(),
            current_execution: None,
        }
    }

    /// Execute a complete plan
    ///
    /// Returns one result per executed step, in execution order. Skipped
    /// steps leave no trace in the result list. Steps are mutated in place
    /// (`status`, `retries`).
    pub async fn execute_plan(&mut self, plan: &mut Plan) -> Result<Vec<StepResult>> {
        info!("Starting execution of {} steps", plan.steps.len());

        self.current_execution = Some(ExecutionRecord {
            started_at: Utc::now(),
            status: ExecutionStatus::Running,
            finished_at: None,
            error: None,
        });

        let outcome = self.run_steps(plan).await;

        if let Some(mut record) = self.current_execution.take() {
            record.finished_at = Some(Utc::now());
            match &outcome {
                Ok(_) => record.status = ExecutionStatus::Completed,
                Err(e) => {
                    record.status = ExecutionStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
            self.execution_history.push(record);
        }

        outcome
    }

    /// Status of the execution currently in flight
    pub fn current_execution(&self) -> Option<&ExecutionRecord> {
        self.current_execution.as_ref()
    }

    /// Finished execution records, oldest first
    pub fn history(&self) -> &[ExecutionRecord] {
        &self.execution_history
    }

    async fn run_steps(&mut self, plan: &mut Plan) -> Result<Vec<StepResult>> {
        let mut results: Vec<StepResult> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();

        for step in plan.steps.iter_mut() {
            // Check dependencies against the completed set. An unmet
            // dependency silently drops the step; see the design notes.
            let deps = plan.dependencies.get(&step.id).cloned().unwrap_or_default();
            if !deps.iter().all(|dep| completed.contains(dep)) {
                warn!("Unmet dependencies for {}, skipping step", step.id);
                continue;
            }

            info!("Executing: {}", step.description);
            step.status = StepStatus::Running;

            let mut result = self.execute_step(step, &results).await;
            results.push(result.clone());

            if result.success {
                step.status = StepStatus::Completed;
                completed.insert(step.id.clone());
                info!("Step {} completed", step.id);
                continue;
            }

            step.status = StepStatus::Failed;
            error!(
                "Step {} failed: {}",
                step.id,
                result.error.as_deref().unwrap_or("unknown error")
            );

            if step.optional {
                continue;
            }

            // Retry in place, replacing the last result each time
            while !result.success && step.retries < step.max_retries {
                step.retries += 1;
                info!("Retry {}/{} for {}", step.retries, step.max_retries, step.id);

                step.status = StepStatus::Running;
                result = self.execute_step(step, &results[..results.len() - 1]).await;

                if let Some(last) = results.last_mut() {
                    *last = result.clone();
                }
            }

            if result.success {
                step.status = StepStatus::Completed;
                completed.insert(step.id.clone());
            } else {
                step.status = StepStatus::Failed;
                error!("Retry budget exhausted for {}, aborting plan", step.id);
                break;
            }
        }

        Ok(results)
    }

    /// Execute a single step, recovering every failure into the result
    async fn execute_step(&self, step: &Step, previous: &[StepResult]) -> StepResult {
        let started_at = Utc::now();

        let outcome = match &step.tool {
            Some(tool_name) => self.execute_with_tool(tool_name, &step.inputs, previous).await,
            None => self
                .execute_with_thinking(step, previous)
                .await
                .map(Value::String),
        };

        let finished_at = Utc::now();

        match outcome {
            Ok(output) => StepResult {
                step_id: step.id.clone(),
                description: step.description.clone(),
                started_at,
                finished_at,
                success: true,
                output: Some(output),
                error: None,
            },
            Err(e) => StepResult {
                step_id: step.id.clone(),
                description: step.description.clone(),
                started_at,
                finished_at,
                success: false,
                output: None,
                error: Some(e),
            },
        }
    }

    /// Execute a step through a registered tool
    async fn execute_with_tool(
        &self,
        tool_name: &str,
        inputs: &HashMap<String, Value>,
        previous: &[StepResult],
    ) -> std::result::Result<Value, String> {
        let resolved = resolve_inputs(inputs, previous);

        debug!("Using tool: {}", tool_name);

        let output = self
            .tools
            .execute(tool_name, ToolInput::from_map(resolved))
            .await
            .map_err(|e| e.to_string())?;

        if output.success {
            Ok(output.data)
        } else {
            Err(output
                .error
                .unwrap_or_else(|| format!("Tool {} reported failure", tool_name)))
        }
    }

    /// Execute a step by asking the reasoning service
    async fn execute_with_thinking(
        &self,
        step: &Step,
        previous: &[StepResult],
    ) -> std::result::Result<String, String> {
        let inputs =
            serde_json::to_string(&step.inputs).unwrap_or_else(|_| "{}".to_string());

        let prompt = format!(
            "Execute this step:\n\n\
            Description: {}\n\
            Action: {}\n\
            Inputs: {}\n\n\
            Previous results:\n{}\n\n\
            Provide a clear, actionable response.",
            step.description,
            step.action,
            inputs,
            format_previous_results(previous)
        );

        debug!("Thinking through step {}", step.id);

        self.reasoner
            .complete(&prompt, None)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Resolve `$ref` inputs against prior results
///
/// Any value shaped as `{"$ref": "step_id.field.subfield"}` is replaced by
/// the referenced value; everything else passes through untouched.
fn resolve_inputs(
    inputs: &HashMap<String, Value>,
    previous: &[StepResult],
) -> HashMap<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| {
            let resolved = match value
                .as_object()
                .and_then(|obj| obj.get("$ref"))
                .and_then(|r| r.as_str())
            {
                Some(path) => resolve_reference(path, previous),
                None => value.clone(),
            };
            (key.clone(), resolved)
        })
        .collect()
}

/// Resolve a dotted reference path against prior results
///
/// Format: `step_id.field.subfield`. A missing step id or missing field
/// yields JSON null, silently.
fn resolve_reference(path: &str, previous: &[StepResult]) -> Value {
    let mut parts = path.split('.');
    let step_id = parts.next().unwrap_or_default();

    for result in previous {
        if result.step_id == step_id {
            let mut value = serde_json::to_value(result).unwrap_or(Value::Null);
            for part in parts {
                value = value.get(part).cloned().unwrap_or(Value::Null);
            }
            return value;
        }
    }

    Value::Null
}

/// Render prior results as a bounded-length digest for prompts
fn format_previous_results(results: &[StepResult]) -> String {
    if results.is_empty() {
        return "No previous results".to_string();
    }

    results
        .iter()
        .map(|result| {
            let rendered = match &result.output {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "N/A".to_string(),
            };
            let preview: String = rendered.chars().take(RESULT_PREVIEW_CHARS).collect();
            format!("- {}: {}", result.step_id, preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
