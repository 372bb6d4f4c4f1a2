//! Task planner
//!
//! Converts a free-text task description into an executable [`Plan`] by
//! consulting the reasoning service twice: once to analyze the task, once to
//! decompose it into subtasks. Both consultations tolerate unstructured
//! output — analysis falls back to a documented default and decomposition
//! falls back to a single step wrapping the whole description verbatim.
//!
//! Dependency policy is currently a strict linear chain: step *i* depends
//! only on step *i-1*. The `HashMap<StepId, Vec<StepId>>` representation is
//! deliberately more general so a future decomposition can emit non-linear
//! graphs without changing the executor contract.

use crate::llm::{parse_structured, Parsed, ReasoningService};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Default retry budget per step
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base duration estimate per step, in seconds
const BASE_STEP_SECS: u64 = 30;

/// Extra duration estimate for steps using a complex tool, in seconds
const COMPLEX_TOOL_SECS: u64 = 20;

/// Tools whose steps get the extra duration estimate
const COMPLEX_TOOLS: &[&str] = &["web_search", "code_executor"];

/// Task complexity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Task risk classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Structured task analysis produced by the reasoning service
///
/// When the reasoning output does not parse, [`Analysis::fallback`] supplies
/// the documented default (`type=general, complexity=medium, risk=low`) and
/// retains the raw text for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Kind of task (research, analysis, creation, ...)
    #[serde(rename = "type", default = "default_task_type")]
    pub task_type: String,

    /// Estimated complexity
    #[serde(default = "default_complexity")]
    pub complexity: Complexity,

    /// Tools the task is expected to need
    #[serde(default)]
    pub requires_tools: Vec<String>,

    /// Estimated number of steps
    #[serde(default = "default_estimated_steps")]
    pub estimated_steps: u32,

    /// Risk classification
    #[serde(default)]
    pub risk_level: RiskLevel,

    /// Anticipated difficulties
    #[serde(default)]
    pub key_challenges: Vec<String>,

    /// What success looks like
    #[serde(default)]
    pub success_criteria: Vec<String>,

    /// Raw reasoning text, retained when structured parsing failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            task_type: default_task_type(),
            complexity: default_complexity(),
            requires_tools: Vec::new(),
            estimated_steps: default_estimated_steps(),
            risk_level: RiskLevel::Low,
            key_challenges: Vec::new(),
            success_criteria: Vec::new(),
            raw_analysis: None,
        }
    }
}

impl Analysis {
    /// The documented fallback analysis, keeping the unparseable text
    pub fn fallback(raw: String) -> Self {
        Self {
            raw_analysis: Some(raw),
            ..Self::default()
        }
    }
}

fn default_task_type() -> String {
    "general".to_string()
}

fn default_complexity() -> Complexity {
    Complexity::Medium
}

fn default_estimated_steps() -> u32 {
    3
}

/// Lifecycle state of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One unit of planned work
///
/// `status` and `retries` are mutated in place by the executor; everything
/// else is fixed at planning time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, unique within the plan
    pub id: String,

    /// 1-based position in the plan
    pub order: u32,

    /// What this step accomplishes
    pub description: String,

    /// Specific action to perform
    pub action: String,

    /// Tool to invoke; a tool-less step goes to the reasoning service
    pub tool: Option<String>,

    /// Tool inputs; values may be `{"$ref": "step_id.field"}` references
    pub inputs: HashMap<String, serde_json::Value>,

    /// Expected result of the step
    pub expected_output: String,

    /// Current lifecycle state
    pub status: StepStatus,

    /// Retries consumed so far; never exceeds `max_retries`
    pub retries: u32,

    /// Retry budget
    pub max_retries: u32,

    /// Optional steps may fail without stopping the plan
    #[serde(default)]
    pub optional: bool,
}

/// Plan metadata mirrored from the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub complexity: Complexity,
    pub requires_tools: Vec<String>,
    pub risk_level: RiskLevel,
}

/// The structured output of planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Original task description
    pub task: String,

    /// Structured (or fallback) task analysis
    pub analysis: Analysis,

    /// Ordered steps
    pub steps: Vec<Step>,

    /// Dependency map: step id -> ids it depends on. Every id referenced
    /// here exists in `steps`.
    pub dependencies: HashMap<String, Vec<String>>,

    /// Rough duration estimate in seconds
    pub estimated_duration_secs: u64,

    /// Planning timestamp
    pub created_at: DateTime<Utc>,

    /// Metadata mirrored from the analysis
    pub metadata: PlanMetadata,

    /// Set when a failure-driven replan touched this plan
    #[serde(default)]
    pub replanned: bool,

    /// Error message that triggered the replan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replan_reason: Option<String>,
}

/// Intermediate deserialization type for decomposition output
#[derive(Debug, Deserialize)]
struct RawSubtask {
    id: Option<String>,
    description: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    inputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct Decomposition {
    subtasks: Vec<RawSubtask>,
}

/// Hierarchical task planner backed by the reasoning service
pub struct TaskPlanner {
    reasoner: Arc<dyn ReasoningService>,

    /// Non-authoritative log of produced plans, for introspection only
    planning_history: Vec<Plan>,
}

impl TaskPlanner {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self {
            reasoner,
            planning_history: Vec::new(),
        }
    }

    /// Create a detailed execution plan for a task
    ///
    /// Analysis and decomposition each consult the reasoning service once;
    /// either consultation may degrade to its documented fallback without
    /// failing the call. Only transport-level reasoning errors propagate.
    pub async fn create_plan(
        &mut self,
        description: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<Plan> {
        info!("Creating execution plan");

        let analysis = self.analyze_task(description, context).await?;
        let subtasks = self.decompose_task(description, &analysis).await?;

        let steps = build_steps(subtasks);
        let dependencies = chain_dependencies(&steps);
        let estimated_duration_secs = estimate_duration(&steps);

        let plan = Plan {
            task: description.to_string(),
            analysis: analysis.clone(),
            steps,
            dependencies,
            estimated_duration_secs,
            created_at: Utc::now(),
            metadata: PlanMetadata {
                complexity: analysis.complexity,
                requires_tools: analysis.requires_tools.clone(),
                risk_level: analysis.risk_level,
            },
            replanned: false,
            replan_reason: None,
        };

        self.planning_history.push(plan.clone());
        info!("Plan created with {} steps", plan.steps.len());

        Ok(plan)
    }

    /// Replan after a step failure
    ///
    /// Consults the reasoning service for an alternative approach, but
    /// currently returns the *same* plan with only `replanned` and
    /// `replan_reason` set — the steps are not restructured. Incomplete
    /// relative to its name; the consultation response is logged and
    /// discarded.
    pub async fn replan(&self, current_plan: &Plan, failed_step: &Step, error: &str) -> Result<Plan> {
        warn!("Replanning after failure of {}", failed_step.id);

        let prompt = format!(
            "A step has failed. Propose an alternative approach or a correction.\n\n\
            Original plan:\n{}\n\n\
            Failed step:\n{}\n\n\
            Error: {}",
            serde_json::to_string_pretty(current_plan)?,
            serde_json::to_string_pretty(failed_step)?,
            error
        );

        let advice = self.reasoner.complete(&prompt, None).await?;
        info!("Replan advice received ({} chars)", advice.len());

        let mut new_plan = current_plan.clone();
        new_plan.replanned = true;
        new_plan.replan_reason = Some(error.to_string());

        Ok(new_plan)
    }

    /// Plans produced so far, oldest first
    pub fn history(&self) -> &[Plan] {
        &self.planning_history
    }

    /// Analyze the task to understand its nature and requirements
    async fn analyze_task(
        &self,
        description: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<Analysis> {
        let prompt = format!(
            "Analyze this task in detail:\n\n\
            Task: {}\n\n\
            Provide a structured analysis as a JSON object:\n\
            {{\n\
                \"type\": \"kind of task (research, analysis, creation, ...)\",\n\
                \"complexity\": \"simple|medium|complex\",\n\
                \"requires_tools\": [\"list of required tools\"],\n\
                \"estimated_steps\": 3,\n\
                \"risk_level\": \"low|medium|high\",\n\
                \"key_challenges\": [\"challenge 1\", \"challenge 2\"],\n\
                \"success_criteria\": [\"criterion 1\", \"criterion 2\"]\n\
            }}\n\n\
            Output ONLY the JSON object.",
            description
        );

        let response = self.reasoner.complete(&prompt, context).await?;

        match parse_structured::<Analysis>(&response) {
            Parsed::Structured(analysis) => Ok(analysis),
            Parsed::Raw(raw) => {
                warn!("Task analysis did not parse as JSON, using default analysis");
                Ok(Analysis::fallback(raw))
            }
        }
    }

    /// Decompose the task into manageable subtasks
    async fn decompose_task(
        &self,
        description: &str,
        analysis: &Analysis,
    ) -> Result<Vec<RawSubtask>> {
        let prompt = format!(
            "Decompose this task into simple, actionable subtasks:\n\n\
            Main task: {}\n\n\
            Analysis:\n{}\n\n\
            Provide a structured decomposition as a JSON object:\n\
            {{\n\
                \"subtasks\": [\n\
                    {{\n\
                        \"id\": \"step_1\",\n\
                        \"description\": \"what the subtask accomplishes\",\n\
                        \"action\": \"specific action to perform\",\n\
                        \"tool\": \"tool to use (or null)\",\n\
                        \"inputs\": {{}},\n\
                        \"expected_output\": \"what should be produced\"\n\
                    }}\n\
                ]\n\
            }}\n\n\
            Principles:\n\
            - Each subtask must be simple and clear\n\
            - Logical execution order\n\
            - Each subtask must have a measurable result\n\n\
            Output ONLY the JSON object.",
            description,
            serde_json::to_string_pretty(analysis)?
        );

        let response = self.reasoner.complete(&prompt, None).await?;

        match parse_structured::<Decomposition>(&response) {
            Parsed::Structured(decomposition) if !decomposition.subtasks.is_empty() => {
                Ok(decomposition.subtasks)
            }
            _ => {
                warn!("Decomposition did not parse, falling back to a single step");
                Ok(vec![RawSubtask {
                    id: None,
                    description: description.to_string(),
                    action: Some("execute".to_string()),
                    tool: None,
                    inputs: HashMap::new(),
                    expected_output: Some("Result of the task".to_string()),
                    optional: false,
                }])
            }
        }
    }
}

/// Build execution steps from raw subtasks
///
/// Assigns 1-based `order`, defaults missing ids to `step_{order}`, and
/// initializes the executor-owned fields.
fn build_steps(subtasks: Vec<RawSubtask>) -> Vec<Step> {
    subtasks
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let order = (i + 1) as u32;
            Step {
                id: raw.id.unwrap_or_else(|| format!("step_{}", order)),
                order,
                description: raw.description,
                action: raw.action.unwrap_or_else(|| "execute".to_string()),
                tool: raw.tool,
                inputs: raw.inputs,
                expected_output: raw.expected_output.unwrap_or_default(),
                status: StepStatus::Pending,
                retries: 0,
                max_retries: DEFAULT_MAX_RETRIES,
                optional: raw.optional,
            }
        })
        .collect()
}

/// Identify dependencies between steps
///
/// Current policy is a strict linear chain: each step depends on the one
/// before it, the first on nothing. Any richer structure a decomposition
/// might imply is discarded here.
fn chain_dependencies(steps: &[Step]) -> HashMap<String, Vec<String>> {
    let mut dependencies = HashMap::new();

    for (i, step) in steps.iter().enumerate() {
        let deps = if i > 0 {
            vec![steps[i - 1].id.clone()]
        } else {
            Vec::new()
        };
        dependencies.insert(step.id.clone(), deps);
    }

    dependencies
}

/// Estimate execution duration in seconds
fn estimate_duration(steps: &[Step]) -> u64 {
    let mut total = steps.len() as u64 * BASE_STEP_SECS;

    for step in steps {
        if let Some(tool) = &step.tool {
            if COMPLEX_TOOLS.contains(&tool.as_str()) {
                total += COMPLEX_TOOL_SECS;
            }
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedReasoner;

    const ANALYSIS_JSON: &str = r#"{
        "type": "research",
        "complexity": "complex",
        "requires_tools": ["web_search"],
        "estimated_steps": 3,
        "risk_level": "medium",
        "key_challenges": ["source quality"],
        "success_criteria": ["report produced"]
    }"#;

    const DECOMPOSITION_JSON: &str = r#"{
        "subtasks": [
            {"id": "step_1", "description": "Search the market", "action": "search", "tool": "web_search", "inputs": {"query": "eu saas market"}, "expected_output": "Search results"},
            {"description": "Summarize findings", "action": "summarize", "tool": null, "inputs": {}, "expected_output": "Summary"},
            {"description": "Write report", "action": "write", "tool": "file_operations", "inputs": {}, "expected_output": "Report file"}
        ]
    }"#;

    async fn plan_with(responses: Vec<&str>) -> Plan {
        let reasoner = Arc::new(ScriptedReasoner::new(responses));
        let mut planner = TaskPlanner::new(reasoner);
        planner
            .create_plan("Research the EU SaaS market", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_linear_dependency_chain() {
        let plan = plan_with(vec![ANALYSIS_JSON, DECOMPOSITION_JSON]).await;

        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.dependencies[&plan.steps[0].id], Vec::<String>::new());
        assert_eq!(plan.dependencies[&plan.steps[1].id], vec![plan.steps[0].id.clone()]);
        assert_eq!(plan.dependencies[&plan.steps[2].id], vec![plan.steps[1].id.clone()]);
    }

    #[tokio::test]
    async fn test_every_dependency_id_exists() {
        let plan = plan_with(vec![ANALYSIS_JSON, DECOMPOSITION_JSON]).await;

        let ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        for (id, deps) in &plan.dependencies {
            assert!(ids.contains(&id.as_str()));
            for dep in deps {
                assert!(ids.contains(&dep.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn test_step_defaults() {
        let plan = plan_with(vec![ANALYSIS_JSON, DECOMPOSITION_JSON]).await;

        // Missing ids default to step_{order}
        assert_eq!(plan.steps[1].id, "step_2");
        assert_eq!(plan.steps[2].id, "step_3");

        for (i, step) in plan.steps.iter().enumerate() {
            assert_eq!(step.order, (i + 1) as u32);
            assert_eq!(step.status, StepStatus::Pending);
            assert_eq!(step.retries, 0);
            assert_eq!(step.max_retries, DEFAULT_MAX_RETRIES);
        }
    }

    #[tokio::test]
    async fn test_duration_estimate_counts_complex_tools() {
        let plan = plan_with(vec![ANALYSIS_JSON, DECOMPOSITION_JSON]).await;

        // 3 steps * 30s + 20s for the single web_search step
        assert_eq!(plan.estimated_duration_secs, 110);
    }

    #[tokio::test]
    async fn test_analysis_parses_structured_fields() {
        let plan = plan_with(vec![ANALYSIS_JSON, DECOMPOSITION_JSON]).await;

        assert_eq!(plan.analysis.task_type, "research");
        assert_eq!(plan.analysis.complexity, Complexity::Complex);
        assert_eq!(plan.analysis.risk_level, RiskLevel::Medium);
        assert_eq!(plan.metadata.requires_tools, vec!["web_search"]);
        assert!(plan.analysis.raw_analysis.is_none());
    }

    #[tokio::test]
    async fn test_analysis_fallback_on_unparseable_output() {
        let plan = plan_with(vec![
            "I think this task is quite interesting but I cannot say more.",
            DECOMPOSITION_JSON,
        ])
        .await;

        assert_eq!(plan.analysis.task_type, "general");
        assert_eq!(plan.analysis.complexity, Complexity::Medium);
        assert_eq!(plan.analysis.risk_level, RiskLevel::Low);
        assert!(plan
            .analysis
            .raw_analysis
            .as_deref()
            .unwrap()
            .contains("interesting"));
    }

    #[tokio::test]
    async fn test_decomposition_fallback_single_verbatim_step() {
        let plan = plan_with(vec![ANALYSIS_JSON, "no json here either"]).await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].id, "step_1");
        assert_eq!(plan.steps[0].description, "Research the EU SaaS market");
        assert!(plan.steps[0].tool.is_none());
        assert_eq!(plan.dependencies["step_1"], Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_empty_subtask_list_falls_back() {
        let plan = plan_with(vec![ANALYSIS_JSON, r#"{"subtasks": []}"#]).await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "Research the EU SaaS market");
    }

    #[tokio::test]
    async fn test_planning_history_grows() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            ANALYSIS_JSON,
            DECOMPOSITION_JSON,
            ANALYSIS_JSON,
            DECOMPOSITION_JSON,
        ]));
        let mut planner = TaskPlanner::new(reasoner);

        planner.create_plan("task one", None).await.unwrap();
        planner.create_plan("task two", None).await.unwrap();

        assert_eq!(planner.history().len(), 2);
        assert_eq!(planner.history()[0].task, "task one");
        assert_eq!(planner.history()[1].task, "task two");
    }

    #[tokio::test]
    async fn test_replan_sets_flags_without_restructuring() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            ANALYSIS_JSON,
            DECOMPOSITION_JSON,
            "Try a different search engine.",
        ]));
        let mut planner = TaskPlanner::new(Arc::clone(&reasoner) as Arc<dyn ReasoningService>);

        let plan = planner
            .create_plan("Research the EU SaaS market", None)
            .await
            .unwrap();
        let failed = plan.steps[0].clone();

        let replanned = planner
            .replan(&plan, &failed, "web_search returned no results")
            .await
            .unwrap();

        assert!(replanned.replanned);
        assert_eq!(
            replanned.replan_reason.as_deref(),
            Some("web_search returned no results")
        );
        // Steps are untouched
        assert_eq!(replanned.steps.len(), plan.steps.len());
        assert_eq!(replanned.steps[0].id, plan.steps[0].id);
    }

    #[tokio::test]
    async fn test_reasoning_failure_propagates() {
        let reasoner = Arc::new(ScriptedReasoner::unavailable());
        let mut planner = TaskPlanner::new(reasoner);

        let result = planner.create_plan("anything", None).await;
        assert!(result.is_err());
    }
}
