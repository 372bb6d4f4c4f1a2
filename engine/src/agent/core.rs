//! Agent core
//!
//! The thin coordinating layer: description → plan → execute → synthesize →
//! store in memory. The agent enforces at most one in-flight task — a second
//! concurrent `run_task` fails immediately with a re-entrancy error instead
//! of queueing. Every other task-level failure is caught and converted into
//! a structured report; nothing crashes the caller.

use crate::agent::roster::{AgentProfile, Roster};
use crate::agent::store::TaskStore;
use crate::executor::{StepResult, TaskExecutor};
use crate::llm::{parse_structured, Parsed, ReasoningService};
use crate::memory::{MemoryEntry, MemorySizes, MemoryStats, MemorySystem, MemoryExport};
use crate::planner::{Plan, TaskPlanner};
use crate::tools::ToolRegistry;
use anyhow::Result;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};
use uuid::Uuid;

/// Structured synthesis of a finished task
///
/// Produced by asking the reasoning service to fold the execution results
/// into a final answer. When the response is not parseable, the raw text
/// becomes the summary and the unprocessed results are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// What was accomplished; null marks the task as unsuccessful in memory
    #[serde(default)]
    pub summary: Option<String>,

    /// Key findings worth surfacing
    #[serde(default)]
    pub key_findings: Vec<String>,

    /// Structured data extracted from the results
    #[serde(default)]
    pub data: Value,

    /// Recommended follow-ups
    #[serde(default)]
    pub next_steps: Vec<String>,

    /// Raw execution results, attached when synthesis degraded to text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_results: Option<Value>,
}

/// Outcome of one `run_task` call
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Task record id
    pub task_id: String,

    /// Whether the pipeline ran to a synthesized result
    pub success: bool,

    /// Synthesized result, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SynthesisReport>,

    /// Error string, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The executed plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    /// Per-step results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Vec<StepResult>>,

    /// Wall-clock duration of the run
    pub duration_ms: i64,

    /// Profile that handled the task
    pub profile: String,
}

/// Live status of the agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub busy: bool,
    pub tasks_completed: u64,
    pub memory: MemorySizes,
    pub tools: Vec<String>,
    pub profiles: Vec<String>,
}

/// Snapshot of the memory system for status surfaces
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub sizes: MemorySizes,
    pub stats: MemoryStats,
    pub recent: Vec<MemoryEntry>,
}

/// Memory-augmented reasoning facade
///
/// Wraps the provider router: every completion gets the agent's system
/// prompt, the tool inventory, and up to `retrieval_limit` relevant memories
/// folded in front of the caller's prompt. This is the `ReasoningService`
/// the planner and executor actually consume.
pub struct Thinker {
    router: Arc<dyn ReasoningService>,
    memory: Arc<Mutex<MemorySystem>>,
    system_prompt: String,
    retrieval_limit: usize,
}

impl Thinker {
    pub fn new(
        router: Arc<dyn ReasoningService>,
        memory: Arc<Mutex<MemorySystem>>,
        system_prompt: String,
        retrieval_limit: usize,
    ) -> Self {
        Self {
            router,
            memory,
            system_prompt,
            retrieval_limit,
        }
    }
}

#[async_trait]
impl ReasoningService for Thinker {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&Value>,
    ) -> crate::llm::Result<String> {
        // Lock scope ends before the await below
        let memory_section = {
            let mut memory = self.memory.lock().expect("memory lock");
            let hits = memory.retrieve_relevant(prompt, self.retrieval_limit, None);
            if hits.is_empty() {
                String::new()
            } else {
                let lines = hits
                    .iter()
                    .map(|hit| format!("- {}", hit.summary()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("\n\nRelevant past experience:\n{}", lines)
            }
        };

        let full_prompt = format!("{}{}\n\nTask:\n{}", self.system_prompt, memory_section, prompt);

        self.router.complete(&full_prompt, context).await
    }
}

/// Autonomous task agent
pub struct Agent {
    name: String,
    thinker: Arc<Thinker>,
    planner: AsyncMutex<TaskPlanner>,
    executor: AsyncMutex<TaskExecutor>,
    memory: Arc<Mutex<MemorySystem>>,
    tools: Arc<ToolRegistry>,
    roster: Roster,
    store: Arc<TaskStore>,
    busy: AtomicBool,
    tasks_completed: AtomicU64,
}

impl Agent {
    /// Wire an agent from its parts
    pub fn new(
        name: impl Into<String>,
        router: Arc<dyn ReasoningService>,
        tools: Arc<ToolRegistry>,
        roster: Roster,
        store: Arc<TaskStore>,
        working_capacity: usize,
        retrieval_limit: usize,
    ) -> Self {
        let name = name.into();
        let memory = Arc::new(Mutex::new(MemorySystem::with_capacity(working_capacity)));

        let system_prompt = base_system_prompt(&name, &tools);
        let thinker = Arc::new(Thinker::new(
            router,
            Arc::clone(&memory),
            system_prompt,
            retrieval_limit,
        ));

        let planner = AsyncMutex::new(TaskPlanner::new(
            Arc::clone(&thinker) as Arc<dyn ReasoningService>
        ));
        let executor = AsyncMutex::new(TaskExecutor::new(
            Arc::clone(&tools),
            Arc::clone(&thinker) as Arc<dyn ReasoningService>,
        ));

        info!("Agent {} initialized", name);

        Self {
            name,
            thinker,
            planner,
            executor,
            memory,
            tools,
            roster,
            store,
            busy: AtomicBool::new(false),
            tasks_completed: AtomicU64::new(0),
        }
    }

    /// Build an agent from loaded configuration
    pub fn from_config(config: &crate::config::Config) -> Self {
        use crate::llm::anthropic::AnthropicProvider;
        use crate::llm::mock::MockProvider;
        use crate::llm::openai::OpenAIProvider;
        use crate::llm::router::ReasoningRouter;
        use crate::llm::LLMProvider;

        let providers: Vec<Box<dyn LLMProvider>> =
            if config.reasoning.default_provider == "mock" {
                vec![Box::new(MockProvider)]
            } else {
                vec![
                    Box::new(OpenAIProvider::new(config.reasoning.openai.clone())),
                    Box::new(AnthropicProvider::new(config.reasoning.anthropic.clone())),
                ]
            };

        let router = Arc::new(ReasoningRouter::new(
            providers,
            config.reasoning.default_provider.clone(),
        ));
        let tools = Arc::new(ToolRegistry::with_defaults(config));
        let roster = Roster::standard(
            &config.agents.default_profile,
            config.agents.selection_threshold,
        );

        Self::new(
            "Maestro",
            router,
            tools,
            roster,
            Arc::new(TaskStore::new()),
            config.memory.working_capacity,
            config.memory.retrieval_limit,
        )
    }

    /// Run a task autonomously, selecting the best-fitting profile
    ///
    /// Returns `Err(AgentBusy)` immediately when a task is already in
    /// flight; every other failure is folded into the returned report.
    pub async fn run_task(
        &self,
        description: &str,
        context: Option<Value>,
    ) -> Result<TaskReport, EngineError> {
        let profile = self.roster.select(description).clone();
        self.run_task_with_profile(description, context, profile).await
    }

    /// Run a task under an explicitly named profile
    pub async fn run_task_as(
        &self,
        profile_name: &str,
        description: &str,
        context: Option<Value>,
    ) -> Result<TaskReport, EngineError> {
        let profile = self
            .roster
            .get(profile_name)
            .ok_or_else(|| EngineError::AgentNotFound(profile_name.to_string()))?
            .clone();
        self.run_task_with_profile(description, context, profile).await
    }

    async fn run_task_with_profile(
        &self,
        description: &str,
        context: Option<Value>,
        profile: AgentProfile,
    ) -> Result<TaskReport, EngineError> {
        // Re-entrancy guard: one in-flight task per agent instance
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AgentBusy);
        }

        let start = Instant::now();
        let task_id = Uuid::new_v4().to_string();

        info!("Starting task {} as {}: {}", task_id, profile.name, description);
        self.store.create(&task_id, description);
        let _ = self.store.mark_running(&task_id);

        let outcome = self.execute_pipeline(description, context, &profile).await;

        let duration_ms = start.elapsed().as_millis() as i64;
        let report = match outcome {
            Ok((synthesis, plan, results)) => {
                let result_value = serde_json::to_value(&synthesis).unwrap_or(Value::Null);
                let _ = self.store.complete(&task_id, result_value);
                self.tasks_completed.fetch_add(1, Ordering::SeqCst);

                info!("Task {} completed in {}ms", task_id, duration_ms);
                TaskReport {
                    task_id,
                    success: true,
                    result: Some(synthesis),
                    error: None,
                    plan: Some(plan),
                    execution_results: Some(results),
                    duration_ms,
                    profile: profile.name.clone(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                let _ = self.store.fail(&task_id, &message);

                error!("Task {} failed: {}", task_id, message);
                TaskReport {
                    task_id,
                    success: false,
                    result: None,
                    error: Some(message),
                    plan: None,
                    execution_results: None,
                    duration_ms,
                    profile: profile.name.clone(),
                }
            }
        };

        self.busy.store(false, Ordering::SeqCst);
        Ok(report)
    }

    /// Plan, execute, synthesize, remember
    async fn execute_pipeline(
        &self,
        description: &str,
        context: Option<Value>,
        profile: &AgentProfile,
    ) -> Result<(SynthesisReport, Plan, Vec<StepResult>)> {
        // Fold the selected persona into the structured context
        let mut ctx = match context {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("context".to_string(), other);
                map
            }
            None => serde_json::Map::new(),
        };
        ctx.insert(
            "agent_personality".to_string(),
            Value::String(profile.system_prompt()),
        );
        let ctx = Value::Object(ctx);

        info!("Planning phase");
        let mut plan = self
            .planner
            .lock()
            .await
            .create_plan(description, Some(&ctx))
            .await?;

        info!("Execution phase ({} steps)", plan.steps.len());
        let results = self.executor.lock().await.execute_plan(&mut plan).await?;

        info!("Synthesis phase");
        let synthesis = self.synthesize(description, &results).await?;

        {
            let mut memory = self.memory.lock().expect("memory lock");
            memory.store_task(
                description,
                serde_json::to_value(&plan)?,
                serde_json::to_value(&results)?,
                serde_json::to_value(&synthesis)?,
            );
        }

        Ok((synthesis, plan, results))
    }

    /// Fold execution results into a final report via the reasoning service
    async fn synthesize(
        &self,
        description: &str,
        results: &[StepResult],
    ) -> Result<SynthesisReport> {
        let results_json = serde_json::to_value(results)?;

        let prompt = format!(
            "Original task: {}\n\n\
            Execution results:\n{}\n\n\
            Synthesize these results into a clear, complete answer.\n\
            Response format (JSON):\n\
            {{\n\
                \"summary\": \"what was accomplished\",\n\
                \"key_findings\": [\"key point 1\", \"key point 2\"],\n\
                \"data\": {{}},\n\
                \"next_steps\": [\"recommendation 1\", \"recommendation 2\"]\n\
            }}",
            description,
            serde_json::to_string_pretty(&results_json)?
        );

        let response = self.thinker.complete(&prompt, None).await?;

        match parse_structured::<SynthesisReport>(&response) {
            Parsed::Structured(report) => Ok(report),
            Parsed::Raw(text) => Ok(SynthesisReport {
                summary: Some(text),
                key_findings: Vec::new(),
                data: Value::Null,
                next_steps: Vec::new(),
                raw_results: Some(results_json),
            }),
        }
    }

    /// Ask the reasoning service directly, with memory augmentation
    pub async fn think(
        &self,
        prompt: &str,
        context: Option<&Value>,
    ) -> Result<String, EngineError> {
        use crate::llm::LLMError;

        self.thinker
            .complete(prompt, context)
            .await
            .map_err(|e| match e {
                LLMError::ProviderUnavailable(_) => EngineError::AllProvidersExhausted,
                other => EngineError::Reasoning(other.to_string()),
            })
    }

    /// Current agent status
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            name: self.name.clone(),
            busy: self.busy.load(Ordering::SeqCst),
            tasks_completed: self.tasks_completed.load(Ordering::SeqCst),
            memory: self.memory.lock().expect("memory lock").size(),
            tools: self.tools.names(),
            profiles: self
                .roster
                .profiles()
                .iter()
                .map(|p| p.name.clone())
                .collect(),
        }
    }

    /// Snapshot of the memory system
    pub fn memory_snapshot(&self, recent: usize) -> MemorySnapshot {
        let memory = self.memory.lock().expect("memory lock");
        MemorySnapshot {
            sizes: memory.size(),
            stats: memory.stats().clone(),
            recent: memory.get_recent_memories(recent),
        }
    }

    /// Export the full memory store
    pub fn export_memory(&self) -> MemoryExport {
        self.memory.lock().expect("memory lock").export()
    }

    /// Restore the memory store from an export
    pub fn import_memory(&self, data: MemoryExport) {
        self.memory.lock().expect("memory lock").import(data);
    }

    /// The task record store
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Reset the agent: clears memory and the completion counter
    pub fn reset(&self) {
        self.memory.lock().expect("memory lock").clear(None);
        self.tasks_completed.store(0, Ordering::SeqCst);
        info!("Agent {} reset", self.name);
    }
}

/// The generic system prompt shared by every profile
fn base_system_prompt(name: &str, tools: &ToolRegistry) -> String {
    format!(
        "You are {}, an autonomous task agent.\n\n\
        Your capabilities:\n\
        - Planning and decomposition of complex tasks\n\
        - Logical reasoning and problem solving\n\
        - Tool use\n\
        - Learning from past experience\n\n\
        Available tools:\n{}\n\n\
        Principles:\n\
        1. Break complex tasks into simple steps\n\
        2. Always verify your results\n\
        3. Learn from past experience\n\
        4. Be precise and methodical",
        name,
        tools.catalog()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedReasoner;
    use crate::llm::LLMError;
    use tokio::sync::Semaphore;

    const ANALYSIS_JSON: &str = r#"{"type": "research", "complexity": "medium", "risk_level": "low"}"#;
    const SINGLE_STEP_DECOMPOSITION: &str = r#"{
        "subtasks": [
            {"id": "step_1", "description": "Think about it", "action": "reason", "tool": null, "inputs": {}, "expected_output": "An answer"}
        ]
    }"#;
    const SYNTHESIS_JSON: &str = r#"{
        "summary": "All done",
        "key_findings": ["it worked"],
        "data": {},
        "next_steps": []
    }"#;

    fn make_agent(responses: Vec<&str>) -> Agent {
        Agent::new(
            "TestAgent",
            Arc::new(ScriptedReasoner::new(responses)),
            Arc::new(ToolRegistry::empty()),
            Roster::standard("generalist", 0.2),
            Arc::new(TaskStore::new()),
            10,
            5,
        )
    }

    #[tokio::test]
    async fn test_run_task_happy_path() {
        // analysis, decomposition, step thinking, synthesis
        let agent = make_agent(vec![
            ANALYSIS_JSON,
            SINGLE_STEP_DECOMPOSITION,
            "The answer is 42.",
            SYNTHESIS_JSON,
        ]);

        let report = agent.run_task("compute the answer", None).await.unwrap();

        assert!(report.success);
        assert_eq!(
            report.result.as_ref().unwrap().summary.as_deref(),
            Some("All done")
        );
        assert_eq!(report.execution_results.as_ref().unwrap().len(), 1);
        assert_eq!(report.profile, "generalist");

        // Task record completed
        let record = agent.store().get(&report.task_id).unwrap();
        assert_eq!(record.status, crate::agent::store::TaskStatus::Completed);

        // Memory stored the episode
        assert_eq!(agent.status().memory.episodic, 1);
        assert_eq!(agent.status().tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_synthesis_falls_back_to_raw_text() {
        let agent = make_agent(vec![
            ANALYSIS_JSON,
            SINGLE_STEP_DECOMPOSITION,
            "step output",
            "Just some prose, no structure at all",
        ]);

        let report = agent.run_task("summarize something", None).await.unwrap();

        assert!(report.success);
        let synthesis = report.result.unwrap();
        assert_eq!(
            synthesis.summary.as_deref(),
            Some("Just some prose, no structure at all")
        );
        assert!(synthesis.raw_results.is_some());
    }

    #[tokio::test]
    async fn test_planning_failure_becomes_structured_report() {
        let agent = make_agent(vec![]);

        let report = agent.run_task("anything", None).await.unwrap();

        assert!(!report.success);
        assert!(report.error.is_some());
        assert!(report.plan.is_none());

        // Task record failed, but the call itself did not error
        let records = agent.store().list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, crate::agent::store::TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let agent = make_agent(vec![]);
        let result = agent.run_task_as("ghost", "task", None).await;
        assert!(matches!(result, Err(EngineError::AgentNotFound(_))));
    }

    #[tokio::test]
    async fn test_think_maps_reasoning_errors() {
        let agent = make_agent(vec![]);

        // Exhausted script surfaces as provider exhaustion
        let result = agent.think("quick question", None).await;
        assert!(matches!(result, Err(EngineError::AllProvidersExhausted)));
    }

    #[tokio::test]
    async fn test_reentrancy_guard_rejects_second_task() {
        struct GatedReasoner {
            gate: Arc<Semaphore>,
        }

        #[async_trait]
        impl ReasoningService for GatedReasoner {
            async fn complete(
                &self,
                _prompt: &str,
                _context: Option<&Value>,
            ) -> crate::llm::Result<String> {
                let _permit = self.gate.acquire().await;
                Err(LLMError::ProviderUnavailable("gated".to_string()))
            }
        }

        let gate = Arc::new(Semaphore::new(0));
        let agent = Arc::new(Agent::new(
            "TestAgent",
            Arc::new(GatedReasoner {
                gate: Arc::clone(&gate),
            }),
            Arc::new(ToolRegistry::empty()),
            Roster::standard("generalist", 0.2),
            Arc::new(TaskStore::new()),
            10,
            5,
        ));

        let first = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.run_task("long running", None).await })
        };

        // Let the first task reach the gated reasoner
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(agent.status().busy);

        let second = agent.run_task("impatient", None).await;
        assert!(matches!(second, Err(EngineError::AgentBusy)));

        // Release the first task; it fails gracefully and frees the guard
        gate.add_permits(1);
        let report = first.await.unwrap().unwrap();
        assert!(!report.success);
        assert!(!agent.status().busy);

        // Now a new task may start
        let third = agent.run_task("try again", None).await.unwrap();
        assert!(!third.success);
    }

    #[tokio::test]
    async fn test_status_and_snapshot() {
        let agent = make_agent(vec![
            ANALYSIS_JSON,
            SINGLE_STEP_DECOMPOSITION,
            "output",
            SYNTHESIS_JSON,
        ]);

        agent.run_task("a memorable task", None).await.unwrap();

        let status = agent.status();
        assert_eq!(status.name, "TestAgent");
        assert!(!status.busy);
        assert!(status.profiles.contains(&"generalist".to_string()));

        let snapshot = agent.memory_snapshot(5);
        assert_eq!(snapshot.sizes.episodic, 1);
        assert_eq!(snapshot.stats.tasks_stored, 1);
        assert_eq!(snapshot.recent.len(), 2); // working + episodic copies

        agent.reset();
        assert_eq!(agent.status().memory.episodic, 0);
        assert_eq!(agent.status().tasks_completed, 0);
    }

    #[tokio::test]
    async fn test_memory_export_import_between_agents() {
        let first = make_agent(vec![
            ANALYSIS_JSON,
            SINGLE_STEP_DECOMPOSITION,
            "output",
            SYNTHESIS_JSON,
        ]);
        first.run_task("transplant me", None).await.unwrap();

        let exported = first.export_memory();

        let second = make_agent(vec![]);
        second.import_memory(exported);

        assert_eq!(second.status().memory.episodic, 1);
        assert_eq!(second.memory_snapshot(1).recent[0].description, "transplant me");
    }
}
