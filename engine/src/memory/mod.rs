//! Tiered memory system
//!
//! Stores task history across three tiers:
//! - **working**: FIFO buffer of the most recent entries, bounded capacity
//! - **episodic**: append-only history of every stored task
//! - **semantic**: knowledge items derived from successful tasks, indexed by
//!   the plan's analysis type
//!
//! Retrieval is heuristic, not semantic: a query token counts as a hit when
//! it appears as a substring anywhere in the serialized record, and a record
//! is relevant once `min(2, token_count)` tokens hit. Tiers are searched in
//! priority order (working, episodic, semantic) with an early return as soon
//! as the limit fills inside a tier — results are ordered by tier priority
//! and recency, never globally ranked. That behavior is load-bearing for
//! compatibility and must not be "improved" in place.
//!
//! Entries hold serialized JSON snapshots of the plan and results, keeping
//! this module free of planner/executor dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Default bound on the working tier
pub const DEFAULT_WORKING_CAPACITY: usize = 10;

/// Default retrieval limit
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

/// Memory tier selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    Working,
    Episodic,
    Semantic,
}

/// One stored task: the episodic record
///
/// Append-only. Never mutated or individually deleted after creation; only
/// bulk [`MemorySystem::clear`] removes entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Entry id ("task_{n}")
    pub id: String,

    /// When the task was stored
    pub timestamp: DateTime<Utc>,

    /// Task description
    pub description: String,

    /// Serialized plan snapshot
    pub plan: Value,

    /// Serialized step results
    pub results: Value,

    /// Serialized final result
    pub final_result: Value,

    /// Whether the task produced a summary
    pub success: bool,
}

/// Knowledge extracted from one successful task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Item id ("knowledge_{n}")
    pub id: String,

    /// Id of the episodic entry this was derived from; always a successful one
    pub source: String,

    /// When the knowledge was extracted
    pub timestamp: DateTime<Utc>,

    /// Category, taken from the plan's analysis type
    pub category: String,

    /// The extracted content
    pub content: KnowledgeContent,
}

/// Payload of a knowledge item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeContent {
    /// Steps of the plan that worked
    pub successful_approach: Value,

    /// Tools those steps used
    pub tools_used: Vec<String>,

    /// Final result of the source task
    pub outcome: Value,
}

/// A retrieval hit from any tier
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MemoryRecord {
    Episode(MemoryEntry),
    Knowledge(KnowledgeItem),
}

impl MemoryRecord {
    /// One-line rendering for prompt context
    pub fn summary(&self) -> String {
        match self {
            MemoryRecord::Episode(entry) => entry.description.clone(),
            MemoryRecord::Knowledge(item) => {
                format!("{} knowledge learned from {}", item.category, item.source)
            }
        }
    }
}

/// Counters kept across the life of the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub tasks_stored: u64,
    pub knowledge_items: u64,
    pub total_retrievals: u64,
}

/// Per-tier entry counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySizes {
    pub working: usize,
    pub episodic: usize,
    pub semantic: usize,
}

/// Serialized form of the whole store, for transplanting across processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryExport {
    pub working_memory: Vec<MemoryEntry>,
    pub episodic_memory: Vec<MemoryEntry>,
    pub semantic_memory: HashMap<String, Vec<KnowledgeItem>>,
    pub stats: MemoryStats,
    pub exported_at: DateTime<Utc>,
}

/// Three-tier memory store
///
/// Process-wide mutable state with no internal locking; safe only under the
/// single-writer assumption the agent's re-entrancy guard provides.
pub struct MemorySystem {
    working_capacity: usize,
    working: VecDeque<MemoryEntry>,
    episodic: Vec<MemoryEntry>,
    semantic: HashMap<String, Vec<KnowledgeItem>>,
    stats: MemoryStats,
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySystem {
    /// Create a store with the default working capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WORKING_CAPACITY)
    }

    /// Create a store with a specific working capacity
    pub fn with_capacity(working_capacity: usize) -> Self {
        info!("Memory system initialized (working capacity {})", working_capacity);
        Self {
            working_capacity,
            working: VecDeque::new(),
            episodic: Vec::new(),
            semantic: HashMap::new(),
            stats: MemoryStats::default(),
        }
    }

    /// Store a completed task
    ///
    /// Appends an episodic entry, pushes it into working memory (evicting the
    /// oldest entry past capacity), and — only when the task succeeded —
    /// derives one knowledge item keyed by the plan's analysis type. Success
    /// is derived from `final_result.summary` being non-null.
    pub fn store_task(&mut self, description: &str, plan: Value, results: Value, final_result: Value) {
        let success = final_result
            .get("summary")
            .map(|s| !s.is_null())
            .unwrap_or(false);

        let entry = MemoryEntry {
            id: format!("task_{}", self.episodic.len() + 1),
            timestamp: Utc::now(),
            description: description.to_string(),
            plan,
            results,
            final_result,
            success,
        };

        self.add_to_working(entry.clone());

        if success {
            self.extract_knowledge(&entry);
        }

        self.episodic.push(entry);
        self.stats.tasks_stored += 1;

        debug!("Task stored in memory: {:.50}", description);
    }

    /// Push an entry into working memory, evicting the oldest past capacity
    fn add_to_working(&mut self, entry: MemoryEntry) {
        self.working.push_back(entry);
        while self.working.len() > self.working_capacity {
            self.working.pop_front();
        }
    }

    /// Derive a knowledge item from a successful episodic entry
    fn extract_knowledge(&mut self, entry: &MemoryEntry) {
        let category = entry
            .plan
            .get("analysis")
            .and_then(|a| a.get("type"))
            .and_then(|t| t.as_str())
            .unwrap_or("general")
            .to_string();

        let steps = entry.plan.get("steps").cloned().unwrap_or(Value::Null);
        let tools_used: Vec<String> = steps
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|step| step.get("tool").and_then(|t| t.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let item = KnowledgeItem {
            id: format!("knowledge_{}", self.stats.knowledge_items + 1),
            source: entry.id.clone(),
            timestamp: Utc::now(),
            category: category.clone(),
            content: KnowledgeContent {
                successful_approach: steps,
                tools_used,
                outcome: entry.final_result.clone(),
            },
        };

        self.semantic.entry(category).or_default().push(item);
        self.stats.knowledge_items += 1;
    }

    /// Retrieve memories relevant to a query
    ///
    /// Search order when `tier` is unspecified: working (most recent first),
    /// then episodic (most recent first), then semantic. Returns as soon as
    /// `limit` is reached within a tier.
    pub fn retrieve_relevant(
        &mut self,
        query: &str,
        limit: usize,
        tier: Option<MemoryTier>,
    ) -> Vec<MemoryRecord> {
        self.stats.total_retrievals += 1;

        let query_lower = query.to_lowercase();
        let mut relevant: Vec<MemoryRecord> = Vec::new();

        if tier.is_none() || tier == Some(MemoryTier::Working) {
            for entry in self.working.iter().rev() {
                if is_relevant(entry, &query_lower) {
                    relevant.push(MemoryRecord::Episode(entry.clone()));
                }
                if relevant.len() >= limit {
                    return relevant;
                }
            }
        }

        if tier.is_none() || tier == Some(MemoryTier::Episodic) {
            for entry in self.episodic.iter().rev() {
                if is_relevant(entry, &query_lower) {
                    relevant.push(MemoryRecord::Episode(entry.clone()));
                }
                if relevant.len() >= limit {
                    return relevant;
                }
            }
        }

        if tier.is_none() || tier == Some(MemoryTier::Semantic) {
            for (category, items) in &self.semantic {
                for item in items.iter().rev() {
                    if category.to_lowercase().contains(&query_lower)
                        || is_relevant(item, &query_lower)
                    {
                        relevant.push(MemoryRecord::Knowledge(item.clone()));
                    }
                    if relevant.len() >= limit {
                        return relevant;
                    }
                }
            }
        }

        relevant.truncate(limit);
        relevant
    }

    /// The most recent entries across working and episodic memory
    pub fn get_recent_memories(&self, count: usize) -> Vec<MemoryEntry> {
        let mut all: Vec<MemoryEntry> = self
            .working
            .iter()
            .chain(self.episodic.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(count);
        all
    }

    /// Knowledge items of a specific category
    pub fn get_knowledge(&self, category: &str) -> &[KnowledgeItem] {
        self.semantic.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entry counts per tier (semantic counted across all categories)
    pub fn size(&self) -> MemorySizes {
        MemorySizes {
            working: self.working.len(),
            episodic: self.episodic.len(),
            semantic: self.semantic.values().map(Vec::len).sum(),
        }
    }

    /// Lifetime counters
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Clear one tier, or all three when `tier` is unspecified
    pub fn clear(&mut self, tier: Option<MemoryTier>) {
        if tier.is_none() || tier == Some(MemoryTier::Working) {
            self.working.clear();
        }
        if tier.is_none() || tier == Some(MemoryTier::Episodic) {
            self.episodic.clear();
        }
        if tier.is_none() || tier == Some(MemoryTier::Semantic) {
            self.semantic.clear();
        }
        info!("Memory cleared: {:?}", tier);
    }

    /// Export the whole store as a single document
    pub fn export(&self) -> MemoryExport {
        MemoryExport {
            working_memory: self.working.iter().cloned().collect(),
            episodic_memory: self.episodic.clone(),
            semantic_memory: self.semantic.clone(),
            stats: self.stats.clone(),
            exported_at: Utc::now(),
        }
    }

    /// Restore the store from an exported document
    ///
    /// Replaces the working, episodic, and semantic tiers plus the stats
    /// counters exactly.
    pub fn import(&mut self, data: MemoryExport) {
        self.working = data.working_memory.into();
        self.episodic = data.episodic_memory;
        self.semantic = data.semantic_memory;
        self.stats = data.stats;
        info!("Memories imported");
    }
}

/// Whether a record is relevant to a lowercased query
///
/// Tokenizes the query on whitespace; the record matches when at least
/// `min(2, token_count)` tokens appear as substrings in its serialized form.
fn is_relevant<T: serde::Serialize>(record: &T, query_lower: &str) -> bool {
    let serialized = serde_json::to_string(record)
        .unwrap_or_default()
        .to_lowercase();

    let tokens: Vec<&str> = query_lower.split_whitespace().collect();
    let matches = tokens
        .iter()
        .filter(|token| serialized.contains(**token))
        .count();

    matches >= tokens.len().min(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_json(task_type: &str) -> Value {
        json!({
            "analysis": {"type": task_type},
            "steps": [
                {"id": "step_1", "tool": "web_search"},
                {"id": "step_2", "tool": null}
            ]
        })
    }

    fn success_result(summary: &str) -> Value {
        json!({"summary": summary, "key_findings": []})
    }

    fn store_n(memory: &mut MemorySystem, n: usize, prefix: &str) {
        for i in 1..=n {
            memory.store_task(
                &format!("{} number {}", prefix, i),
                plan_json("general"),
                json!([]),
                success_result("done"),
            );
        }
    }

    #[test]
    fn test_working_memory_bound() {
        let mut memory = MemorySystem::with_capacity(10);
        store_n(&mut memory, 15, "task");

        let sizes = memory.size();
        assert_eq!(sizes.working, 10);
        assert_eq!(sizes.episodic, 15);

        // Working memory holds exactly the 10 most recent entries
        let recent_ids: Vec<&str> = memory.working.iter().map(|e| e.id.as_str()).collect();
        let expected: Vec<String> = (6..=15).map(|i| format!("task_{}", i)).collect();
        assert_eq!(
            recent_ids,
            expected.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_success_gated_knowledge_extraction() {
        let mut memory = MemorySystem::new();

        // Null summary: episodic grows, semantic does not
        memory.store_task(
            "failed attempt",
            plan_json("research"),
            json!([]),
            json!({"summary": null}),
        );
        assert_eq!(memory.size().episodic, 1);
        assert_eq!(memory.size().semantic, 0);

        // Missing summary field behaves the same
        memory.store_task("another failure", plan_json("research"), json!([]), json!({}));
        assert_eq!(memory.size().semantic, 0);

        // Success derives exactly one knowledge item in the analysis category
        memory.store_task(
            "market research",
            plan_json("research"),
            json!([]),
            success_result("found it"),
        );
        assert_eq!(memory.size().semantic, 1);

        let items = memory.get_knowledge("research");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "task_3");
        assert_eq!(items[0].content.tools_used, vec!["web_search"]);
    }

    #[test]
    fn test_knowledge_defaults_to_general_category() {
        let mut memory = MemorySystem::new();
        memory.store_task(
            "untyped task",
            json!({"steps": []}),
            json!([]),
            success_result("ok"),
        );

        assert_eq!(memory.get_knowledge("general").len(), 1);
    }

    #[test]
    fn test_relevance_requires_two_tokens() {
        let mut memory = MemorySystem::new();
        memory.store_task(
            "quarterly sales data report",
            plan_json("analysis"),
            json!([]),
            success_result("report written"),
        );

        // Both tokens present
        let hits = memory.retrieve_relevant("sales data", 5, None);
        assert!(!hits.is_empty());

        // Only one of two tokens present
        let misses = memory.retrieve_relevant("sales unicorns", 5, None);
        assert!(misses.is_empty());

        // Single-token query needs only that token
        let single = memory.retrieve_relevant("sales", 5, None);
        assert!(!single.is_empty());

        let single_miss = memory.retrieve_relevant("unicorns", 5, None);
        assert!(single_miss.is_empty());
    }

    #[test]
    fn test_retrieval_tier_priority_and_early_return() {
        let mut memory = MemorySystem::with_capacity(2);
        store_n(&mut memory, 5, "sales report");

        // All five episodic entries match, but only the two newest are in
        // working memory; with limit 2 the working tier satisfies the query
        // and episodic entries are never reached.
        let hits = memory.retrieve_relevant("sales report", 2, None);
        assert_eq!(hits.len(), 2);
        match &hits[0] {
            MemoryRecord::Episode(entry) => assert_eq!(entry.id, "task_5"),
            _ => panic!("expected episode"),
        }
        match &hits[1] {
            MemoryRecord::Episode(entry) => assert_eq!(entry.id, "task_4"),
            _ => panic!("expected episode"),
        }
    }

    #[test]
    fn test_retrieval_single_tier() {
        let mut memory = MemorySystem::with_capacity(1);
        store_n(&mut memory, 3, "billing audit");

        // Episodic-only search sees all entries, newest first
        let hits = memory.retrieve_relevant("billing audit", 10, Some(MemoryTier::Episodic));
        assert_eq!(hits.len(), 3);

        // Semantic-only search returns knowledge items
        let semantic = memory.retrieve_relevant("general", 10, Some(MemoryTier::Semantic));
        assert_eq!(semantic.len(), 3);
        assert!(matches!(semantic[0], MemoryRecord::Knowledge(_)));
    }

    #[test]
    fn test_retrieval_counts_stats() {
        let mut memory = MemorySystem::new();
        memory.retrieve_relevant("anything", 5, None);
        memory.retrieve_relevant("anything", 5, None);
        assert_eq!(memory.stats().total_retrievals, 2);
    }

    #[test]
    fn test_get_recent_memories() {
        let mut memory = MemorySystem::with_capacity(2);
        store_n(&mut memory, 4, "task");

        let recent = memory.get_recent_memories(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "task_4");
    }

    #[test]
    fn test_clear_single_tier() {
        let mut memory = MemorySystem::new();
        store_n(&mut memory, 3, "task");
        assert!(memory.size().semantic > 0);

        memory.clear(Some(MemoryTier::Working));
        assert_eq!(memory.size().working, 0);
        assert_eq!(memory.size().episodic, 3);
        assert!(memory.size().semantic > 0);

        memory.clear(None);
        assert_eq!(memory.size().episodic, 0);
        assert_eq!(memory.size().semantic, 0);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut memory = MemorySystem::new();
        store_n(&mut memory, 4, "sales report");
        memory.retrieve_relevant("sales", 5, None);

        let exported = memory.export();

        // Serialize through JSON like a real transplant would
        let serialized = serde_json::to_string(&exported).unwrap();
        let restored_export: MemoryExport = serde_json::from_str(&serialized).unwrap();

        let mut restored = MemorySystem::new();
        restored.import(restored_export);

        assert_eq!(restored.size(), memory.size());
        assert_eq!(restored.stats(), memory.stats());
        assert_eq!(restored.get_knowledge("general").len(), 4);
    }

    #[test]
    fn test_record_summary() {
        let mut memory = MemorySystem::new();
        store_n(&mut memory, 1, "write landing copy");

        let hits = memory.retrieve_relevant("landing copy", 1, None);
        assert_eq!(hits[0].summary(), "write landing copy number 1");
    }
}
