//! Task store
//!
//! Explicit, constructor-injected registry of task records. This replaces
//! module-level mutable registries: the store is owned by the process or
//! session boundary and passed by reference through the call chain, so two
//! agents never share state by accident.
//!
//! The record shape here is the status surface an external transport layer
//! exposes; it is fixed by the core even though the transport itself lives
//! elsewhere.

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One task record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-memory task record store
///
/// Durable persistence is deliberately out of scope; export lives at the
/// memory system, not here.
#[derive(Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending task record
    pub fn create(&self, id: &str, description: &str) {
        let now = Utc::now();
        let record = TaskRecord {
            id: id.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        };
        self.tasks
            .lock()
            .expect("task store lock")
            .insert(id.to_string(), record);
    }

    /// Mark a task as running
    pub fn mark_running(&self, id: &str) -> Result<(), EngineError> {
        self.update(id, |record| {
            record.status = TaskStatus::Running;
        })
    }

    /// Mark a task as completed with its result
    pub fn complete(&self, id: &str, result: Value) -> Result<(), EngineError> {
        self.update(id, |record| {
            record.status = TaskStatus::Completed;
            record.result = Some(result);
        })
    }

    /// Mark a task as failed with an error message
    pub fn fail(&self, id: &str, error: &str) -> Result<(), EngineError> {
        self.update(id, |record| {
            record.status = TaskStatus::Failed;
            record.error = Some(error.to_string());
        })
    }

    /// Fetch a task record by id
    pub fn get(&self, id: &str) -> Result<TaskRecord, EngineError> {
        self.tasks
            .lock()
            .expect("task store lock")
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))
    }

    /// All task records, oldest first
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .tasks
            .lock()
            .expect("task store lock")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task store lock").len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut TaskRecord)) -> Result<(), EngineError> {
        let mut tasks = self.tasks.lock().expect("task store lock");
        let record = tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}
