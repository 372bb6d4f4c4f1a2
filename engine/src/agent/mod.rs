//! Agent orchestration
//!
//! The coordinating layer on top of planner, executor, and memory: profile
//! selection, the run-task pipeline, the task record store, and the
//! memory-augmented reasoning facade.

pub mod core;
pub mod roster;
pub mod store;

pub use core::{Agent, AgentStatus, MemorySnapshot, SynthesisReport, TaskReport, Thinker};
pub use roster::{AgentProfile, Roster};
pub use store::{TaskRecord, TaskStatus, TaskStore};
