//! Core data model (spec.md §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque application identifier, normalized to strip a leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(String);

impl AppId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque executor/task identifier within an app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The agent host a task currently runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHost {
    pub host: String,
}

/// An application's currently deployed shape, fetched fresh each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    pub cpus: f64,
    pub mem_mb: f64,
    pub tasks: HashMap<TaskId, TaskHost>,
}

/// Per-task record produced for one tick. `None` entries in an
/// `AppSnapshot::tasks` map mean the task's stats were unavailable this tick
/// (spec.md §4.1 `TransientFetchError`) — it does not advance the average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub timestamp: f64,
    pub cpus_time: f64,
    pub cpu_util: f64,
    pub mem_rss_bytes: u64,
    pub mem_limit_bytes: u64,
    pub mem_util: f64,
    pub sample_count: u32,
    pub avg_cpu_util: f64,
    pub avg_mem_util: f64,
}

/// Per-app, per-tick snapshot stored in the sample ring.
///
/// `tasks` is `None` when the orchestrator reported no app definition at all
/// (spec.md §4.4 step 1); otherwise it maps every task the definition lists
/// to its `TaskRecord`, or `None` for a task whose stats fetch failed this
/// tick (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub task_count: usize,
    pub cpus: f64,
    pub mem_mb: f64,
    pub tasks: Option<HashMap<TaskId, Option<TaskRecord>>>,
    pub cpu_util: f64,
    pub mem_util: f64,
    pub app_avg_cpu_util: f64,
    pub app_avg_mem_util: f64,
    pub max_samples_in_app: u32,
}

impl AppSnapshot {
    /// An app for which the orchestrator reported no definition this tick.
    pub fn no_definition() -> Self {
        Self {
            task_count: 0,
            cpus: 0.0,
            mem_mb: 0.0,
            tasks: None,
            cpu_util: 0.0,
            mem_util: 0.0,
            app_avg_cpu_util: 0.0,
            app_avg_mem_util: 0.0,
            max_samples_in_app: 0,
        }
    }
}
