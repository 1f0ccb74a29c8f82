//! Task execution records and launch manifests.
//!
//! Executions are created when a launch succeeds and are otherwise owned by
//! whatever runs the task; this crate reads them to build views and to decide
//! whether a deleted task needs tearing down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::launch::{AppDefinition, LaunchRequest};

/// Execution status derived from start/end timestamps and the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Never started (or no execution at all).
    #[default]
    Unknown,
    Running,
    Complete,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Unknown => write!(f, "UNKNOWN"),
            ExecutionStatus::Running => write!(f, "RUNNING"),
            ExecutionStatus::Complete => write!(f, "COMPLETE"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One execution of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Positive, assigned by the execution store.
    pub execution_id: i64,
    pub task_name: String,
    /// Raw `--key=value` arguments, in launch order.
    pub arguments: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// Identifier returned by the launcher.
    pub external_execution_id: Option<String>,
}

impl TaskExecution {
    pub fn new(execution_id: i64, task_name: &str) -> Self {
        Self {
            execution_id,
            task_name: task_name.to_string(),
            arguments: Vec::new(),
            start_time: None,
            end_time: None,
            exit_code: None,
            external_execution_id: None,
        }
    }

    /// Mark the execution as started with the given arguments.
    pub fn start(&mut self, arguments: Vec<String>) {
        self.arguments = arguments;
        self.start_time = Some(Utc::now());
    }

    /// Record the end of the execution.
    pub fn complete(&mut self, exit_code: i32) {
        self.end_time = Some(Utc::now());
        self.exit_code = Some(exit_code);
    }

    pub fn status(&self) -> ExecutionStatus {
        match (self.start_time, self.end_time) {
            (None, _) => ExecutionStatus::Unknown,
            (Some(_), None) => ExecutionStatus::Running,
            (Some(_), Some(_)) if self.exit_code == Some(0) => ExecutionStatus::Complete,
            (Some(_), Some(_)) => ExecutionStatus::Failed,
        }
    }
}

/// Snapshot of what was launched for one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub platform_name: String,
    pub definition: AppDefinition,
    /// Artifact location the launcher was given.
    pub resource: String,
    pub deployment_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub command_line_arguments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskManifest {
    pub fn from_request(platform_name: &str, request: &LaunchRequest) -> Self {
        Self {
            platform_name: platform_name.to_string(),
            definition: request.definition().clone(),
            resource: request.artifact_location().to_string(),
            deployment_properties: request.deployment_properties().clone(),
            command_line_arguments: request.command_line_arguments().to_vec(),
            created_at: Utc::now(),
        }
    }
}
