//! Display views of task definitions joined with their latest execution.
//!
//! Views never carry raw secrets: DSL and arguments pass through the
//! sanitizer first.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::expander::composed_parent;
use crate::core::{ExecutionStatus, TaskDefinition, TaskExecution};
use crate::sanitize::ArgumentSanitizer;
use crate::store::{ExecutionStore, TaskDefinitionRepository};
use crate::Result;

/// ISO-8601 instant with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecutionView {
    pub execution_id: i64,
    pub task_name: String,
    pub status: ExecutionStatus,
    /// Sanitized arguments.
    pub arguments: Vec<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub exit_code: Option<i32>,
    pub external_execution_id: Option<String>,
    /// Present only when the manifest was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionView {
    pub name: String,
    /// Sanitized DSL.
    pub dsl_text: String,
    pub description: Option<String>,
    pub composed: bool,
    pub composed_task_element: bool,
    pub status: ExecutionStatus,
    pub last_task_execution: Option<TaskExecutionView>,
}

/// Builds definition views.
#[derive(Debug, Clone, Default)]
pub struct TaskViewBuilder {
    sanitizer: ArgumentSanitizer,
}

impl TaskViewBuilder {
    pub fn new(sanitizer: ArgumentSanitizer) -> Self {
        Self { sanitizer }
    }

    pub fn sanitizer(&self) -> &ArgumentSanitizer {
        &self.sanitizer
    }

    pub async fn build(
        &self,
        repository: &dyn TaskDefinitionRepository,
        executions: &dyn ExecutionStore,
        definition: &TaskDefinition,
        manifest: bool,
    ) -> Result<TaskDefinitionView> {
        let latest = executions.latest_execution(&definition.name).await?;
        let last_task_execution = match latest {
            Some(execution) => Some(self.execution_view(executions, &execution, manifest).await?),
            None => None,
        };
        let composed_task_element = composed_parent(repository, definition)
            .await?
            .is_some();

        Ok(TaskDefinitionView {
            name: definition.name.clone(),
            dsl_text: self.sanitizer.sanitize_dsl(&definition.dsl_text),
            description: definition.description.clone(),
            composed: definition.is_composed(),
            composed_task_element,
            status: last_task_execution
                .as_ref()
                .map(|e| e.status)
                .unwrap_or_default(),
            last_task_execution,
        })
    }

    /// View of one execution. With `manifest`, deployment properties come
    /// from the stored manifest, or an empty map when there is none.
    pub async fn execution_view(
        &self,
        executions: &dyn ExecutionStore,
        execution: &TaskExecution,
        manifest: bool,
    ) -> Result<TaskExecutionView> {
        let deployment_properties = if manifest {
            Some(
                executions
                    .manifest(execution.execution_id)
                    .await?
                    .map(|m| m.deployment_properties)
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        Ok(TaskExecutionView {
            execution_id: execution.execution_id,
            task_name: execution.task_name.clone(),
            status: execution.status(),
            arguments: self.sanitizer.sanitize_arguments(&execution.arguments),
            start_time: execution.start_time.as_ref().map(format_instant),
            end_time: execution.end_time.as_ref().map(format_instant),
            exit_code: execution.exit_code,
            external_execution_id: execution.external_execution_id.clone(),
            deployment_properties,
        })
    }
}
