//! Launch request handed to a task launcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Argument carrying the id of the execution a launch belongs to.
pub const EXECUTION_ID_ARGUMENT: &str = "spring.cloud.task.executionid";

/// App name plus the fully merged app properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

/// A fully resolved request to start one execution of a task.
///
/// Built fresh per launch and immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchRequest {
    definition: AppDefinition,
    artifact_location: String,
    deployment_properties: BTreeMap<String, String>,
    command_line_arguments: Vec<String>,
}

impl LaunchRequest {
    pub(crate) fn new(
        definition: AppDefinition,
        artifact_location: String,
        deployment_properties: BTreeMap<String, String>,
        command_line_arguments: Vec<String>,
    ) -> Self {
        Self {
            definition,
            artifact_location,
            deployment_properties,
            command_line_arguments,
        }
    }

    /// Append `--spring.cloud.task.executionid=<id>` to the arguments.
    pub(crate) fn with_execution_id(mut self, execution_id: i64) -> Self {
        self.command_line_arguments
            .push(format!("--{}={}", EXECUTION_ID_ARGUMENT, execution_id));
        self
    }

    pub fn definition(&self) -> &AppDefinition {
        &self.definition
    }

    /// Name of the task definition being launched.
    pub fn task_name(&self) -> &str {
        &self.definition.name
    }

    pub fn artifact_location(&self) -> &str {
        &self.artifact_location
    }

    pub fn deployment_properties(&self) -> &BTreeMap<String, String> {
        &self.deployment_properties
    }

    pub fn command_line_arguments(&self) -> &[String] {
        &self.command_line_arguments
    }
}
