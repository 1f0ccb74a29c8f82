//! Core domain models.
//!
//! Task definitions, executions, manifests and the launch request that ties
//! them together.

pub mod definition;
pub mod execution;
pub mod launch;

pub use definition::{child_name, TaskDefinition, COMPOSED_TASK_RUNNER, TASK_NAME_PROPERTY};
pub use execution::{ExecutionStatus, TaskExecution, TaskManifest};
pub use launch::{AppDefinition, LaunchRequest, EXECUTION_ID_ARGUMENT};
