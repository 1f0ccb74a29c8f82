//! In-memory storage.
//!
//! Both stores keep their data behind an `Arc<RwLock<..>>` so clones share
//! state. Every multi-item write happens under a single write lock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ExecutionStore, Page, PageRequest, TaskDefinitionRepository};
use crate::core::{LaunchRequest, TaskDefinition, TaskExecution, TaskManifest};
use crate::{twlog_debug, Error, Result};

/// Definitions kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskDefinitionRepository {
    definitions: Arc<RwLock<Vec<TaskDefinition>>>,
}

impl InMemoryTaskDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository pre-populated with `definitions`.
    ///
    /// # Errors
    /// `DuplicateTaskName` if two definitions share a name.
    pub fn with_definitions(definitions: Vec<TaskDefinition>) -> Result<Self> {
        check_unique(&[], &definitions)?;
        Ok(Self {
            definitions: Arc::new(RwLock::new(definitions)),
        })
    }

    /// Copy of every stored definition, in insertion order.
    pub async fn definitions(&self) -> Vec<TaskDefinition> {
        self.definitions.read().await.clone()
    }

    async fn filtered<F>(&self, page: PageRequest, keep: F) -> Page<TaskDefinition>
    where
        F: Fn(&TaskDefinition) -> bool,
    {
        let definitions = self.definitions.read().await;
        let matches: Vec<TaskDefinition> =
            definitions.iter().filter(|d| keep(d)).cloned().collect();
        page.apply(matches)
    }
}

/// Reject `incoming` if any name already exists or repeats within itself.
fn check_unique(existing: &[TaskDefinition], incoming: &[TaskDefinition]) -> Result<()> {
    let mut seen: HashSet<&str> = existing.iter().map(|d| d.name.as_str()).collect();
    for definition in incoming {
        if !seen.insert(definition.name.as_str()) {
            return Err(Error::DuplicateTaskName(definition.name.clone()));
        }
    }
    Ok(())
}

#[async_trait]
impl TaskDefinitionRepository for InMemoryTaskDefinitionRepository {
    async fn save(&self, definition: TaskDefinition) -> Result<TaskDefinition> {
        let mut definitions = self.definitions.write().await;
        check_unique(&definitions, std::slice::from_ref(&definition))?;
        twlog_debug!("Saving task definition {}", definition.name);
        definitions.push(definition.clone());
        Ok(definition)
    }

    async fn save_all(&self, incoming: Vec<TaskDefinition>) -> Result<Vec<TaskDefinition>> {
        let mut definitions = self.definitions.write().await;
        check_unique(&definitions, &incoming)?;
        twlog_debug!("Saving {} task definitions", incoming.len());
        definitions.extend(incoming.iter().cloned());
        Ok(incoming)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<TaskDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(definitions.iter().find(|d| d.name == name).cloned())
    }

    async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let mut definitions = self.definitions.write().await;
        let before = definitions.len();
        definitions.retain(|d| d.name != name);
        Ok(definitions.len() != before)
    }

    async fn delete_by_names(&self, names: &[String]) -> Result<Vec<String>> {
        let mut definitions = self.definitions.write().await;
        let present: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let removed: Vec<String> = names
            .iter()
            .filter(|n| present.contains(n.as_str()))
            .cloned()
            .collect();
        let doomed: HashSet<&str> = removed.iter().map(String::as_str).collect();
        definitions.retain(|d| !doomed.contains(d.name.as_str()));
        twlog_debug!("Deleted task definitions {:?}", removed);
        Ok(removed)
    }

    async fn delete_all(&self) -> Result<Vec<String>> {
        let mut definitions = self.definitions.write().await;
        let removed = definitions.drain(..).map(|d| d.name).collect();
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.definitions.read().await.len())
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<TaskDefinition>> {
        Ok(self.filtered(page, |_| true).await)
    }

    async fn find_by_name_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>> {
        Ok(self.filtered(page, |d| d.name.contains(fragment)).await)
    }

    async fn find_by_dsl_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>> {
        Ok(self.filtered(page, |d| d.dsl_text.contains(fragment)).await)
    }

    async fn find_by_description_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>> {
        Ok(self
            .filtered(page, |d| {
                d.description
                    .as_deref()
                    .is_some_and(|text| text.contains(fragment))
            })
            .await)
    }

    async fn find_by_name_prefix(&self, prefix: &str) -> Result<Vec<TaskDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .iter()
            .filter(|d| d.name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Serializable content of an [`InMemoryExecutionStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecords {
    pub executions: Vec<TaskExecution>,
    /// Manifests keyed by execution id.
    pub manifests: BTreeMap<i64, TaskManifest>,
}

impl ExecutionRecords {
    fn next_id(&self) -> i64 {
        self.executions
            .iter()
            .map(|e| e.execution_id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Executions and manifests kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionStore {
    records: Arc<RwLock<ExecutionRecords>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: ExecutionRecords) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Copy of everything stored.
    pub async fn records(&self) -> ExecutionRecords {
        self.records.read().await.clone()
    }

    /// Create a started execution that did not come through a launcher.
    pub async fn start_execution(&self, task_name: &str, arguments: Vec<String>) -> TaskExecution {
        let mut records = self.records.write().await;
        let mut execution = TaskExecution::new(records.next_id(), task_name);
        execution.start(arguments);
        records.executions.push(execution.clone());
        execution
    }

    /// Record the end of an execution.
    ///
    /// # Errors
    /// `BadRequest` if no execution has this id.
    pub async fn complete_execution(&self, execution_id: i64, exit_code: i32) -> Result<TaskExecution> {
        let mut records = self.records.write().await;
        let execution = records
            .executions
            .iter_mut()
            .find(|e| e.execution_id == execution_id)
            .ok_or_else(|| Error::BadRequest(format!("no task execution with id {}", execution_id)))?;
        execution.complete(exit_code);
        Ok(execution.clone())
    }

    /// Attach a manifest to an existing execution.
    pub async fn save_manifest(&self, execution_id: i64, manifest: TaskManifest) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.executions.iter().any(|e| e.execution_id == execution_id) {
            return Err(Error::BadRequest(format!(
                "no task execution with id {}",
                execution_id
            )));
        }
        records.manifests.insert(execution_id, manifest);
        Ok(())
    }

    pub async fn executions(&self, task_name: &str) -> Vec<TaskExecution> {
        let records = self.records.read().await;
        records
            .executions
            .iter()
            .filter(|e| e.task_name == task_name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn latest_execution(&self, task_name: &str) -> Result<Option<TaskExecution>> {
        let records = self.records.read().await;
        Ok(records
            .executions
            .iter()
            .filter(|e| e.task_name == task_name)
            .max_by_key(|e| e.execution_id)
            .cloned())
    }

    async fn manifest(&self, execution_id: i64) -> Result<Option<TaskManifest>> {
        Ok(self.records.read().await.manifests.get(&execution_id).cloned())
    }

    async fn create_execution(&self, task_name: &str) -> Result<TaskExecution> {
        let mut records = self.records.write().await;
        let execution = TaskExecution::new(records.next_id(), task_name);
        records.executions.push(execution.clone());
        Ok(execution)
    }

    async fn record_launch(
        &self,
        execution_id: i64,
        platform_name: &str,
        request: &LaunchRequest,
        external_execution_id: &str,
    ) -> Result<TaskExecution> {
        let mut records = self.records.write().await;
        let execution = records
            .executions
            .iter_mut()
            .find(|e| e.execution_id == execution_id)
            .ok_or_else(|| Error::BadRequest(format!("no task execution with id {}", execution_id)))?;
        execution.start(request.command_line_arguments().to_vec());
        execution.external_execution_id = Some(external_execution_id.to_string());
        let execution = execution.clone();

        let manifest = TaskManifest::from_request(platform_name, request);
        records.manifests.insert(execution_id, manifest);
        twlog_debug!(
            "Recorded execution {} of {} (external id {})",
            execution_id,
            execution.task_name,
            external_execution_id
        );
        Ok(execution)
    }

    async fn discard_execution(&self, execution_id: i64) -> Result<()> {
        let mut records = self.records.write().await;
        records.executions.retain(|e| e.execution_id != execution_id);
        records.manifests.remove(&execution_id);
        Ok(())
    }

    async fn has_launched(&self, task_name: &str) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .executions
            .iter()
            .any(|e| e.task_name == task_name && e.external_execution_id.is_some()))
    }
}
