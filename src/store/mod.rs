//! Storage collaborators.
//!
//! The engine talks to definition and execution storage through the traits
//! below. In-memory implementations live in [`memory`]; [`snapshot`] persists
//! them as a JSON state file between CLI invocations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{LaunchRequest, TaskDefinition, TaskExecution, TaskManifest};
use crate::Result;

pub mod memory;
pub mod snapshot;

pub use memory::{ExecutionRecords, InMemoryExecutionStore, InMemoryTaskDefinitionRepository};
pub use snapshot::{StateSnapshot, Stores};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Zero-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number,
            size: size.max(1),
        }
    }

    /// Slice `items` to this page.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total_elements = items.len();
        let size = self.size.max(1);
        let content = items
            .into_iter()
            .skip(self.number.saturating_mul(size))
            .take(size)
            .collect();
        Page {
            content,
            number: self.number,
            size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Replace the content while keeping the paging metadata.
    pub fn with_content<U>(self, content: Vec<U>) -> Page<U> {
        Page {
            content,
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// Keyed storage of task definitions.
///
/// Names are unique. Listing and search preserve insertion order.
#[async_trait]
pub trait TaskDefinitionRepository: Send + Sync {
    /// Insert a new definition; `DuplicateTaskName` if the name exists.
    async fn save(&self, definition: TaskDefinition) -> Result<TaskDefinition>;

    /// Insert all definitions or none of them.
    async fn save_all(&self, definitions: Vec<TaskDefinition>) -> Result<Vec<TaskDefinition>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<TaskDefinition>>;

    /// Remove one definition. Returns whether it existed.
    async fn delete_by_name(&self, name: &str) -> Result<bool>;

    /// Remove every named definition in one step. Missing names are ignored.
    /// Returns the names actually removed, in request order.
    async fn delete_by_names(&self, names: &[String]) -> Result<Vec<String>>;

    /// Remove everything. Returns the removed names.
    async fn delete_all(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<usize>;

    async fn find_all(&self, page: PageRequest) -> Result<Page<TaskDefinition>>;

    async fn find_by_name_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>>;

    async fn find_by_dsl_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>>;

    async fn find_by_description_contains(
        &self,
        fragment: &str,
        page: PageRequest,
    ) -> Result<Page<TaskDefinition>>;

    /// All definitions whose name starts with `prefix`.
    async fn find_by_name_prefix(&self, prefix: &str) -> Result<Vec<TaskDefinition>>;
}

/// Read/record access to task executions and their manifests.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Most recent execution (highest id) of `task_name`.
    async fn latest_execution(&self, task_name: &str) -> Result<Option<TaskExecution>>;

    async fn manifest(&self, execution_id: i64) -> Result<Option<TaskManifest>>;

    /// Reserve the next execution of `task_name`. It has an id but has not
    /// started yet.
    async fn create_execution(&self, task_name: &str) -> Result<TaskExecution>;

    /// Start a reserved execution with the launched request's arguments and
    /// store its manifest. Returns the execution.
    ///
    /// # Errors
    /// `BadRequest` if no execution has this id.
    async fn record_launch(
        &self,
        execution_id: i64,
        platform_name: &str,
        request: &LaunchRequest,
        external_execution_id: &str,
    ) -> Result<TaskExecution>;

    /// Remove a reserved execution whose launch did not happen.
    async fn discard_execution(&self, execution_id: i64) -> Result<()>;

    /// Whether `task_name` has ever been launched.
    async fn has_launched(&self, task_name: &str) -> Result<bool>;
}
