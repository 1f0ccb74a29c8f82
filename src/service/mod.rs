//! Task definition service.
//!
//! [`TaskService`] is the transport-agnostic surface over the engine:
//! create, list, get, delete, delete-all, launch and validate. Each
//! operation is a request-scoped unit of work against the shared stores.

pub mod args;
pub mod deletion;
pub mod expander;
pub mod launch;
pub mod properties;
pub mod validate;
pub mod view;

use std::sync::Arc;

use crate::config::Config;
use crate::core::{LaunchRequest, TaskDefinition, TaskExecution};
use crate::launcher::TaskLauncher;
use crate::registry::AppRegistry;
use crate::sanitize::ArgumentSanitizer;
use crate::store::{ExecutionStore, Page, PageRequest, TaskDefinitionRepository};
use crate::{Error, Result};

pub use launch::LaunchSettings;
pub use validate::ValidationStatus;
pub use view::{TaskDefinitionView, TaskExecutionView, TaskViewBuilder};

/// Listing filters. At most one of `name`, `dsl` and `description` applies;
/// `name` together with either other filter is rejected.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub name: Option<String>,
    pub dsl: Option<String>,
    pub description: Option<String>,
    /// Include manifest deployment properties in execution views.
    pub manifest: bool,
    pub page: PageRequest,
}

enum Filter<'a> {
    All,
    Name(&'a str),
    Dsl(&'a str),
    Description(&'a str),
}

impl ListQuery {
    fn filter(&self) -> Result<Filter<'_>> {
        match (
            self.name.as_deref(),
            self.dsl.as_deref(),
            self.description.as_deref(),
        ) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::BadRequest(
                "cannot filter by task name together with dsl text or description".to_string(),
            )),
            (_, Some(_), Some(_)) => Err(Error::BadRequest(
                "cannot filter by dsl text together with description".to_string(),
            )),
            (Some(name), None, None) => Ok(Filter::Name(name)),
            (None, Some(dsl), None) => Ok(Filter::Dsl(dsl)),
            (None, None, Some(description)) => Ok(Filter::Description(description)),
            (None, None, None) => Ok(Filter::All),
        }
    }
}

pub struct TaskService {
    repository: Arc<dyn TaskDefinitionRepository>,
    registry: Arc<dyn AppRegistry>,
    launcher: Arc<dyn TaskLauncher>,
    executions: Arc<dyn ExecutionStore>,
    views: TaskViewBuilder,
    settings: LaunchSettings,
}

impl TaskService {
    pub fn new(
        repository: Arc<dyn TaskDefinitionRepository>,
        registry: Arc<dyn AppRegistry>,
        launcher: Arc<dyn TaskLauncher>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            repository,
            registry,
            launcher,
            executions,
            views: TaskViewBuilder::default(),
            settings: LaunchSettings::default(),
        }
    }

    /// Apply sanitizer patterns and launch settings from `config`.
    ///
    /// # Errors
    /// `Config` for an invalid sensitive key pattern.
    pub fn with_config(mut self, config: &Config) -> Result<Self> {
        self.views = TaskViewBuilder::new(ArgumentSanitizer::with_patterns(config.sensitive_keys.as_slice())?);
        self.settings = LaunchSettings::from_config(config);
        Ok(self)
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Create a definition (and its children for composed DSL).
    pub async fn create(
        &self,
        name: &str,
        dsl_text: &str,
        description: Option<&str>,
    ) -> Result<TaskDefinition> {
        expander::save(
            self.repository.as_ref(),
            self.registry.as_ref(),
            name,
            dsl_text,
            description,
        )
        .await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<TaskDefinitionView>> {
        let repository = self.repository.as_ref();
        let page = match query.filter()? {
            Filter::All => repository.find_all(query.page).await?,
            Filter::Name(name) => repository.find_by_name_contains(name, query.page).await?,
            Filter::Dsl(dsl) => repository.find_by_dsl_contains(dsl, query.page).await?,
            Filter::Description(text) => {
                repository
                    .find_by_description_contains(text, query.page)
                    .await?
            }
        };

        let mut views = Vec::with_capacity(page.content.len());
        for definition in &page.content {
            views.push(self.view(definition, query.manifest).await?);
        }
        Ok(page.with_content(views))
    }

    pub async fn get(&self, name: &str, manifest: bool) -> Result<TaskDefinitionView> {
        let definition = self
            .repository
            .find_by_name(name)
            .await?
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.view(&definition, manifest).await
    }

    /// Delete `name` (with its children when it is a composed root).
    pub async fn delete(&self, name: &str) -> Result<Vec<String>> {
        deletion::delete(
            self.repository.as_ref(),
            self.executions.as_ref(),
            self.launcher.as_ref(),
            name,
        )
        .await
    }

    pub async fn delete_all(&self) -> Result<Vec<String>> {
        deletion::delete_all(
            self.repository.as_ref(),
            self.executions.as_ref(),
            self.launcher.as_ref(),
        )
        .await
    }

    /// Launch `name` with an optional raw argument string and an optional
    /// comma-separated property string.
    pub async fn launch(
        &self,
        name: &str,
        arguments: Option<&str>,
        properties: Option<&str>,
    ) -> Result<TaskExecution> {
        launch::launch(
            self.repository.as_ref(),
            self.registry.as_ref(),
            self.launcher.as_ref(),
            self.executions.as_ref(),
            &self.settings,
            name,
            arguments,
            properties,
        )
        .await
    }

    /// Build the request `launch` would send, without launching.
    pub async fn assemble(
        &self,
        name: &str,
        arguments: Option<&str>,
        properties: Option<&str>,
    ) -> Result<LaunchRequest> {
        launch::assemble(
            self.repository.as_ref(),
            self.registry.as_ref(),
            &self.settings,
            name,
            arguments,
            properties,
        )
        .await
    }

    pub async fn validate(&self, name: &str) -> Result<ValidationStatus> {
        validate::validate(
            self.repository.as_ref(),
            self.registry.as_ref(),
            self.views.sanitizer(),
            name,
        )
        .await
    }

    async fn view(&self, definition: &TaskDefinition, manifest: bool) -> Result<TaskDefinitionView> {
        self.views
            .build(
                self.repository.as_ref(),
                self.executions.as_ref(),
                definition,
                manifest,
            )
            .await
    }
}
