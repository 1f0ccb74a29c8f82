//! Launch request assembly.
//!
//! App properties are merged in ascending precedence:
//!
//! 1. registry defaults, then configured default app properties
//! 2. common properties file
//! 3. DSL options of the definition
//! 4. caller `app.*` properties
//! 5. `spring.cloud.task.name`, always the definition name

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::args::{parse_properties, tokenize_arguments};
use super::properties::{load_common_properties_async, PropertyOverlay};
use crate::config::Config;
use crate::core::{AppDefinition, LaunchRequest, TaskExecution, TASK_NAME_PROPERTY};
use crate::launcher::TaskLauncher;
use crate::registry::{AppRegistry, ApplicationType};
use crate::store::{ExecutionStore, TaskDefinitionRepository};
use crate::{twlog, twlog_debug, twlog_warn, Error, Result};

/// Launch-wide settings taken from configuration.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub platform_name: String,
    pub common_properties_file: Option<PathBuf>,
    pub default_app_properties: BTreeMap<String, String>,
    pub default_deployment_properties: BTreeMap<String, String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl LaunchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            platform_name: config.platform_name.clone(),
            common_properties_file: config.common_properties_path(),
            default_app_properties: config.default_app_properties.clone(),
            default_deployment_properties: config.default_deployment_properties.clone(),
        }
    }
}

/// Build the launch request for `name` without launching it.
///
/// # Errors
/// `NotFound`, `UnknownApp`, `BadRequest` for malformed arguments or
/// properties, and `Config`/`Io`/`Yaml` for an unreadable common
/// properties file.
pub async fn assemble(
    repository: &dyn TaskDefinitionRepository,
    registry: &dyn AppRegistry,
    settings: &LaunchSettings,
    name: &str,
    arguments: Option<&str>,
    properties: Option<&str>,
) -> Result<LaunchRequest> {
    let definition = repository
        .find_by_name(name)
        .await?
        .ok_or_else(|| Error::NotFound(name.to_string()))?;

    let app = &definition.registered_app_name;
    let resolved = registry
        .resolve(app, ApplicationType::Task, None)
        .await?
        .ok_or_else(|| Error::UnknownApp(app.clone()))?;

    let command_line_arguments = tokenize_arguments(arguments)?;
    let caller = parse_properties(properties)?;

    let common = match &settings.common_properties_file {
        Some(path) => load_common_properties_async(path).await?,
        None => BTreeMap::new(),
    };

    let mut forced = BTreeMap::new();
    forced.insert(TASK_NAME_PROPERTY.to_string(), definition.name.clone());

    let app_properties = PropertyOverlay::new()
        .layer("registry", resolved.default_properties)
        .layer("defaults", settings.default_app_properties.clone())
        .layer("common", common)
        .layer("dsl", definition.properties.clone())
        .layer("caller", caller.app)
        .layer("task-name", forced)
        .merge();

    let deployment_properties = PropertyOverlay::new()
        .layer("defaults", settings.default_deployment_properties.clone())
        .layer("caller", caller.deployment)
        .merge();

    twlog_debug!(
        "Assembled launch of {}: {} app properties, {} deployment properties, {} arguments",
        definition.name,
        app_properties.len(),
        deployment_properties.len(),
        command_line_arguments.len()
    );

    Ok(LaunchRequest::new(
        AppDefinition {
            name: definition.name,
            properties: app_properties,
        },
        resolved.uri,
        deployment_properties,
        command_line_arguments,
    ))
}

/// Assemble, launch and record one execution of `name`.
///
/// The execution is reserved before the launcher is called so its id can be
/// passed as the last argument. A launch that does not happen discards it.
///
/// # Errors
/// Everything [`assemble`] returns, plus `LaunchFailed` when the launcher
/// returns no id.
#[allow(clippy::too_many_arguments)]
pub async fn launch(
    repository: &dyn TaskDefinitionRepository,
    registry: &dyn AppRegistry,
    launcher: &dyn TaskLauncher,
    executions: &dyn ExecutionStore,
    settings: &LaunchSettings,
    name: &str,
    arguments: Option<&str>,
    properties: Option<&str>,
) -> Result<TaskExecution> {
    let request = assemble(repository, registry, settings, name, arguments, properties).await?;
    let reserved = executions.create_execution(name).await?;
    let request = request.with_execution_id(reserved.execution_id);

    let id = match launcher.launch(&request).await {
        Ok(Some(id)) => id,
        outcome => {
            executions.discard_execution(reserved.execution_id).await?;
            twlog_warn!(
                "Launch of {} did not start, discarded execution {}",
                name,
                reserved.execution_id
            );
            return match outcome {
                Err(e) => Err(e),
                _ => Err(Error::LaunchFailed(name.to_string())),
            };
        }
    };
    let execution = executions
        .record_launch(reserved.execution_id, &settings.platform_name, &request, &id)
        .await?;
    twlog!(
        "Launched task {} (execution {}, external id {})",
        name,
        execution.execution_id,
        id
    );
    Ok(execution)
}
