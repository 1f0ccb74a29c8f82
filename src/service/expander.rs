//! Materializes submitted DSL into stored task definitions.
//!
//! A simple DSL becomes one definition. A composed DSL becomes a root holding
//! the normalized DSL plus one child per element named `<root>-<label>`.
//! Parent linkage is never stored; it is recomputed from the root's DSL.

use crate::core::{child_name, TaskDefinition, COMPOSED_TASK_RUNNER};
use crate::dsl::{self, is_valid_identifier};
use crate::registry::{AppRegistry, ApplicationType};
use crate::store::TaskDefinitionRepository;
use crate::{twlog, twlog_debug, Error, Result};

/// Build the definitions for a submission without touching any store.
/// The root comes first, children follow in DSL order.
///
/// # Errors
/// `BadRequest` for an invalid root name, `DslParse` for invalid DSL.
pub fn expand(name: &str, dsl_text: &str, description: Option<&str>) -> Result<Vec<TaskDefinition>> {
    if !is_valid_identifier(name) {
        return Err(Error::BadRequest(format!("invalid task name '{}'", name)));
    }
    let graph = dsl::parse(dsl_text)?;

    let with_description = |definition: TaskDefinition| match description {
        Some(text) => definition.with_description(text),
        None => definition,
    };

    if !graph.is_composed() {
        return Ok(vec![with_description(TaskDefinition::from_graph(
            name, dsl_text, &graph,
        ))]);
    }

    let mut definitions = Vec::with_capacity(graph.len() + 1);
    definitions.push(with_description(TaskDefinition::from_parts(
        name,
        &graph.to_dsl(),
        COMPOSED_TASK_RUNNER,
        Default::default(),
    )));
    for node in graph.nodes() {
        let Some(label) = node.label() else {
            continue;
        };
        definitions.push(TaskDefinition::from_parts(
            &child_name(name, label),
            &node.element_dsl(),
            node.app_name(),
            node.properties(),
        ));
    }
    Ok(definitions)
}

/// Expand, check every app against the registry and persist atomically.
/// Returns the stored root.
///
/// # Errors
/// `UnknownApp` before anything is written if an element's app is not a
/// registered task app; `DuplicateTaskName` if the root or any child name is
/// taken.
pub async fn save(
    repository: &dyn TaskDefinitionRepository,
    registry: &dyn AppRegistry,
    name: &str,
    dsl_text: &str,
    description: Option<&str>,
) -> Result<TaskDefinition> {
    let definitions = expand(name, dsl_text, description)?;

    // Composed roots run on the composed task runner, which is checked at launch
    for definition in definitions
        .iter()
        .filter(|d| d.registered_app_name != COMPOSED_TASK_RUNNER)
    {
        let app = &definition.registered_app_name;
        if registry.resolve(app, ApplicationType::Task, None).await?.is_none() {
            twlog_debug!("Rejecting {}: unknown task app {}", name, app);
            return Err(Error::UnknownApp(app.clone()));
        }
    }

    let count = definitions.len();
    let mut saved = repository.save_all(definitions).await?;
    twlog!("Created task {} ({} definitions)", name, count);
    Ok(saved.remove(0))
}

/// The stored root that generated `definition`, if it is a composed task
/// element.
///
/// Every `-` in the name is tried as the split point; the prefix must be a
/// stored composed definition whose element under the suffix label matches
/// `definition`.
pub async fn composed_parent(
    repository: &dyn TaskDefinitionRepository,
    definition: &TaskDefinition,
) -> Result<Option<TaskDefinition>> {
    let name = definition.name.as_str();
    for (index, _) in name.match_indices('-') {
        let parent = &name[..index];
        if parent.is_empty() || index + 1 == name.len() {
            continue;
        }
        if let Some(root) = repository.find_by_name(parent).await? {
            if root.generated(definition) {
                return Ok(Some(root));
            }
        }
    }
    Ok(None)
}
