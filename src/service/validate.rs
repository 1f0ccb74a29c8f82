//! Registry validation of a stored definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{child_name, TaskDefinition};
use crate::registry::{AppRegistry, ApplicationType};
use crate::sanitize::ArgumentSanitizer;
use crate::store::TaskDefinitionRepository;
use crate::{Error, Result};

pub const VALID: &str = "valid";
pub const INVALID: &str = "invalid";

/// Result of validating one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub app_name: String,
    /// Sanitized DSL of the definition.
    pub dsl: String,
    /// `task:<definition>` to `valid` / `invalid`.
    pub app_statuses: BTreeMap<String, String>,
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        self.app_statuses.values().all(|s| s == VALID)
    }
}

/// Check every app the definition runs against the registry. A composed
/// root reports one entry per child, a simple definition one entry for
/// itself.
///
/// # Errors
/// `NotFound` when `name` is not stored.
pub async fn validate(
    repository: &dyn TaskDefinitionRepository,
    registry: &dyn AppRegistry,
    sanitizer: &ArgumentSanitizer,
    name: &str,
) -> Result<ValidationStatus> {
    let definition = repository
        .find_by_name(name)
        .await?
        .ok_or_else(|| Error::NotFound(name.to_string()))?;

    let mut app_statuses = BTreeMap::new();
    for (element, app) in elements(&definition)? {
        let known = registry
            .resolve(&app, ApplicationType::Task, None)
            .await?
            .is_some();
        app_statuses.insert(
            format!("task:{}", element),
            if known { VALID } else { INVALID }.to_string(),
        );
    }

    Ok(ValidationStatus {
        app_name: definition.name.clone(),
        dsl: sanitizer.sanitize_dsl(&definition.dsl_text),
        app_statuses,
    })
}

/// `(definition name, app name)` pairs to check.
fn elements(definition: &TaskDefinition) -> Result<Vec<(String, String)>> {
    let graph = definition.graph()?;
    if !graph.is_composed() {
        return Ok(vec![(
            definition.name.clone(),
            definition.registered_app_name.clone(),
        )]);
    }
    Ok(graph
        .nodes()
        .filter_map(|node| {
            node.label()
                .map(|label| (child_name(&definition.name, label), node.app_name().to_string()))
        })
        .collect())
}
