//! Task definition model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dsl::{self, ComposedTaskGraph};
use crate::Result;

/// Property that always carries the definition's own name.
pub const TASK_NAME_PROPERTY: &str = "spring.cloud.task.name";

/// Registered app that executes composed roots.
pub const COMPOSED_TASK_RUNNER: &str = "composed-task-runner";

/// A named, stored task definition.
///
/// Root definitions are created by callers; composed roots additionally own
/// generated children named `<root>-<label>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub dsl_text: String,
    pub registered_app_name: String,
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskDefinition {
    /// Build a definition from raw DSL, keeping the text as given.
    ///
    /// Simple DSL takes its app name and options from the single element;
    /// composed DSL is bound to the composed task runner.
    pub fn new(name: &str, dsl_text: &str) -> Result<Self> {
        let graph = dsl::parse(dsl_text)?;
        Ok(Self::from_graph(name, dsl_text, &graph))
    }

    pub(crate) fn from_graph(name: &str, dsl_text: &str, graph: &ComposedTaskGraph) -> Self {
        match graph.nodes().next() {
            Some(node) if !graph.is_composed() => {
                Self::from_parts(name, dsl_text, node.app_name(), node.properties())
            }
            _ => Self::from_parts(name, dsl_text, COMPOSED_TASK_RUNNER, BTreeMap::new()),
        }
    }

    pub(crate) fn from_parts(
        name: &str,
        dsl_text: &str,
        registered_app_name: &str,
        mut properties: BTreeMap<String, String>,
    ) -> Self {
        properties.insert(TASK_NAME_PROPERTY.to_string(), name.to_string());
        Self {
            name: name.to_string(),
            dsl_text: dsl_text.to_string(),
            registered_app_name: registered_app_name.to_string(),
            properties,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Parse the stored DSL.
    pub fn graph(&self) -> Result<ComposedTaskGraph> {
        dsl::parse(&self.dsl_text)
    }

    /// Whether the stored DSL describes a composed task.
    pub fn is_composed(&self) -> bool {
        self.graph().map(|g| g.is_composed()).unwrap_or(false)
    }

    /// Labels of the children this definition generates, in DSL order.
    /// Empty for simple definitions and for DSL that no longer parses.
    pub fn child_labels(&self) -> Vec<String> {
        match self.graph() {
            Ok(graph) if graph.is_composed() => graph.labels().map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Names of the children this definition generates.
    pub fn child_names(&self) -> Vec<String> {
        self.child_labels()
            .iter()
            .map(|label| child_name(&self.name, label))
            .collect()
    }

    /// Whether `candidate` is the child this definition generated for one
    /// of its labels. Name, app and element DSL must all match, so a
    /// definition created later under a generated name is not claimed.
    pub fn generated(&self, candidate: &TaskDefinition) -> bool {
        let Ok(graph) = self.graph() else {
            return false;
        };
        graph.is_composed()
            && graph.nodes().any(|node| {
                node.label()
                    .is_some_and(|label| child_name(&self.name, label) == candidate.name)
                    && node.app_name() == candidate.registered_app_name
                    && node.element_dsl() == candidate.dsl_text
            })
    }
}

/// Name of the child generated for `label` under `root`.
pub fn child_name(root: &str, label: &str) -> String {
    format!("{}-{}", root, label)
}
