//! Composed task graph.
//!
//! The parsed form of a task DSL: labeled task nodes joined by control edges.
//! Nodes keep DSL order; edges record which node runs after which.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Control operator joining two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEdge {
    /// `a && b`: `b` runs once `a` has completed successfully.
    OnSuccess,
}

impl std::fmt::Display for ControlEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlEdge::OnSuccess => write!(f, "&&"),
        }
    }
}

/// A single `--key=value` option of a DSL element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOption {
    pub key: String,
    pub value: String,
}

impl TaskOption {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Canonical `--key=value` form; the value is single-quoted when it
    /// holds whitespace, `|`, `&` or `'`, or is empty. Quotes inside a quoted
    /// value are doubled.
    pub fn render(&self) -> String {
        render_option(&self.key, &self.value, false)
    }
}

/// Render an option, forcing quotes when `quote` is set.
pub(crate) fn render_option(key: &str, value: &str, quote: bool) -> String {
    let needs_quotes = quote
        || value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '|' || c == '&' || c == '\'');
    if needs_quotes {
        format!("--{}='{}'", key, value.replace('\'', "''"))
    } else {
        format!("--{}={}", key, value)
    }
}

/// One element of a task DSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    label: Option<String>,
    app_name: String,
    options: Vec<TaskOption>,
}

impl TaskNode {
    pub fn new(label: Option<String>, app_name: String, options: Vec<TaskOption>) -> Self {
        Self {
            label,
            app_name,
            options,
        }
    }

    /// Label of the node; `None` only for a simple single-element DSL.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn options(&self) -> &[TaskOption] {
        &self.options
    }

    /// Options as a map. Later occurrences of a key win.
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|o| (o.key.clone(), o.value.clone()))
            .collect()
    }

    /// The element without its label, e.g. `task --foo='bar rab'`.
    pub fn element_dsl(&self) -> String {
        self.render_with(|option| option.render())
    }

    fn render_with<F>(&self, render_option: F) -> String
    where
        F: Fn(&TaskOption) -> String,
    {
        let mut out = self.app_name.clone();
        for option in &self.options {
            out.push(' ');
            out.push_str(&render_option(option));
        }
        out
    }
}

/// Parsed task DSL.
///
/// Uses petgraph's DiGraph to keep nodes and control edges. A graph is
/// *composed* when it has more than one element or any labeled element; in
/// that case every node has a label.
#[derive(Clone)]
pub struct ComposedTaskGraph {
    graph: DiGraph<TaskNode, ControlEdge>,
    /// Node indices in DSL order.
    order: Vec<NodeIndex>,
    label_index: HashMap<String, NodeIndex>,
    composed: bool,
}

impl ComposedTaskGraph {
    pub(crate) fn new(composed: bool) -> Self {
        Self {
            graph: DiGraph::new(),
            order: Vec::new(),
            label_index: HashMap::new(),
            composed,
        }
    }

    /// Append a node, linking it to the previous node with `OnSuccess`.
    pub(crate) fn push(&mut self, node: TaskNode) -> NodeIndex {
        let label = node.label.clone();
        let index = self.graph.add_node(node);
        if let Some(&previous) = self.order.last() {
            self.graph.add_edge(previous, index, ControlEdge::OnSuccess);
        }
        if let Some(label) = label {
            self.label_index.insert(label, index);
        }
        self.order.push(index);
        index
    }

    pub fn is_composed(&self) -> bool {
        self.composed
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in DSL order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.order
            .iter()
            .filter_map(move |&index| self.graph.node_weight(index))
    }

    /// Labels in DSL order (empty for a simple DSL).
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes().filter_map(TaskNode::label)
    }

    pub fn node(&self, label: &str) -> Option<&TaskNode> {
        self.label_index
            .get(label)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Nodes that run after `label` completes, with the joining operator.
    pub fn successors(&self, label: &str) -> Vec<(&TaskNode, ControlEdge)> {
        let Some(&index) = self.label_index.get(label) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                self.graph
                    .node_weight(edge.target())
                    .map(|node| (node, *edge.weight()))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Canonical DSL: `label: app --k=v && label: app` for composed graphs,
    /// `app --k=v` otherwise.
    pub fn to_dsl(&self) -> String {
        self.render_with(|_, option| option.render())
    }

    /// Render with a custom option renderer (used for display masking).
    pub fn render_with<F>(&self, render_option: F) -> String
    where
        F: Fn(&TaskNode, &TaskOption) -> String,
    {
        let elements: Vec<String> = self
            .nodes()
            .map(|node| {
                let body = node.render_with(|option| render_option(node, option));
                match node.label() {
                    Some(label) if self.composed => format!("{}: {}", label, body),
                    _ => body,
                }
            })
            .collect();
        elements.join(&format!(" {} ", ControlEdge::OnSuccess))
    }
}

impl std::fmt::Debug for ComposedTaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedTaskGraph")
            .field("composed", &self.composed)
            .field("nodes", &self.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}
