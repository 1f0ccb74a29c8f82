//! Task DSL: parsing of single and composed task definitions.
//!
//! `app --k=v` describes one task; `t1: a && t2: b` describes a composed
//! task whose elements become child definitions named `<root>-<label>`.

mod graph;
mod parser;

pub use graph::{ComposedTaskGraph, ControlEdge, TaskNode, TaskOption};
pub use parser::{is_valid_identifier, parse};

pub(crate) use graph::render_option;
pub(crate) use parser::tokenize;
