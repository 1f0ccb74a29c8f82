//! Taskweave - composed task definitions, deletion and launch assembly.
//!
//! The engine parses a small task DSL, expands composed graphs into
//! per-step child definitions, deletes definitions with their children,
//! assembles launch requests from layered properties, and renders
//! sanitized views of definitions and executions.

pub mod config;
pub mod core;
pub mod dsl;
pub mod error;
pub mod launcher;
pub mod log;
pub mod registry;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use service::{ListQuery, TaskService};
