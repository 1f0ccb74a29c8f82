//! Task launchers.
//!
//! A launcher takes an assembled [`LaunchRequest`] and starts the app it
//! describes, returning an execution id. `destroy` tears down whatever a
//! launcher keeps for a task name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::LaunchRequest;
use crate::{twlog, twlog_debug, twlog_error, twlog_warn, Result};

#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Start one execution. `None` means the launcher could not start it.
    async fn launch(&self, request: &LaunchRequest) -> Result<Option<String>>;

    /// Stop and forget every running instance of `task_name`.
    async fn destroy(&self, task_name: &str) -> Result<()>;
}

/// Runs `file:` artifacts as local child processes.
///
/// App properties become `--key=value` arguments ahead of the request's
/// command line arguments. Deployment properties are exported as
/// environment variables with dots and dashes turned into underscores and
/// the name upper-cased.
///
/// Instances are tracked only by the launcher that started them; a fresh
/// launcher cannot stop processes started by another one.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    tasks: Arc<RwLock<HashMap<String, TaskInstances>>>,
}

/// One parent token per task name; each instance runs under a child token.
#[derive(Debug)]
struct TaskInstances {
    token: CancellationToken,
    running: usize,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of task names with running instances.
    pub async fn tracked_tasks(&self) -> usize {
        self.tasks.read().await.len()
    }

    async fn instance_token(&self, task_name: &str) -> CancellationToken {
        let mut tasks = self.tasks.write().await;
        let instances = tasks
            .entry(task_name.to_string())
            .or_insert_with(|| TaskInstances {
                token: CancellationToken::new(),
                running: 0,
            });
        instances.running += 1;
        instances.token.child_token()
    }
}

/// Forget an instance that exited on its own; the task name goes with its
/// last instance. Instances stopped by `destroy` are already forgotten.
async fn release_instance(
    tasks: &RwLock<HashMap<String, TaskInstances>>,
    task_name: &str,
    token: &CancellationToken,
) {
    let mut tasks = tasks.write().await;
    if token.is_cancelled() {
        return;
    }
    let last = match tasks.get_mut(task_name) {
        Some(instances) => {
            instances.running = instances.running.saturating_sub(1);
            instances.running == 0
        }
        None => false,
    };
    if last {
        tasks.remove(task_name);
        twlog_debug!("No running instances of {} left", task_name);
    }
}

/// Local path of a `file:` URI, or `None` for any other scheme.
fn file_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file:")?;
    let path = rest.strip_prefix("//").unwrap_or(rest);
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

fn env_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn process_arguments(request: &LaunchRequest) -> Vec<String> {
    request
        .definition()
        .properties
        .iter()
        .map(|(k, v)| format!("--{}={}", k, v))
        .chain(request.command_line_arguments().iter().cloned())
        .collect()
}

#[async_trait]
impl TaskLauncher for ProcessLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<Option<String>> {
        let Some(path) = file_path(request.artifact_location()) else {
            twlog_warn!(
                "Cannot launch {}: unsupported artifact {}",
                request.task_name(),
                request.artifact_location()
            );
            return Ok(None);
        };

        let mut command = Command::new(&path);
        command
            .args(process_arguments(request))
            .envs(
                request
                    .deployment_properties()
                    .iter()
                    .map(|(k, v)| (env_name(k), v.clone())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                twlog_error!("Failed to start {} ({}): {}", request.task_name(), path.display(), e);
                return Ok(None);
            }
        };

        let id = Uuid::new_v4().to_string();
        let token = self.instance_token(request.task_name()).await;
        let task_name = request.task_name().to_string();
        let instance = id.clone();
        let tasks = self.tasks.clone();
        twlog!("Launched {} as {} (pid {:?})", task_name, id, child.id());

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    twlog_debug!("Stopping {} instance {}", task_name, instance);
                    if let Err(e) = child.kill().await {
                        twlog_warn!("Failed to stop {} instance {}: {}", task_name, instance, e);
                    }
                }
                status = child.wait() => {
                    match status {
                        Ok(status) => twlog!("{} instance {} exited with {}", task_name, instance, status),
                        Err(e) => twlog_warn!("{} instance {} wait failed: {}", task_name, instance, e),
                    }
                    release_instance(&tasks, &task_name, &token).await;
                }
            }
        });

        Ok(Some(id))
    }

    async fn destroy(&self, task_name: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if let Some(instances) = tasks.remove(task_name) {
            twlog!("Destroying task {} ({} running)", task_name, instances.running);
            instances.token.cancel();
        }
        Ok(())
    }
}
