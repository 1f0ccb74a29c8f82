//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A recording launcher that never starts processes
//! - A fully wired service over in-memory stores
//! - Registering task apps

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use taskweave::config::Config;
use taskweave::core::LaunchRequest;
use taskweave::launcher::TaskLauncher;
use taskweave::registry::{AppRegistration, ApplicationType, InMemoryAppRegistry};
use taskweave::store::{InMemoryExecutionStore, InMemoryTaskDefinitionRepository};
use taskweave::{Result, TaskService};

/// Launcher that records what it was asked to do.
pub struct RecordingLauncher {
    /// Id handed back for every launch; `None` simulates a platform refusal.
    pub next_id: Mutex<Option<String>>,
    pub launched: Mutex<Vec<LaunchRequest>>,
    pub destroyed: Mutex<Vec<String>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(Some("ext-1".to_string())),
            launched: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn refuse_launches(&self) {
        *self.next_id.lock().unwrap() = None;
    }

    pub fn last_request(&self) -> LaunchRequest {
        self.launched
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no launch recorded")
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskLauncher for RecordingLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<Option<String>> {
        self.launched.lock().unwrap().push(request.clone());
        Ok(self.next_id.lock().unwrap().clone())
    }

    async fn destroy(&self, task_name: &str) -> Result<()> {
        self.destroyed.lock().unwrap().push(task_name.to_string());
        Ok(())
    }
}

/// A service wired to in-memory stores, with handles on every store.
pub struct TestEngine {
    /// Scratch directory for common properties and state files.
    pub temp_dir: TempDir,
    pub service: TaskService,
    pub repository: InMemoryTaskDefinitionRepository,
    pub registry: InMemoryAppRegistry,
    pub executions: InMemoryExecutionStore,
    pub launcher: Arc<RecordingLauncher>,
}

impl TestEngine {
    /// Engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(|_, _| {})
    }

    /// Engine whose configuration is adjusted by `configure`, which also
    /// gets the scratch directory to place files in.
    pub fn with_config(configure: impl FnOnce(&mut Config, &std::path::Path)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::default();
        configure(&mut config, temp_dir.path());

        let repository = InMemoryTaskDefinitionRepository::new();
        let registry = InMemoryAppRegistry::new();
        let executions = InMemoryExecutionStore::new();
        let launcher = Arc::new(RecordingLauncher::new());

        let service = TaskService::new(
            Arc::new(repository.clone()),
            Arc::new(registry.clone()),
            launcher.clone(),
            Arc::new(executions.clone()),
        )
        .with_config(&config)
        .expect("Failed to apply config");

        Self {
            temp_dir,
            service,
            repository,
            registry,
            executions,
            launcher,
        }
    }

    /// Register each app as a task with a `file:` artifact.
    pub async fn register_apps(&self, names: &[&str]) {
        for name in names {
            self.registry
                .register(AppRegistration::new(
                    name,
                    ApplicationType::Task,
                    "1.0.0",
                    &format!("file:/apps/{}", name),
                ))
                .await
                .expect("Failed to register app");
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.temp_dir.path().join(file)
    }
}
