//! JSON state file holding every in-memory store.
//!
//! The CLI loads a snapshot at startup, works on the in-memory stores built
//! from it and writes it back afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::memory::{ExecutionRecords, InMemoryExecutionStore, InMemoryTaskDefinitionRepository};
use crate::core::TaskDefinition;
use crate::registry::{AppRegistration, InMemoryAppRegistry};
use crate::util::blocking;
use crate::{twlog_debug, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub definitions: Vec<TaskDefinition>,
    #[serde(default)]
    pub apps: Vec<AppRegistration>,
    #[serde(default)]
    pub executions: ExecutionRecords,
}

/// Stores rebuilt from a snapshot.
pub struct Stores {
    pub definitions: InMemoryTaskDefinitionRepository,
    pub registry: InMemoryAppRegistry,
    pub executions: InMemoryExecutionStore,
}

impl StateSnapshot {
    pub async fn load(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        blocking(move || Self::load_sync(&path)).await
    }

    /// Read the snapshot at `path`; a missing file is an empty state.
    pub fn load_sync(path: &Path) -> Result<Self> {
        twlog_debug!("StateSnapshot::load_sync path={}", path.display());

        if !path.exists() {
            twlog_debug!("State file not found, returning empty state");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let snapshot: StateSnapshot = serde_json::from_str(&contents)?;
        twlog_debug!(
            "State loaded: {} definitions, {} apps, {} executions",
            snapshot.definitions.len(),
            snapshot.apps.len(),
            snapshot.executions.executions.len()
        );
        Ok(snapshot)
    }

    /// Write the snapshot, keeping the previous file as `.json.bak`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        twlog_debug!("StateSnapshot::save definitions={}", self.definitions.len());
        let contents = serde_json::to_string_pretty(self)?;
        let state_path: PathBuf = path.to_path_buf();

        blocking(move || {
            if let Some(dir) = state_path.parent() {
                if !dir.as_os_str().is_empty() && !dir.exists() {
                    twlog_debug!("Creating state directory: {}", dir.display());
                    fs::create_dir_all(dir)?;
                }
            }

            if state_path.exists() {
                let backup_path = state_path.with_extension("json.bak");
                twlog_debug!("Creating state backup: {}", backup_path.display());
                fs::copy(&state_path, &backup_path)?;
            }

            let temp_path = state_path.with_extension("json.tmp");
            fs::write(&temp_path, &contents)?;
            fs::rename(&temp_path, &state_path)?;
            twlog_debug!("State saved: {}", state_path.display());

            Ok(())
        })
        .await
    }

    /// Capture the current content of the stores.
    pub async fn capture(stores: &Stores) -> Self {
        Self {
            definitions: stores.definitions.definitions().await,
            apps: stores.registry.registrations().await,
            executions: stores.executions.records().await,
        }
    }

    /// Build in-memory stores holding this snapshot.
    pub fn into_stores(self) -> Result<Stores> {
        Ok(Stores {
            definitions: InMemoryTaskDefinitionRepository::with_definitions(self.definitions)?,
            registry: InMemoryAppRegistry::with_registrations(self.apps),
            executions: InMemoryExecutionStore::with_records(self.executions),
        })
    }
}
