//! Application registry.
//!
//! Maps a registered app name, type and optional version to the artifact that
//! runs it, together with registry-level default properties.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{twlog, twlog_debug, Error, Result};

/// Kind of registered application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[default]
    Task,
    App,
}

impl std::fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationType::Task => write!(f, "task"),
            ApplicationType::App => write!(f, "app"),
        }
    }
}

impl std::str::FromStr for ApplicationType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "task" => Ok(ApplicationType::Task),
            "app" => Ok(ApplicationType::App),
            other => Err(Error::BadRequest(format!("unknown application type: {}", other))),
        }
    }
}

/// Artifact plus defaults for a resolved app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedApp {
    pub uri: String,
    #[serde(default)]
    pub default_properties: BTreeMap<String, String>,
}

#[async_trait]
pub trait AppRegistry: Send + Sync {
    /// Resolve `name` of `app_type`. Without a version the default version
    /// is used. `None` when nothing matches.
    async fn resolve(
        &self,
        name: &str,
        app_type: ApplicationType,
        version: Option<&str>,
    ) -> Result<Option<ResolvedApp>>;
}

/// One registered version of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRegistration {
    pub name: String,
    #[serde(rename = "type")]
    pub app_type: ApplicationType,
    pub version: String,
    pub uri: String,
    #[serde(default)]
    pub default_properties: BTreeMap<String, String>,
    /// Whether this version answers unversioned lookups.
    #[serde(default)]
    pub default_version: bool,
}

impl AppRegistration {
    pub fn new(name: &str, app_type: ApplicationType, version: &str, uri: &str) -> Self {
        Self {
            name: name.to_string(),
            app_type,
            version: version.to_string(),
            uri: uri.to_string(),
            default_properties: BTreeMap::new(),
            default_version: false,
        }
    }

    pub fn with_default_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.default_properties = properties;
        self
    }

    fn same_app(&self, name: &str, app_type: ApplicationType) -> bool {
        self.name == name && self.app_type == app_type
    }
}

/// Registry kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppRegistry {
    apps: Arc<RwLock<Vec<AppRegistration>>>,
}

impl InMemoryAppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registrations(registrations: Vec<AppRegistration>) -> Self {
        Self {
            apps: Arc::new(RwLock::new(registrations)),
        }
    }

    /// Register (or replace) one app version.
    ///
    /// The first version registered for a name and type becomes its default.
    ///
    /// # Errors
    /// `BadRequest` for an empty name or URI.
    pub async fn register(&self, mut registration: AppRegistration) -> Result<()> {
        if registration.name.trim().is_empty() {
            return Err(Error::BadRequest("app name must not be empty".to_string()));
        }
        if registration.uri.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "app {} needs an artifact uri",
                registration.name
            )));
        }

        let mut apps = self.apps.write().await;
        apps.retain(|a| {
            !(a.same_app(&registration.name, registration.app_type)
                && a.version == registration.version)
        });
        let has_default = apps
            .iter()
            .any(|a| a.same_app(&registration.name, registration.app_type) && a.default_version);
        if !has_default {
            registration.default_version = true;
        }
        twlog!(
            "Registered {}:{} version {} at {}",
            registration.app_type,
            registration.name,
            registration.version,
            registration.uri
        );
        apps.push(registration);
        Ok(())
    }

    /// Make `version` the default for `name`. Returns false if no such
    /// version is registered.
    pub async fn set_default_version(
        &self,
        name: &str,
        app_type: ApplicationType,
        version: &str,
    ) -> bool {
        let mut apps = self.apps.write().await;
        if !apps
            .iter()
            .any(|a| a.same_app(name, app_type) && a.version == version)
        {
            return false;
        }
        for app in apps.iter_mut().filter(|a| a.same_app(name, app_type)) {
            app.default_version = app.version == version;
        }
        true
    }

    pub async fn registrations(&self) -> Vec<AppRegistration> {
        self.apps.read().await.clone()
    }
}

#[async_trait]
impl AppRegistry for InMemoryAppRegistry {
    async fn resolve(
        &self,
        name: &str,
        app_type: ApplicationType,
        version: Option<&str>,
    ) -> Result<Option<ResolvedApp>> {
        let apps = self.apps.read().await;
        let found = apps.iter().find(|a| {
            a.same_app(name, app_type)
                && match version {
                    Some(v) => a.version == v,
                    None => a.default_version,
                }
        });
        twlog_debug!(
            "Resolve {}:{} version {:?} -> {:?}",
            app_type,
            name,
            version,
            found.map(|a| a.uri.as_str())
        );
        Ok(found.map(|a| ResolvedApp {
            uri: a.uri.clone(),
            default_properties: a.default_properties.clone(),
        }))
    }
}
