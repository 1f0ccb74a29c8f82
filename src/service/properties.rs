//! App property layering.
//!
//! Launch properties come from several sources merged in ascending
//! precedence. Each source is one named layer; later layers overwrite keys
//! of earlier ones.

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::blocking;
use crate::{twlog_debug, twlog_trace, Error, Result};

/// One named source of properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLayer {
    pub name: &'static str,
    pub properties: BTreeMap<String, String>,
}

/// Ordered list of property layers, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct PropertyOverlay {
    layers: Vec<PropertyLayer>,
}

impl PropertyOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer above every layer added so far.
    pub fn layer(mut self, name: &'static str, properties: BTreeMap<String, String>) -> Self {
        self.layers.push(PropertyLayer { name, properties });
        self
    }

    pub fn layers(&self) -> &[PropertyLayer] {
        &self.layers
    }

    /// Collapse the layers into a single map.
    pub fn merge(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for layer in &self.layers {
            twlog_trace!("Applying property layer {} ({} keys)", layer.name, layer.properties.len());
            for (key, value) in &layer.properties {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// Read a common properties file. `.yml`/`.yaml` files are flattened to
/// dotted keys; anything else is read as a properties file.
/// Values are kept verbatim, `${..}` placeholders included.
pub fn load_common_properties(path: &Path) -> Result<BTreeMap<String, String>> {
    twlog_debug!("Loading common properties from {}", path.display());
    if !path.exists() {
        return Err(Error::Config(format!(
            "common properties file not found: {}",
            path.display()
        )));
    }
    let contents = fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    );
    if is_yaml {
        parse_yaml_properties(&contents)
    } else {
        Ok(parse_properties_text(&contents))
    }
}

pub async fn load_common_properties_async(path: &Path) -> Result<BTreeMap<String, String>> {
    let path: PathBuf = path.to_path_buf();
    blocking(move || load_common_properties(&path)).await
}

/// Flatten a YAML document into dotted keys. Sequences use `key[i]`.
pub fn parse_yaml_properties(contents: &str) -> Result<BTreeMap<String, String>> {
    let value: Value = serde_yaml::from_str(contents)?;
    let mut out = BTreeMap::new();
    flatten_yaml("", &value, &mut out);
    Ok(out)
}

fn flatten_yaml(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = scalar_string(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_yaml(&path, child, out);
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_yaml(&format!("{}[{}]", prefix, i), child, out);
            }
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out),
        scalar => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), scalar_string(scalar).unwrap_or_default());
            }
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Parse `key=value` / `key: value` lines. `#` and `!` start comments.
pub fn parse_properties_text(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| {
            let split = line.find(['=', ':']);
            match split {
                Some(i) => (line[..i].trim().to_string(), line[i + 1..].trim().to_string()),
                None => (line.to_string(), String::new()),
            }
        })
        .collect()
}
