//! Caller-supplied launch inputs: the raw argument string and the
//! comma-separated property string.

use std::collections::BTreeMap;

use crate::dsl;
use crate::{Error, Result};

/// Prefix marking a caller property as an app property.
pub const APP_PREFIX: &str = "app.";
/// Optional prefix on deployment properties.
pub const DEPLOYER_PREFIX: &str = "deployer.";

/// Split a raw argument string on whitespace. Single-quoted spans stay
/// inside their token with the quotes kept, so
/// `--foobar3='jee3 jee3'` is one argument.
///
/// # Errors
/// `BadRequest` on an unbalanced quote.
pub fn tokenize_arguments(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let tokens = dsl::tokenize(raw, 0).map_err(|e| match e {
        Error::DslParse { position, .. } => Error::BadRequest(format!(
            "unbalanced quote at position {} in arguments",
            position
        )),
        other => other,
    })?;
    Ok(tokens.into_iter().map(|(_, t)| t.to_string()).collect())
}

/// Caller properties split by destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerProperties {
    /// `app.*` entries with the prefix removed.
    pub app: BTreeMap<String, String>,
    /// Everything else, with any `deployer.` prefix removed.
    pub deployment: BTreeMap<String, String>,
}

/// Parse `k1=v1,k2=v2`. A comma only starts a new entry when the text after
/// it holds an `=`, so values may contain commas (`a=1,2,b=3` gives
/// `a=1,2`).
///
/// # Errors
/// `BadRequest` when an entry has no `=` or an empty key.
pub fn parse_properties(raw: Option<&str>) -> Result<CallerProperties> {
    let mut parsed = CallerProperties::default();
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(parsed);
    };

    let mut entries: Vec<String> = Vec::new();
    for part in raw.split(',') {
        match entries.last_mut() {
            Some(last) if !part.contains('=') => {
                last.push(',');
                last.push_str(part);
            }
            _ => entries.push(part.to_string()),
        }
    }

    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::BadRequest(format!("invalid property '{}', expected key=value", entry)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::BadRequest(format!("property '{}' has an empty key", entry)));
        }
        let value = value.trim().to_string();
        match key.strip_prefix(APP_PREFIX) {
            Some(app_key) if !app_key.is_empty() => {
                parsed.app.insert(app_key.to_string(), value);
            }
            _ => {
                let key = key.strip_prefix(DEPLOYER_PREFIX).unwrap_or(key);
                parsed.deployment.insert(key.to_string(), value);
            }
        }
    }
    Ok(parsed)
}
