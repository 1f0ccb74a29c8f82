//! Redaction of sensitive values for display.
//!
//! Arguments (`--key=value`), property maps and DSL text are masked by key:
//! a key is sensitive when any configured pattern matches it,
//! case-insensitively. Masking is idempotent.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

use crate::dsl::{self, render_option};
use crate::{Error, Result};

/// Replacement for a redacted value.
pub const MASK: &str = "******";

/// Key fragments that are redacted when nothing else is configured.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &["password", "secret", "key", "token"];

#[derive(Debug, Clone)]
pub struct ArgumentSanitizer {
    patterns: Vec<Regex>,
}

impl Default for ArgumentSanitizer {
    fn default() -> Self {
        let patterns = DEFAULT_SENSITIVE_KEYS
            .iter()
            .filter_map(|key| {
                RegexBuilder::new(&regex::escape(key))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self { patterns }
    }
}

impl ArgumentSanitizer {
    /// Build from regex patterns. Plain words behave as substring matches.
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::Config(format!("invalid sensitive key pattern '{}': {}", p.as_ref(), e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(key))
    }

    /// Mask a single `--key=value` (or `key=value`) argument. Tokens without
    /// `=` pass through untouched.
    pub fn sanitize_argument(&self, argument: &str) -> String {
        match argument.split_once('=') {
            Some((key, _)) if self.is_sensitive(key.trim_start_matches('-')) => {
                format!("{}={}", key, MASK)
            }
            _ => argument.to_string(),
        }
    }

    pub fn sanitize_arguments<S: AsRef<str>>(&self, arguments: &[S]) -> Vec<String> {
        arguments
            .iter()
            .map(|a| self.sanitize_argument(a.as_ref()))
            .collect()
    }

    pub fn sanitize_properties(&self, properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        properties
            .iter()
            .map(|(k, v)| {
                let value = if self.is_sensitive(k) {
                    MASK.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Mask sensitive option values in DSL text, e.g.
    /// `timestamp --password=pw` becomes `timestamp --password='******'`.
    ///
    /// Text without sensitive options, or that does not parse, is returned
    /// unchanged.
    pub fn sanitize_dsl(&self, dsl_text: &str) -> String {
        let Ok(graph) = dsl::parse(dsl_text) else {
            return dsl_text.to_string();
        };
        let has_sensitive = graph
            .nodes()
            .flat_map(|node| node.options())
            .any(|option| self.is_sensitive(&option.key));
        if !has_sensitive {
            return dsl_text.to_string();
        }
        graph.render_with(|_, option| {
            if self.is_sensitive(&option.key) {
                render_option(&option.key, MASK, true)
            } else {
                option.render()
            }
        })
    }
}
