//! Task DSL parser.
//!
//! Grammar:
//!
//! ```text
//! dsl     := element ('&&' element)*
//! element := [label ':'] app (ws option)*
//! option  := '--' key '=' value
//! ```
//!
//! Values may be wrapped in single quotes to carry whitespace, `|` or `&&`
//! literally. Error positions are byte offsets into the submitted text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::graph::{ComposedTaskGraph, TaskNode, TaskOption};
use crate::{Error, Result};

const QUOTE: char = '\'';
const IMPLICIT_LABEL_PREFIX: &str = "t";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap());

/// Whether `s` is usable as a task name, label or app name.
pub fn is_valid_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

/// Parse DSL text into a composed task graph.
///
/// A single unlabeled element yields a simple (non-composed) graph with one
/// node whose label is `None`. Any other shape is composed and every node
/// carries a label, explicit or sequential (`t1`, `t2`, ...).
pub fn parse(dsl: &str) -> Result<ComposedTaskGraph> {
    let segments = split_elements(dsl)?;
    let mut elements = Vec::with_capacity(segments.len());
    for (offset, segment) in segments {
        elements.push(parse_element(segment, offset)?);
    }

    let explicit: HashSet<String> = {
        let mut seen = HashSet::new();
        for element in &elements {
            if let Some(label) = &element.label {
                if !seen.insert(label.clone()) {
                    return Err(Error::dsl(
                        element.offset,
                        format!("duplicate label '{}'", label),
                    ));
                }
            }
        }
        seen
    };

    let composed = elements.len() > 1 || !explicit.is_empty();
    let mut next = 1usize;
    let mut graph = ComposedTaskGraph::new(composed);
    for element in elements {
        let label = match element.label {
            Some(label) => Some(label),
            None if composed => {
                let mut candidate = format!("{}{}", IMPLICIT_LABEL_PREFIX, next);
                while explicit.contains(&candidate) {
                    next += 1;
                    candidate = format!("{}{}", IMPLICIT_LABEL_PREFIX, next);
                }
                next += 1;
                Some(candidate)
            }
            None => None,
        };
        graph.push(TaskNode::new(label, element.app_name, element.options));
    }
    Ok(graph)
}

struct ParsedElement {
    offset: usize,
    label: Option<String>,
    app_name: String,
    options: Vec<TaskOption>,
}

/// Split on `&&` outside single quotes.
fn split_elements(dsl: &str) -> Result<Vec<(usize, &str)>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote_open: Option<usize> = None;
    let bytes = dsl.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                quote_open = match quote_open {
                    Some(_) => None,
                    None => Some(i),
                };
            }
            b'&' if quote_open.is_none() && bytes.get(i + 1) == Some(&b'&') => {
                segments.push(checked_segment(dsl, start, i)?);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if let Some(pos) = quote_open {
        return Err(Error::dsl(pos, "unmatched quote"));
    }
    segments.push(checked_segment(dsl, start, dsl.len())?);
    Ok(segments)
}

fn checked_segment(dsl: &str, start: usize, end: usize) -> Result<(usize, &str)> {
    let raw = &dsl[start..end];
    let trimmed = raw.trim_start();
    let offset = start + (raw.len() - trimmed.len());
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        return Err(Error::dsl(start, "empty app name"));
    }
    Ok((offset, trimmed))
}

/// Whitespace tokenizer that keeps quoted spans (quotes included) inside
/// their token. Returns `(offset, token)` pairs.
pub(crate) fn tokenize(text: &str, base: usize) -> Result<Vec<(usize, &str)>> {
    let mut tokens = Vec::new();
    let mut token_start: Option<usize> = None;
    let mut quote_open: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c == QUOTE {
            quote_open = match quote_open {
                Some(_) => None,
                None => Some(i),
            };
            token_start.get_or_insert(i);
        } else if c.is_whitespace() && quote_open.is_none() {
            if let Some(start) = token_start.take() {
                tokens.push((base + start, &text[start..i]));
            }
        } else {
            token_start.get_or_insert(i);
        }
    }
    if let Some(pos) = quote_open {
        return Err(Error::dsl(base + pos, "unmatched quote"));
    }
    if let Some(start) = token_start {
        tokens.push((base + start, &text[start..]));
    }
    Ok(tokens)
}

fn parse_element(segment: &str, offset: usize) -> Result<ParsedElement> {
    let tokens = tokenize(segment, offset)?;
    let mut iter = tokens.into_iter();

    let (first_pos, first) = iter
        .next()
        .ok_or_else(|| Error::dsl(offset, "empty app name"))?;

    let (label, app_pos, app_name) = if let Some(label) = first.strip_suffix(':') {
        match iter.next() {
            Some((pos, app)) if !app.starts_with("--") => (Some(label), pos, app),
            _ => return Err(Error::dsl(first_pos, "empty app name")),
        }
    } else if !first.starts_with("--") && first.contains(':') {
        let (label, app) = first.split_once(':').unwrap_or((first, ""));
        (Some(label), first_pos + label.len() + 1, app)
    } else {
        (None, first_pos, first)
    };

    if let Some(label) = label {
        if !is_valid_identifier(label) {
            return Err(Error::dsl(first_pos, format!("invalid label '{}'", label)));
        }
    }
    if app_name.is_empty() || app_name.starts_with("--") {
        return Err(Error::dsl(app_pos, "empty app name"));
    }
    if !is_valid_identifier(app_name) {
        return Err(Error::dsl(
            app_pos,
            format!("invalid app name '{}'", app_name),
        ));
    }

    let mut options = Vec::new();
    for (pos, token) in iter {
        options.push(parse_option(token, pos)?);
    }

    Ok(ParsedElement {
        offset,
        label: label.map(str::to_string),
        app_name: app_name.to_string(),
        options,
    })
}

fn parse_option(token: &str, pos: usize) -> Result<TaskOption> {
    let body = token.strip_prefix("--").ok_or_else(|| {
        Error::dsl(
            pos,
            format!("expected option of the form --key=value, found '{}'", token),
        )
    })?;
    let (key, value) = body
        .split_once('=')
        .ok_or_else(|| Error::dsl(pos, format!("option '{}' is missing '='", token)))?;
    if key.is_empty() {
        return Err(Error::dsl(pos, "option key is empty"));
    }
    Ok(TaskOption::new(key, &unquote(value)))
}

/// Strip the quotes around a fully quoted value, turning each doubled `''`
/// inside it back into a single quote. Other values are kept as written.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with(QUOTE) && value.ends_with(QUOTE) {
        value[1..value.len() - 1].replace("''", "'")
    } else {
        value.to_string()
    }
}
