//! Dotted source patterns and their evaluation against a document.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::MapperError;

/// One level of a source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `*`: any key at this level, not captured.
    Wildcard,
    /// `{name}`: any key at this level, bound to `name`.
    Capture(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Wildcard => f.write_str("*"),
            Segment::Capture(name) => write!(f, "{{{name}}}"),
        }
    }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> MapperError {
    MapperError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn is_capture_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `pattern` on dots into segments.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, MapperError> {
    if pattern.is_empty() {
        return Err(invalid(pattern, "pattern is empty"));
    }
    pattern
        .split('.')
        .map(|part| {
            if part.is_empty() {
                return Err(invalid(pattern, "empty segment"));
            }
            if part == "*" {
                return Ok(Segment::Wildcard);
            }
            if let Some(inner) = part.strip_prefix('{') {
                let Some(name) = inner.strip_suffix('}') else {
                    return Err(invalid(pattern, format!("unclosed capture in '{part}'")));
                };
                if name.is_empty() {
                    return Err(invalid(pattern, "empty capture name"));
                }
                if !is_capture_name(name) {
                    return Err(invalid(pattern, format!("invalid capture name '{name}'")));
                }
                return Ok(Segment::Capture(name.to_string()));
            }
            if part.contains(['{', '}', '*']) {
                return Err(invalid(
                    pattern,
                    format!("segment '{part}' mixes literal text with a wildcard or capture"),
                ));
            }
            Ok(Segment::Literal(part.to_string()))
        })
        .collect()
}

pub(crate) fn join(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// A `{name}` placeholder inside a target parameter template.
fn reference_regex() -> Result<Regex, MapperError> {
    Regex::new(r"\{([^{}]*)\}").map_err(|e| MapperError::InvalidDocument(e.to_string()))
}

/// Capture names referenced by `template`, in order of appearance.
pub fn template_references(template: &str) -> Result<Vec<String>, MapperError> {
    Ok(reference_regex()?
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect())
}

/// Substitute captured keys into `template`.
pub fn resolve_template(template: &str, captures: &BTreeMap<String, String>) -> String {
    let mut resolved = template.to_string();
    for (name, key) in captures {
        resolved = resolved.replace(&format!("{{{name}}}"), key);
    }
    resolved
}

/// A leaf reached by a pattern, with the keys bound on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub captures: BTreeMap<String, String>,
    pub value: JsonValue,
}

/// Every leaf `segments` reaches in `doc`. Wildcard levels are walked in
/// sorted key order.
pub fn find_matches(segments: &[Segment], doc: &JsonValue) -> Vec<PatternMatch> {
    let mut found = Vec::new();
    walk(segments, doc, &mut BTreeMap::new(), &mut found);
    found
}

fn walk(
    segments: &[Segment],
    node: &JsonValue,
    captures: &mut BTreeMap<String, String>,
    found: &mut Vec<PatternMatch>,
) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(PatternMatch {
            captures: captures.clone(),
            value: node.clone(),
        });
        return;
    };
    let JsonValue::Object(map) = node else {
        return;
    };
    match head {
        Segment::Literal(key) => {
            if let Some(child) = map.get(key) {
                walk(rest, child, captures, found);
            }
        }
        Segment::Wildcard | Segment::Capture(_) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let previous = match head {
                    Segment::Capture(name) => captures.insert(name.clone(), key.clone()),
                    _ => None,
                };
                walk(rest, &map[key], captures, found);
                if let Segment::Capture(name) = head {
                    match previous {
                        Some(prev) => captures.insert(name.clone(), prev),
                        None => captures.remove(name),
                    };
                }
            }
        }
    }
}

/// The longest existing prefix of `segments` in `doc` (dotted, empty for the
/// root) and the first segment that could not be followed.
pub fn nearest_path(segments: &[Segment], doc: &JsonValue) -> (String, String) {
    let mut reached: Vec<String> = Vec::new();
    let mut node = doc;
    for segment in segments {
        let next = match (segment, node) {
            (Segment::Literal(key), JsonValue::Object(map)) => {
                map.get(key).map(|child| (key.clone(), child))
            }
            (_, JsonValue::Object(map)) if !matches!(segment, Segment::Literal(_)) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.first().map(|k| ((*k).clone(), &map[k.as_str()]))
            }
            _ => None,
        };
        match next {
            Some((key, child)) => {
                reached.push(key);
                node = child;
            }
            None => return (reached.join("."), segment.to_string()),
        }
    }
    (reached.join("."), String::new())
}
