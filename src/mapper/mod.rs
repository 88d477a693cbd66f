//! Declarative reshaping of arbitrary config documents into section maps.
//!
//! A [`PatternMapper`] is compiled once against a schema from a list of
//! [`MappingRule`]s. Compilation validates patterns, targets and capture
//! references; evaluation walks the document and fails loudly on ambiguous
//! or conflicting matches instead of picking a winner.

mod pattern;
mod rules;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

pub use pattern::{PatternMatch, Segment, find_matches, parse_pattern};
pub use rules::{MappingRule, load_rules, rules_from_value};

use crate::error::{MapperError, StrataError};
use crate::schema::Schema;
use crate::section::Section;
use crate::value::Object;

/// Turns a decoded config document into `slug → name → value`.
pub trait ConfigMapper {
    fn map(&self, doc: &JsonValue) -> Result<Object, StrataError>;
}

impl<F> ConfigMapper for F
where
    F: Fn(&JsonValue) -> Result<Object, StrataError>,
{
    fn map(&self, doc: &JsonValue) -> Result<Object, StrataError> {
        self(doc)
    }
}

/// A leaf rule after flattening: full pattern, resolved target.
#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: String,
    segments: Vec<Segment>,
    layer: String,
    /// Target as written, for error messages.
    written: String,
    /// Target with the section prefix applied; may hold `{capture}`s.
    parameter: String,
    required: bool,
}

#[derive(Debug, Clone)]
pub struct PatternMapper {
    rules: Vec<CompiledRule>,
    /// Per target section: external name (`prefix + name`) to parameter
    /// name.
    known: BTreeMap<String, BTreeMap<String, String>>,
}

struct Scope<'a> {
    segments: Vec<Segment>,
    captures: BTreeSet<String>,
    required: bool,
    schema: &'a Schema,
}

impl PatternMapper {
    pub fn new(schema: &Schema, rules: &[MappingRule]) -> Result<Self, MapperError> {
        let mut mapper = PatternMapper {
            rules: Vec::new(),
            known: BTreeMap::new(),
        };
        let root = Scope {
            segments: Vec::new(),
            captures: BTreeSet::new(),
            required: false,
            schema,
        };
        for rule in rules {
            mapper.compile(rule, &root)?;
        }
        debug!(event = "strata.mapper.compiled", rules = mapper.rules.len());
        Ok(mapper)
    }

    /// Compile the rules stored in a mapping file.
    pub fn from_file(schema: &Schema, path: &Path) -> Result<Self, StrataError> {
        let rules = load_rules(path)?;
        Ok(Self::new(schema, &rules)?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn compile(&mut self, rule: &MappingRule, parent: &Scope<'_>) -> Result<(), MapperError> {
        let own = parse_pattern(&rule.source)?;
        let mut segments = parent.segments.clone();
        segments.extend(own.iter().cloned());
        let pattern = pattern::join(&segments);

        let mut captures = parent.captures.clone();
        for segment in &own {
            if let Segment::Capture(name) = segment
                && !captures.insert(name.clone())
            {
                warn!(
                    event = "strata.mapper.capture_shadowed",
                    pattern = %pattern,
                    capture = %name
                );
            }
        }

        let required = parent.required || rule.required;
        if !rule.is_leaf() {
            let scope = Scope {
                segments,
                captures,
                required,
                schema: parent.schema,
            };
            for child in &rule.rules {
                self.compile(child, &scope)?;
            }
            return Ok(());
        }

        let layer = rule
            .target_layer
            .clone()
            .ok_or_else(|| MapperError::MissingTargetLayer {
                pattern: pattern.clone(),
            })?;
        let written = rule
            .target_parameter
            .clone()
            .ok_or_else(|| MapperError::MissingTargetParameter {
                pattern: pattern.clone(),
            })?;
        let section = parent
            .schema
            .get(&layer)
            .ok_or_else(|| MapperError::UnknownLayer {
                pattern: pattern.clone(),
                layer: layer.clone(),
            })?;

        let prefix = section.prefix();
        let parameter = if !prefix.is_empty() && !written.starts_with(prefix) {
            format!("{prefix}{written}")
        } else {
            written.clone()
        };

        let references = pattern::template_references(&parameter)?;
        for reference in &references {
            if !captures.contains(reference) {
                return Err(MapperError::UnknownCapture {
                    pattern,
                    capture: reference.clone(),
                    target: written,
                });
            }
        }
        let names = self
            .known
            .entry(layer.clone())
            .or_insert_with(|| external_names(section));
        if references.is_empty() && !names.contains_key(&parameter) {
            return Err(MapperError::UnknownParameter {
                pattern,
                layer,
                parameter: written,
                resolved: parameter,
            });
        }

        self.rules.push(CompiledRule {
            pattern,
            segments,
            layer,
            written,
            parameter,
            required,
        });
        Ok(())
    }

    /// Evaluate every rule against `doc`.
    pub fn map_document(&self, doc: &JsonValue) -> Result<Object, MapperError> {
        // (layer, parameter) -> (value, pattern that produced it)
        let mut produced: BTreeMap<(String, String), (JsonValue, String)> = BTreeMap::new();
        for rule in &self.rules {
            let found = find_matches(&rule.segments, doc);
            if found.is_empty() {
                if rule.required {
                    let (nearest, missing) = pattern::nearest_path(&rule.segments, doc);
                    return Err(MapperError::RequiredMissing {
                        pattern: rule.pattern.clone(),
                        nearest,
                        missing,
                    });
                }
                continue;
            }

            let mut per_rule: BTreeMap<String, JsonValue> = BTreeMap::new();
            for PatternMatch { captures, value } in found {
                let resolved = pattern::resolve_template(&rule.parameter, &captures);
                let Some(name) = self.internal_name(&rule.layer, &resolved) else {
                    return Err(MapperError::UnknownParameter {
                        pattern: rule.pattern.clone(),
                        layer: rule.layer.clone(),
                        parameter: rule.written.clone(),
                        resolved,
                    });
                };
                match per_rule.get(&name) {
                    Some(existing) if *existing != value => {
                        return Err(MapperError::MultipleDistinctValues {
                            pattern: rule.pattern.clone(),
                            layer: rule.layer.clone(),
                            parameter: name,
                        });
                    }
                    Some(_) => {}
                    None => {
                        per_rule.insert(name, value);
                    }
                }
            }

            for (name, value) in per_rule {
                let key = (rule.layer.clone(), name);
                match produced.get(&key) {
                    Some((existing, first)) if *existing != value => {
                        return Err(MapperError::Collision {
                            layer: key.0,
                            parameter: key.1,
                            first: first.clone(),
                            second: rule.pattern.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        produced.insert(key, (value, rule.pattern.clone()));
                    }
                }
            }
        }

        let mut out = Object::new();
        for ((layer, name), (value, _)) in produced {
            let section = out
                .entry(layer)
                .or_insert_with(|| JsonValue::Object(Object::new()));
            if let JsonValue::Object(params) = section {
                params.insert(name, value);
            }
        }
        Ok(out)
    }

    fn internal_name(&self, layer: &str, external: &str) -> Option<String> {
        self.known.get(layer)?.get(external).cloned()
    }
}

/// Names a rule may target in `section`: `prefix + name` for every
/// definition, plus the bare name when it already carries the prefix.
fn external_names(section: &Section) -> BTreeMap<String, String> {
    let prefix = section.prefix();
    let mut names = BTreeMap::new();
    for name in section.definitions().names() {
        names.insert(format!("{prefix}{name}"), name.to_string());
        if name.starts_with(prefix) {
            names.entry(name.to_string()).or_insert_with(|| name.to_string());
        }
    }
    names
}

impl ConfigMapper for PatternMapper {
    fn map(&self, doc: &JsonValue) -> Result<Object, StrataError> {
        Ok(self.map_document(doc)?)
    }
}
