//! Mapping rule definitions and their on-disk form.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{MapperError, StrataError};
use crate::reader;

/// One mapping rule. Leaves carry a target; groups carry nested rules that
/// inherit this rule's pattern and captures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<MappingRule>,
}

impl MappingRule {
    /// A leaf rule copying `source` into `layer.parameter`.
    pub fn new(source: &str, layer: &str, parameter: &str) -> Self {
        Self {
            source: source.to_string(),
            target_layer: Some(layer.to_string()),
            target_parameter: Some(parameter.to_string()),
            ..Self::default()
        }
    }

    /// A group whose children match below `source`.
    pub fn group(source: &str, rules: impl IntoIterator<Item = MappingRule>) -> Self {
        Self {
            source: source.to_string(),
            rules: rules.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Wrapped { mappings: Vec<MappingRule> },
    Bare(Vec<MappingRule>),
}

/// Decode rules from a document: `{mappings: [...]}` or a bare list.
pub fn rules_from_value(doc: JsonValue) -> Result<Vec<MappingRule>, MapperError> {
    match serde_json::from_value(doc) {
        Ok(MappingDocument::Wrapped { mappings }) => Ok(mappings),
        Ok(MappingDocument::Bare(rules)) => Ok(rules),
        Err(e) => Err(MapperError::InvalidDocument(format!(
            "expected a list of rules or a 'mappings' key: {e}"
        ))),
    }
}

/// Load rules from a YAML, JSON, or TOML file.
pub fn load_rules(path: &Path) -> Result<Vec<MappingRule>, StrataError> {
    let doc = reader::load_document(path)?;
    Ok(rules_from_value(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn wrapped_and_bare_forms() {
        let rule = json!({"source": "a.b", "target_layer": "demo", "target_parameter": "x"});
        let wrapped = rules_from_value(json!({"mappings": [rule.clone()]})).unwrap();
        let bare = rules_from_value(json!([rule])).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped[0], MappingRule::new("a.b", "demo", "x"));
    }

    #[test]
    fn nested_rules_and_required_flag() {
        let rules = rules_from_value(json!([{
            "source": "app.{env}",
            "rules": [{"source": "key", "target_layer": "demo", "target_parameter": "{env}-key", "required": true}]
        }]))
        .unwrap();
        assert!(!rules[0].is_leaf());
        assert!(rules[0].rules[0].required);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(rules_from_value(json!({"rules": 1})).is_err());
        assert!(rules_from_value(json!("nope")).is_err());
    }

    #[test]
    fn loads_yaml_rules_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.yaml");
        fs::write(
            &path,
            "mappings:\n  - source: app.token\n    target_layer: demo\n    target_parameter: x\n",
        )
        .unwrap();
        let rules = load_rules(&path).unwrap();
        assert_eq!(rules, vec![MappingRule::new("app.token", "demo", "x")]);
    }
}
