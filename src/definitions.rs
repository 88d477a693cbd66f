//! Ordered collection of definitions belonging to one section.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::binding;
use crate::definition::Definition;
use crate::error::StrataError;
use crate::ordered::OrderedMap;
use crate::parsed::{SectionValues, StepOptions};
use crate::value::{Object, ParamValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    defs: OrderedMap<Definition>,
}

/// Result of resolving positional arguments: tokens actually supplied, and
/// defaults used for arguments that received none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentValues {
    pub provided: SectionValues,
    pub defaulted: SectionValues,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Insert or replace the definition named `def.name`.
    pub fn set(&mut self, def: Definition) {
        self.defs.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.defs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Definition> {
        self.defs.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Definition> {
        self.defs.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.defs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys()
    }

    pub fn retain(&mut self, keep: impl FnMut(&str, &Definition) -> bool) {
        self.defs.retain(keep);
    }

    /// Copy every definition of `other` in, replacing same-named ones.
    pub fn merge(&mut self, other: &Definitions) {
        for def in other.iter() {
            self.set(def.clone());
        }
    }

    /// Non-positional definitions, in order.
    pub fn flags(&self) -> impl Iterator<Item = &Definition> {
        self.iter().filter(|d| !d.is_argument)
    }

    /// Positional definitions, in order.
    pub fn arguments(&self) -> impl Iterator<Item = &Definition> {
        self.iter().filter(|d| d.is_argument)
    }

    /// Resolve each definition from `map` by name, or by its short flag.
    ///
    /// Present values are coerced and validated. With `only_provided` unset,
    /// absent parameters fall back to their default, and a required one
    /// without default is an error. `null` counts as absent.
    pub fn gather_from_map(
        &self,
        map: &Object,
        only_provided: bool,
        options: &StepOptions,
    ) -> Result<SectionValues, StrataError> {
        let mut values = SectionValues::new();
        for def in self.iter() {
            let short = def.short_flag.map(String::from);
            let found = map
                .get_key_value(&def.name)
                .or_else(|| short.as_ref().and_then(|s| map.get_key_value(s)))
                .filter(|(_, v)| !v.is_null());
            match found {
                Some((key, raw)) => {
                    let value = def.coerce(raw)?;
                    let step = StepOptions::new()
                        .with_metadata("map_key", key.as_str())
                        .over(options);
                    values.update_value(def, value, &step)?;
                }
                None if only_provided => {}
                None => {
                    if let Some(default) = &def.default {
                        let step = StepOptions::new().with_metadata("default", true).over(options);
                        values.update_value(def, default.clone(), &step)?;
                    } else if def.required {
                        return Err(StrataError::Required {
                            parameter: def.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(values)
    }

    /// Resolve positional `args` against the argument definitions in order.
    ///
    /// A list-kind argument consumes every remaining token. Missing arguments
    /// take their default; a missing required one is an error unless
    /// `ignore_required` is set. Leftover tokens are an error.
    pub fn parse_arguments(
        &self,
        args: &[String],
        ignore_required: bool,
        options: &StepOptions,
    ) -> Result<ArgumentValues, StrataError> {
        let mut result = ArgumentValues::default();
        let mut rest = args;
        for def in self.arguments() {
            let tokens: &[String] = if def.param_type.is_list() {
                std::mem::take(&mut rest)
            } else {
                match rest.split_first() {
                    Some((first, tail)) => {
                        rest = tail;
                        std::slice::from_ref(first)
                    }
                    None => &[],
                }
            };
            if !tokens.is_empty() {
                let value = def.parse_tokens(tokens)?;
                result.provided.update_value(def, value, options)?;
            } else if let Some(default) = &def.default {
                let step = StepOptions::source("defaults").with_metadata("default", true);
                result.defaulted.update_value(def, default.clone(), &step.over(options))?;
            } else if def.required && !ignore_required {
                return Err(StrataError::Required {
                    parameter: def.name.clone(),
                });
            }
        }
        if !rest.is_empty() {
            return Err(StrataError::TooManyArguments {
                extra: rest.to_vec(),
            });
        }
        Ok(result)
    }

    /// Decode the defaults into a host struct. Parameters without default
    /// are absent from the input, so `Option` fields come out `None`.
    pub fn initialize_struct_from_defaults<T: DeserializeOwned>(&self) -> Result<T, StrataError> {
        let defaults: Object = self
            .iter()
            .filter_map(|d| d.default.as_ref().map(|v| (d.name.clone(), v.to_json())))
            .collect();
        binding::bind(defaults)
    }

    /// Read `source` and store its fields as defaults of the same-named
    /// definitions. Fields without a matching definition are ignored.
    pub fn initialize_defaults_from_struct(
        &mut self,
        source: &impl Serialize,
    ) -> Result<(), StrataError> {
        for (name, raw) in binding::unbind(source)? {
            if let Some(def) = self.get_mut(&name) {
                def.set_default_from_json(&raw)?;
            }
        }
        Ok(())
    }

    /// Store `map` entries as defaults of the same-named definitions.
    pub fn set_defaults_from_map(&mut self, map: &Object) -> Result<(), StrataError> {
        for (name, raw) in map {
            if raw.is_null() {
                continue;
            }
            if let Some(def) = self.get_mut(name) {
                def.set_default_from_json(raw)?;
            }
        }
        Ok(())
    }

    /// Current defaults as `name → value`.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.iter()
            .filter_map(|d| d.default.as_ref().map(|v| (d.name.as_str(), v)))
    }

    /// Defaults rendered as JSON, for export.
    pub fn defaults_to_json(&self) -> Object {
        self.defaults()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect::<serde_json::Map<String, JsonValue>>()
    }
}

impl FromIterator<Definition> for Definitions {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        let mut defs = Definitions::new();
        for def in iter {
            defs.set(def);
        }
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParameterType;
    use chrono::{DateTime, FixedOffset};
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn obj(v: JsonValue) -> Object {
        match v {
            JsonValue::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn positional() -> Definitions {
        [
            Definition::new("a", ParameterType::Int)
                .with_required(true)
                .as_argument(),
            Definition::new("b", ParameterType::IntList)
                .with_default(vec![5i64, 6, 7])
                .as_argument(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn list_argument_consumes_the_tail() {
        let result = positional()
            .parse_arguments(&strings(&["1", "2", "3"]), false, &StepOptions::source("args"))
            .unwrap();
        assert_eq!(result.provided.get_value("a"), Some(&ParamValue::Integer(1)));
        assert_eq!(
            result.provided.get_value("b"),
            Some(&ParamValue::IntegerList(vec![2, 3]))
        );
        assert!(result.defaulted.is_empty());
    }

    #[test]
    fn missing_list_argument_uses_default() {
        let result = positional()
            .parse_arguments(&strings(&["1"]), false, &StepOptions::source("args"))
            .unwrap();
        assert_eq!(
            result.defaulted.get_value("b"),
            Some(&ParamValue::IntegerList(vec![5, 6, 7]))
        );
    }

    #[test]
    fn bad_integer_argument_is_parse_error() {
        let err = positional()
            .parse_arguments(&strings(&["1", "x"]), false, &StepOptions::source("args"))
            .unwrap_err();
        assert!(matches!(err, StrataError::Parse { .. }));
    }

    #[test]
    fn missing_required_argument_names_it() {
        let err = positional()
            .parse_arguments(&[], false, &StepOptions::source("args"))
            .unwrap_err();
        assert!(err.to_string().contains("'a'"), "{err}");

        let ok = positional().parse_arguments(&[], true, &StepOptions::source("args"));
        assert!(ok.is_ok());
    }

    #[test]
    fn leftover_tokens_are_rejected() {
        let defs: Definitions = [Definition::new("only", ParameterType::String).as_argument()]
            .into_iter()
            .collect();
        let err = defs
            .parse_arguments(&strings(&["a", "b"]), false, &StepOptions::source("args"))
            .unwrap_err();
        match err {
            StrataError::TooManyArguments { extra } => assert_eq!(extra, vec!["b".to_string()]),
            other => panic!("Expected TooManyArguments, got {other:?}"),
        }
    }

    #[test]
    fn flags_and_arguments_split() {
        let mut defs = positional();
        defs.set(Definition::new("verbose", ParameterType::Bool));
        assert_eq!(defs.flags().count(), 1);
        assert_eq!(defs.arguments().count(), 2);
    }

    #[test]
    fn gather_only_provided_skips_defaults() {
        let defs: Definitions = [
            Definition::new("x", ParameterType::String).with_default("d"),
            Definition::new("y", ParameterType::Int),
        ]
        .into_iter()
        .collect();
        let m = obj(json!({"y": 3, "ignored": true}));

        let only = defs.gather_from_map(&m, true, &StepOptions::source("map")).unwrap();
        assert!(only.get("x").is_none());
        assert_eq!(only.get_value("y"), Some(&ParamValue::Integer(3)));
        assert_eq!(only.get("y").unwrap().log()[0].metadata["map_key"], "y");

        let all = defs.gather_from_map(&m, false, &StepOptions::source("map")).unwrap();
        assert_eq!(all.get_value("x"), Some(&ParamValue::from("d")));
        assert_eq!(all.get("x").unwrap().log()[0].metadata["default"], true);
    }

    #[test]
    fn gather_resolves_short_flag_keys() {
        let defs: Definitions = [Definition::new("verbose", ParameterType::Bool).with_short('v')]
            .into_iter()
            .collect();
        let sv = defs
            .gather_from_map(&obj(json!({"v": true})), true, &StepOptions::source("map"))
            .unwrap();
        assert_eq!(sv.get_value("verbose"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn gather_required_without_value_fails() {
        let defs: Definitions =
            [Definition::new("token", ParameterType::Secret).with_required(true)]
                .into_iter()
                .collect();
        let err = defs
            .gather_from_map(&Object::new(), false, &StepOptions::source("map"))
            .unwrap_err();
        assert!(matches!(err, StrataError::Required { .. }));
    }

    #[test]
    fn gather_invalid_value_is_validation_error() {
        let defs: Definitions = [Definition::new("mode", ParameterType::Choice).with_choices(["a"])]
            .into_iter()
            .collect();
        let err = defs
            .gather_from_map(&obj(json!({"mode": "b"})), true, &StepOptions::source("map"))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation { .. }));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        host: String,
        port: i64,
        ids: Vec<i64>,
        labels: BTreeMap<String, String>,
        since: DateTime<FixedOffset>,
        #[serde(rename = "limit_*")]
        limits: BTreeMap<String, f64>,
    }

    fn settings_defs() -> Definitions {
        [
            Definition::new("host", ParameterType::String),
            Definition::new("port", ParameterType::Int),
            Definition::new("ids", ParameterType::IntList),
            Definition::new("labels", ParameterType::KeyValue),
            Definition::new("since", ParameterType::Date),
            Definition::new("limit_cpu", ParameterType::Float),
            Definition::new("limit_mem", ParameterType::Float),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn struct_defaults_round_trip() {
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "core".to_string());
        let mut limits = BTreeMap::new();
        limits.insert("limit_cpu".to_string(), 1.5);
        limits.insert("limit_mem".to_string(), 256.0);
        let original = Settings {
            host: "example.org".into(),
            port: 443,
            ids: vec![1, 2],
            labels,
            since: DateTime::parse_from_rfc3339("2022-06-01T10:00:00+02:00").unwrap(),
            limits,
        };

        let mut defs = settings_defs();
        defs.initialize_defaults_from_struct(&original).unwrap();
        assert_eq!(
            defs.get("limit_mem").unwrap().default,
            Some(ParamValue::Float(256.0))
        );
        let back: Settings = defs.initialize_struct_from_defaults().unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn defaults_from_map_coerces() {
        let mut defs = settings_defs();
        defs.set_defaults_from_map(&obj(json!({"port": 80, "host": null, "nope": 1})))
            .unwrap();
        assert_eq!(defs.get("port").unwrap().default, Some(ParamValue::Integer(80)));
        assert_eq!(defs.get("host").unwrap().default, None);
        assert!(defs.set_defaults_from_map(&obj(json!({"port": "x"}))).is_err());
    }
}
