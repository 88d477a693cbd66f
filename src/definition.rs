//! A single parameter's contract.
//!
//! A [`Definition`] names a parameter, fixes its [`ParameterType`], and
//! carries help text, an optional default, a choice set, and whether it is
//! required or positional. It owns the three conversions every source relies
//! on:
//!
//! - [`parse_tokens`](Definition::parse_tokens): CLI/env string tokens → value
//! - [`coerce`](Definition::coerce): untyped config data → value
//! - [`render`](Definition::render): value → string, the inverse of parsing
//!
//! plus [`check_value_validity`](Definition::check_value_validity), the
//! invariant every stored value satisfies.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::date::DateParser;
use crate::error::StrataError;
use crate::parsed::{ParsedParameter, StepOptions};
use crate::reader::{self, json_kind, json_to_plain_string};
use crate::types::ParameterType;
use crate::value::{Object, ParamValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DefinitionSpec", into = "DefinitionSpec")]
pub struct Definition {
    pub name: String,
    pub param_type: ParameterType,
    pub help: String,
    pub short_flag: Option<char>,
    pub default: Option<ParamValue>,
    pub choices: Vec<String>,
    pub required: bool,
    pub is_argument: bool,
    /// Anchor for relative date phrases; the current local time when unset.
    pub reference_time: Option<DateTime<FixedOffset>>,
}

impl Definition {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            help: String::new(),
            short_flag: None,
            default: None,
            choices: Vec::new(),
            required: false,
            is_argument: false,
            reference_time: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short_flag = Some(short);
        self
    }

    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn as_argument(mut self) -> Self {
        self.is_argument = true;
        self
    }

    /// Resolve relative dates (`10 days ago`, `last monday`) against
    /// `reference` instead of the current time.
    pub fn with_reference_time(mut self, reference: DateTime<FixedOffset>) -> Self {
        self.reference_time = Some(reference);
        self
    }

    /// External flag name: `prefix + name` with `_` replaced by `-`.
    pub fn flag_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.name).replace('_', "-")
    }

    /// Check the definition itself: choice kinds need choices, and a default
    /// must be a valid value.
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.name.trim().is_empty() {
            return Err(StrataError::Schema("parameter name cannot be empty".into()));
        }
        if self.param_type.is_choice() && self.choices.is_empty() {
            return Err(StrataError::Schema(format!(
                "parameter '{}' of type {} needs at least one choice",
                self.name, self.param_type
            )));
        }
        if let Some(default) = &self.default {
            self.check_value_validity(default)?;
        }
        Ok(())
    }

    /// Check that `value` has the shape required by this parameter's kind and
    /// lies within its choices. Integers are accepted where floats are
    /// expected; file-loading kinds also accept the not-yet-loaded filename.
    pub fn check_value_validity(&self, value: &ParamValue) -> Result<(), StrataError> {
        use ParameterType as T;
        let ok = match (self.param_type, value) {
            (T::String | T::Secret, ParamValue::String(_)) => true,
            (T::Int, ParamValue::Integer(_)) => true,
            (T::Float, ParamValue::Float(f)) => f.is_finite(),
            (T::Float, ParamValue::Integer(_)) => true,
            (T::Bool, ParamValue::Bool(_)) => true,
            (T::Date, ParamValue::Date(_)) => true,
            (T::Date, ParamValue::String(s)) => {
                self.parse_date(s)?;
                true
            }
            (T::Choice, ParamValue::String(s)) => {
                self.check_choice(s)?;
                true
            }
            (T::ChoiceList, ParamValue::StringList(items)) => {
                for item in items {
                    self.check_choice(item)?;
                }
                true
            }
            (T::StringList, ParamValue::StringList(_)) => true,
            (T::IntList, ParamValue::IntegerList(_)) => true,
            (T::FloatList, ParamValue::FloatList(v)) => v.iter().all(|f| f.is_finite()),
            (T::FloatList, ParamValue::IntegerList(_)) => true,
            (T::KeyValue, ParamValue::KeyValue(_)) => true,
            (T::StringFromFile | T::StringFromFiles, ParamValue::String(_)) => true,
            (T::StringListFromFile | T::StringListFromFiles, ParamValue::StringList(_)) => true,
            (T::ObjectFromFile, ParamValue::Object(_)) => true,
            (T::ObjectListFromFile | T::ObjectListFromFiles, ParamValue::ObjectList(_)) => true,
            (T::File, ParamValue::File(_)) => true,
            (T::FileList, ParamValue::FileList(_)) => true,
            // not yet loaded: a filename (or list of filenames)
            (t, ParamValue::String(_)) if t.always_loads_file() => true,
            (
                T::FileList | T::StringFromFiles | T::ObjectListFromFiles,
                ParamValue::StringList(_),
            ) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(StrataError::validation(
                &self.name,
                format!(
                    "expected a value of type {}, got {}",
                    self.param_type,
                    value.shape()
                ),
            ))
        }
    }

    fn check_choice(&self, value: &str) -> Result<(), StrataError> {
        if self.choices.iter().any(|c| c == value) {
            Ok(())
        } else {
            Err(StrataError::validation(
                &self.name,
                format!(
                    "'{value}' is not a valid choice (expected one of: {})",
                    self.choices.join(", ")
                ),
            ))
        }
    }

    /// Validate `value` and bring it into canonical shape: integers widen to
    /// floats, date strings are parsed, and filenames for file-loading kinds
    /// are loaded.
    pub fn normalize(&self, value: ParamValue) -> Result<ParamValue, StrataError> {
        use ParameterType as T;
        self.check_value_validity(&value)?;
        let normalized = match (self.param_type, value) {
            (T::Float, ParamValue::Integer(i)) => ParamValue::Float(i as f64),
            (T::FloatList, ParamValue::IntegerList(v)) => {
                ParamValue::FloatList(v.into_iter().map(|i| i as f64).collect())
            }
            (T::Date, ParamValue::String(s)) => ParamValue::Date(self.parse_date(&s)?),
            // the loaded shape of the string kinds is a string too
            (T::StringFromFile | T::StringFromFiles, v @ ParamValue::String(_)) => v,
            (t, ParamValue::String(path)) if t.always_loads_file() => {
                self.parse_tokens(&[path])?
            }
            (
                T::FileList | T::StringFromFiles | T::ObjectListFromFiles,
                ParamValue::StringList(paths),
            ) => self.load_files(&paths)?,
            (_, v) => v,
        };
        Ok(normalized)
    }

    /// Coerce an untyped value from a config map or document.
    pub fn coerce(&self, raw: &JsonValue) -> Result<ParamValue, StrataError> {
        use ParameterType as T;
        let value = match self.param_type {
            T::String | T::Secret => ParamValue::String(self.json_string(raw)?),
            T::Int => ParamValue::Integer(self.json_integer(raw)?),
            T::Float => ParamValue::Float(self.json_float(raw)?),
            T::Bool => match raw {
                JsonValue::Bool(b) => ParamValue::Bool(*b),
                other => return Err(self.shape_error(other)),
            },
            T::Date => ParamValue::Date(self.parse_date(&self.json_string(raw)?)?),
            T::Choice => {
                let s = self.json_string(raw)?;
                self.check_choice(&s)?;
                ParamValue::String(s)
            }
            T::StringList | T::ChoiceList => {
                let items = self
                    .json_array(raw)?
                    .iter()
                    .map(|item| match item {
                        JsonValue::Array(_) | JsonValue::Object(_) | JsonValue::Null => {
                            Err(self.shape_error(item))
                        }
                        scalar => Ok(json_to_plain_string(scalar)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if self.param_type == T::ChoiceList {
                    for item in &items {
                        self.check_choice(item)?;
                    }
                }
                ParamValue::StringList(items)
            }
            T::IntList => ParamValue::IntegerList(
                self.json_array(raw)?
                    .iter()
                    .map(|item| self.json_integer(item))
                    .collect::<Result<_, _>>()?,
            ),
            T::FloatList => ParamValue::FloatList(
                self.json_array(raw)?
                    .iter()
                    .map(|item| self.json_float(item))
                    .collect::<Result<_, _>>()?,
            ),
            T::KeyValue => match raw {
                JsonValue::Object(map) => ParamValue::KeyValue(
                    map.iter()
                        .map(|(k, v)| (k.clone(), json_to_plain_string(v)))
                        .collect(),
                ),
                JsonValue::String(s) if s.starts_with('@') => {
                    self.parse_tokens(std::slice::from_ref(s))?
                }
                other => return Err(self.shape_error(other)),
            },
            T::StringFromFile | T::ObjectFromFile | T::File => match (self.param_type, raw) {
                (_, JsonValue::String(path)) => self.parse_tokens(std::slice::from_ref(path))?,
                (T::ObjectFromFile, JsonValue::Object(o)) => ParamValue::Object(o.clone()),
                (_, other) => return Err(self.shape_error(other)),
            },
            T::StringFromFiles | T::FileList => match raw {
                JsonValue::String(path) => self.parse_tokens(std::slice::from_ref(path))?,
                JsonValue::Array(_) => self.load_files(&self.string_items(raw)?)?,
                other => return Err(self.shape_error(other)),
            },
            T::StringListFromFile | T::StringListFromFiles => match raw {
                JsonValue::String(path) => self.parse_tokens(std::slice::from_ref(path))?,
                JsonValue::Array(items) if self.param_type == T::StringListFromFiles
                    && items.iter().all(JsonValue::is_string) =>
                {
                    // a list of paths for the multi-file kind
                    self.load_files(&self.string_items(raw)?)?
                }
                JsonValue::Array(items) => ParamValue::StringList(
                    items.iter().map(json_to_plain_string).collect(),
                ),
                other => return Err(self.shape_error(other)),
            },
            T::ObjectListFromFile | T::ObjectListFromFiles => match raw {
                JsonValue::String(path) => self.parse_tokens(std::slice::from_ref(path))?,
                JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
                    self.load_files(&self.string_items(raw)?)?
                }
                JsonValue::Array(items) => ParamValue::ObjectList(
                    items
                        .iter()
                        .map(|item| match item {
                            JsonValue::Object(o) => Ok(o.clone()),
                            other => Err(self.shape_error(other)),
                        })
                        .collect::<Result<Vec<Object>, _>>()?,
                ),
                other => return Err(self.shape_error(other)),
            },
        };
        self.check_value_validity(&value)?;
        Ok(value)
    }

    fn shape_error(&self, raw: &JsonValue) -> StrataError {
        StrataError::validation(
            &self.name,
            format!(
                "expected a value of type {}, got {}",
                self.param_type,
                json_kind(raw)
            ),
        )
    }

    fn json_string(&self, raw: &JsonValue) -> Result<String, StrataError> {
        match raw {
            JsonValue::String(s) => Ok(s.clone()),
            other => Err(self.shape_error(other)),
        }
    }

    fn json_integer(&self, raw: &JsonValue) -> Result<i64, StrataError> {
        let JsonValue::Number(n) = raw else {
            return Err(self.shape_error(raw));
        };
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(StrataError::validation(
                &self.name,
                format!("{n} is not a valid integer"),
            )),
        }
    }

    fn json_float(&self, raw: &JsonValue) -> Result<f64, StrataError> {
        match raw {
            JsonValue::Number(n) => n.as_f64().ok_or_else(|| self.shape_error(raw)),
            other => Err(self.shape_error(other)),
        }
    }

    fn json_array<'a>(&self, raw: &'a JsonValue) -> Result<&'a Vec<JsonValue>, StrataError> {
        match raw {
            JsonValue::Array(items) => Ok(items),
            other => Err(self.shape_error(other)),
        }
    }

    fn string_items(&self, raw: &JsonValue) -> Result<Vec<String>, StrataError> {
        self.json_array(raw)?
            .iter()
            .map(|item| self.json_string(item))
            .collect()
    }

    /// Parse CLI/env string tokens.
    ///
    /// Scalars take exactly one token. List kinds take every token, and a
    /// single token is split on commas. `keyValue` tokens are `key:value`
    /// (first colon wins) unless the only token is `@path`. File-loading
    /// kinds treat tokens as paths (`-` is stdin); an empty path yields the
    /// default.
    pub fn parse_tokens(&self, tokens: &[String]) -> Result<ParamValue, StrataError> {
        use ParameterType as T;
        let value = match self.param_type {
            T::String | T::Secret => ParamValue::String(self.single_token(tokens)?.to_string()),
            T::Int => ParamValue::Integer(self.parse_int(self.single_token(tokens)?)?),
            T::Float => ParamValue::Float(self.parse_float(self.single_token(tokens)?)?),
            T::Bool => ParamValue::Bool(self.parse_bool(self.single_token(tokens)?)?),
            T::Date => ParamValue::Date(self.parse_date(self.single_token(tokens)?)?),
            T::Choice => {
                let token = self.single_token(tokens)?;
                self.check_choice(token)?;
                ParamValue::String(token.to_string())
            }
            T::StringList => ParamValue::StringList(split_list(tokens)),
            T::ChoiceList => {
                let items = split_list(tokens);
                for item in &items {
                    self.check_choice(item)?;
                }
                ParamValue::StringList(items)
            }
            T::IntList => ParamValue::IntegerList(
                split_list(tokens)
                    .iter()
                    .map(|t| self.parse_int(t))
                    .collect::<Result<_, _>>()?,
            ),
            T::FloatList => ParamValue::FloatList(
                split_list(tokens)
                    .iter()
                    .map(|t| self.parse_float(t))
                    .collect::<Result<_, _>>()?,
            ),
            T::KeyValue => {
                if let [only] = tokens
                    && only.starts_with('@')
                {
                    return reader::parse_from_path(T::KeyValue, &only[1..]);
                }
                let mut map = BTreeMap::new();
                for token in split_list(tokens) {
                    let (k, v) = token.split_once(':').ok_or_else(|| {
                        StrataError::parse(
                            &self.name,
                            format!("expected key:value, got '{token}'"),
                        )
                    })?;
                    map.insert(k.to_string(), v.to_string());
                }
                ParamValue::KeyValue(map)
            }
            T::StringFromFile | T::ObjectFromFile | T::File => {
                let path = self.single_token(tokens)?;
                if path.is_empty() {
                    return Ok(self.default_or_empty());
                }
                reader::parse_from_path(self.param_type, path)?
            }
            T::StringFromFiles
            | T::StringListFromFile
            | T::StringListFromFiles
            | T::ObjectListFromFile
            | T::ObjectListFromFiles
            | T::FileList => {
                let paths: Vec<String> = tokens.iter().filter(|t| !t.is_empty()).cloned().collect();
                if paths.is_empty() {
                    return Ok(self.default_or_empty());
                }
                self.load_files(&paths)?
            }
        };
        Ok(value)
    }

    /// Parse tokens into a fresh [`ParsedParameter`] whose log holds one step
    /// built from `options`.
    pub fn parse_from_strings(
        &self,
        tokens: &[String],
        options: &StepOptions,
    ) -> Result<ParsedParameter, StrataError> {
        let value = self.parse_tokens(tokens)?;
        ParsedParameter::new(self.clone(), value, options)
    }

    /// Decode a document read from `reader`; `name` drives format detection.
    pub fn parse_from_reader(
        &self,
        reader: impl std::io::Read,
        name: &str,
    ) -> Result<ParamValue, StrataError> {
        reader::parse_from_reader(self.param_type, reader, name)
    }

    /// Load and aggregate several files for the multi-file kinds.
    fn load_files(&self, paths: &[String]) -> Result<ParamValue, StrataError> {
        use ParameterType as T;
        let single = match self.param_type {
            T::StringFromFiles => T::StringFromFile,
            T::StringListFromFile | T::StringListFromFiles => T::StringListFromFile,
            T::ObjectListFromFile | T::ObjectListFromFiles => T::ObjectListFromFile,
            T::FileList => T::File,
            other => other,
        };
        let mut text = String::new();
        let mut strings = Vec::new();
        let mut objects = Vec::new();
        let mut files = Vec::new();
        for path in paths {
            match reader::parse_from_path(single, path)? {
                ParamValue::String(s) => text.push_str(&s),
                ParamValue::StringList(v) => strings.extend(v),
                ParamValue::ObjectList(v) => objects.extend(v),
                ParamValue::File(f) => files.push(f),
                other => return Ok(other),
            }
        }
        Ok(match self.param_type {
            T::StringFromFiles => ParamValue::String(text),
            T::StringListFromFile | T::StringListFromFiles => ParamValue::StringList(strings),
            T::ObjectListFromFile | T::ObjectListFromFiles => ParamValue::ObjectList(objects),
            _ => ParamValue::FileList(files),
        })
    }

    fn default_or_empty(&self) -> ParamValue {
        use ParameterType as T;
        if let Some(default) = &self.default {
            return default.clone();
        }
        match self.param_type {
            T::StringListFromFile | T::StringListFromFiles => ParamValue::StringList(vec![]),
            T::ObjectFromFile => ParamValue::Object(Object::new()),
            T::ObjectListFromFile | T::ObjectListFromFiles => ParamValue::ObjectList(vec![]),
            T::FileList => ParamValue::FileList(vec![]),
            _ => ParamValue::String(String::new()),
        }
    }

    fn single_token<'a>(&self, tokens: &'a [String]) -> Result<&'a str, StrataError> {
        match tokens {
            [one] => Ok(one),
            [] => Err(StrataError::parse(&self.name, "no value provided")),
            many => Err(StrataError::parse(
                &self.name,
                format!("expected a single value, got {}", many.len()),
            )),
        }
    }

    fn parse_int(&self, token: &str) -> Result<i64, StrataError> {
        token
            .trim()
            .parse()
            .map_err(|_| StrataError::parse(&self.name, format!("'{token}' is not an integer")))
    }

    fn parse_float(&self, token: &str) -> Result<f64, StrataError> {
        let value: f64 = token
            .trim()
            .parse()
            .map_err(|_| StrataError::parse(&self.name, format!("'{token}' is not a number")))?;
        if !value.is_finite() {
            return Err(StrataError::parse(
                &self.name,
                format!("'{token}' is not a finite number"),
            ));
        }
        Ok(value)
    }

    fn parse_date(&self, input: &str) -> Result<DateTime<FixedOffset>, StrataError> {
        let parser = self.reference_time.map_or_else(DateParser::now, DateParser::new);
        parser.parse(input).map_err(|_| {
            StrataError::validation(&self.name, format!("'{input}' is not a recognizable date"))
        })
    }

    fn parse_bool(&self, token: &str) -> Result<bool, StrataError> {
        match token.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" | "yes" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" | "no" => Ok(false),
            other => Err(StrataError::parse(
                &self.name,
                format!("'{other}' is not a boolean"),
            )),
        }
    }

    /// Render a value of this parameter for display or export.
    pub fn render(&self, value: &ParamValue) -> String {
        render_value(value)
    }

    /// Deserialize the default into a host type. `Ok(None)` without default.
    pub fn default_as<T: DeserializeOwned>(&self) -> Result<Option<T>, StrataError> {
        self.default.as_ref().map(ParamValue::decode).transpose()
    }

    /// Replace the default with a coerced untyped value.
    pub fn set_default_from_json(&mut self, raw: &JsonValue) -> Result<(), StrataError> {
        let value = self.coerce(raw)?;
        self.default = Some(value);
        Ok(())
    }
}

/// Split list tokens: a single token is comma-separated, several tokens are
/// taken as-is. An empty single token is an empty list.
fn split_list(tokens: &[String]) -> Vec<String> {
    match tokens {
        [one] if one.is_empty() => vec![],
        [one] => one.split(',').map(|s| s.trim().to_string()).collect(),
        many => many.to_vec(),
    }
}

/// Render `value` as a string: lists comma-joined, key/value maps as
/// `k:v,...`, objects as compact JSON, files by path.
pub fn render_value(value: &ParamValue) -> String {
    match value {
        ParamValue::String(s) => s.clone(),
        ParamValue::Integer(i) => i.to_string(),
        ParamValue::Float(f) => f.to_string(),
        ParamValue::Bool(b) => b.to_string(),
        ParamValue::Date(d) => d.to_rfc3339(),
        ParamValue::StringList(v) => v.join(","),
        ParamValue::IntegerList(v) => join(v),
        ParamValue::FloatList(v) => join(v),
        ParamValue::KeyValue(m) => m
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(","),
        ParamValue::Object(o) => JsonValue::Object(o.clone()).to_string(),
        ParamValue::ObjectList(v) => {
            JsonValue::Array(v.iter().cloned().map(JsonValue::Object).collect()).to_string()
        }
        ParamValue::File(f) => f.path.display().to_string(),
        ParamValue::FileList(v) => v
            .iter()
            .map(|f| f.path.display().to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// On-disk form of a definition in layer files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DefinitionSpec {
    name: String,
    #[serde(rename = "type")]
    param_type: ParameterType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    help: String,
    #[serde(default, alias = "shortFlag", skip_serializing_if = "Option::is_none")]
    short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    required: bool,
    #[serde(default, alias = "isArgument", skip_serializing_if = "std::ops::Not::not")]
    is_argument: bool,
}

impl TryFrom<DefinitionSpec> for Definition {
    type Error = StrataError;

    fn try_from(spec: DefinitionSpec) -> Result<Self, Self::Error> {
        let short_flag = match spec.short.as_deref() {
            None | Some("") => None,
            Some(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => {
                        return Err(StrataError::Schema(format!(
                            "short flag '{s}' of '{}' must be a single character",
                            spec.name
                        )));
                    }
                }
            }
        };
        let mut def = Definition {
            name: spec.name,
            param_type: spec.param_type,
            help: spec.help,
            short_flag,
            default: None,
            choices: spec.choices,
            required: spec.required,
            is_argument: spec.is_argument,
            reference_time: None,
        };
        if let Some(raw) = spec.default.filter(|d| !d.is_null()) {
            def.set_default_from_json(&raw)?;
        }
        def.validate()?;
        Ok(def)
    }
}

impl From<Definition> for DefinitionSpec {
    fn from(def: Definition) -> Self {
        DefinitionSpec {
            default: def.default.as_ref().map(ParamValue::to_json),
            name: def.name,
            param_type: def.param_type,
            help: def.help,
            short: def.short_flag.map(String::from),
            choices: def.choices,
            required: def.required,
            is_argument: def.is_argument,
        }
    }
}
