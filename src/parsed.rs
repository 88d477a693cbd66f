//! Parsed values with provenance.
//!
//! Every write to a parameter appends a [`ParseStep`] recording which source
//! produced the value and with what metadata, so the final
//! [`ParsedParameter`] can answer "where did this value come from".
//! [`SectionValues`] groups parsed parameters by name and [`Values`] groups
//! those by section slug; both keep insertion order.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::binding;
use crate::definition::Definition;
use crate::error::StrataError;
use crate::ordered::OrderedMap;
use crate::value::{Object, ParamValue};

/// One entry in a parameter's provenance log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseStep {
    pub source: String,
    pub value: ParamValue,
    pub metadata: BTreeMap<String, JsonValue>,
}

/// Source tag and metadata attached to the steps a source records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOptions {
    pub source: Option<String>,
    pub metadata: BTreeMap<String, JsonValue>,
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Layer these options over `base`: our source wins when set, metadata
    /// keys are unioned with ours taking precedence.
    pub fn over(&self, base: &StepOptions) -> StepOptions {
        let mut metadata = base.metadata.clone();
        metadata.extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        StepOptions {
            source: self.source.clone().or_else(|| base.source.clone()),
            metadata,
        }
    }

    fn step(&self, value: ParamValue) -> ParseStep {
        ParseStep {
            source: self.source.clone().unwrap_or_else(|| "none".to_string()),
            value,
            metadata: self.metadata.clone(),
        }
    }
}

/// The current value of one parameter plus the log of how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParameter {
    pub definition: Definition,
    value: ParamValue,
    log: Vec<ParseStep>,
}

impl ParsedParameter {
    /// Validate `value` against `definition` and record it as the first step.
    pub fn new(
        definition: Definition,
        value: ParamValue,
        options: &StepOptions,
    ) -> Result<Self, StrataError> {
        let value = definition.normalize(value)?;
        let log = vec![options.step(value.clone())];
        Ok(Self {
            definition,
            value,
            log,
        })
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn log(&self) -> &[ParseStep] {
        &self.log
    }

    /// Source tag of the most recent step.
    pub fn winning_source(&self) -> Option<&str> {
        self.log.last().map(|s| s.source.as_str())
    }

    /// Replace the value, appending a step.
    pub fn update(&mut self, value: ParamValue, options: &StepOptions) -> Result<(), StrataError> {
        let value = self.definition.normalize(value)?;
        self.log.push(options.step(value.clone()));
        self.value = value;
        Ok(())
    }

    /// Append a step for the current value without changing it.
    pub fn record(&mut self, options: &StepOptions) {
        self.log.push(options.step(self.value.clone()));
    }

    /// Adopt `other`'s value and append its log to ours.
    pub fn merge(&mut self, other: ParsedParameter) {
        self.value = other.value;
        self.log.extend(other.log);
    }
}

/// Parsed parameters of one section, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionValues {
    params: OrderedMap<ParsedParameter>,
}

impl SectionValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn set(&mut self, name: impl Into<String>, param: ParsedParameter) {
        self.params.insert(name, param);
    }

    pub fn get(&self, name: &str) -> Option<&ParsedParameter> {
        self.params.get(name)
    }

    pub fn get_value(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name).map(ParsedParameter::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParsedParameter> {
        self.params.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParsedParameter)> {
        self.params.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys()
    }

    /// Merge `other` in: existing parameters adopt the other value and append
    /// its log, new ones are inserted.
    pub fn merge(&mut self, other: SectionValues) {
        for (name, param) in other.params {
            match self.params.get_mut(&name) {
                Some(existing) => existing.merge(param),
                None => {
                    self.params.insert(name, param);
                }
            }
        }
    }

    /// Append a step carrying each parameter's current value.
    pub fn record_all(&mut self, options: &StepOptions) {
        for param in self.params.values_mut() {
            param.record(options);
        }
    }

    /// Merge only the parameters that have no value yet.
    pub fn merge_as_default(&mut self, other: SectionValues) {
        for (name, param) in other.params {
            if !self.params.contains_key(&name) {
                self.params.insert(name, param);
            }
        }
    }

    /// Record `value` for `definition`, creating the parameter if needed.
    pub fn update_value(
        &mut self,
        definition: &Definition,
        value: ParamValue,
        options: &StepOptions,
    ) -> Result<(), StrataError> {
        match self.params.get_mut(&definition.name) {
            Some(existing) => existing.update(value, options),
            None => {
                let param = ParsedParameter::new(definition.clone(), value, options)?;
                self.params.insert(definition.name.clone(), param);
                Ok(())
            }
        }
    }

    /// Current values as a JSON object keyed by parameter name.
    pub fn to_map(&self) -> Object {
        self.params
            .iter()
            .map(|(name, p)| (name.to_string(), p.value.to_json()))
            .collect()
    }

    /// Deserialize the current values into a host struct.
    ///
    /// Fields bind by (serde) name; a field named `"prefix*"` collects every
    /// parameter matching the glob into a map.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StrataError> {
        binding::bind(self.to_map())
    }
}

/// Parsed values of a whole run, keyed by section slug.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    sections: OrderedMap<SectionValues>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(SectionValues::is_empty)
    }

    pub fn get(&self, slug: &str) -> Option<&SectionValues> {
        self.sections.get(slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut SectionValues> {
        self.sections.get_mut(slug)
    }

    pub fn get_or_create(&mut self, slug: &str) -> &mut SectionValues {
        self.sections.get_or_insert_with(slug, SectionValues::new)
    }

    pub fn get_value(&self, slug: &str, name: &str) -> Option<&ParamValue> {
        self.sections.get(slug).and_then(|s| s.get_value(name))
    }

    pub fn get_parameter(&self, slug: &str, name: &str) -> Option<&ParsedParameter> {
        self.sections.get(slug).and_then(|s| s.get(name))
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.sections.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionValues)> {
        self.sections.iter()
    }

    pub fn remove(&mut self, slug: &str) -> Option<SectionValues> {
        self.sections.remove(slug)
    }

    /// Replace the whole section `slug` with `values`.
    pub fn replace(&mut self, slug: impl Into<String>, values: SectionValues) {
        self.sections.insert(slug, values);
    }

    pub fn merge(&mut self, other: Values) {
        for (slug, section) in other.sections {
            self.get_or_create(&slug).merge(section);
        }
    }

    /// Merge only the sections whose slug is in `slugs`.
    pub fn merge_selective(&mut self, other: Values, slugs: &[&str]) {
        for (slug, section) in other.sections {
            if slugs.contains(&slug.as_str()) {
                self.get_or_create(&slug).merge(section);
            }
        }
    }

    /// Fill in parameters that have no value yet.
    pub fn merge_as_default(&mut self, other: Values) {
        for (slug, section) in other.sections {
            self.get_or_create(&slug).merge_as_default(section);
        }
    }

    /// Flatten every section into one, later sections winning on name clashes.
    pub fn get_all(&self) -> SectionValues {
        let mut all = SectionValues::new();
        for section in self.sections.values() {
            all.merge(section.clone());
        }
        all
    }

    /// All current values as `slug → name → value`.
    pub fn to_map(&self) -> Object {
        self.sections
            .iter()
            .map(|(slug, s)| (slug.to_string(), JsonValue::Object(s.to_map())))
            .collect()
    }

    /// Deserialize one section into a host struct. A missing section decodes
    /// from an empty value set.
    pub fn decode_section<T: DeserializeOwned>(&self, slug: &str) -> Result<T, StrataError> {
        match self.sections.get(slug) {
            Some(section) => section.decode(),
            None => binding::bind(Object::new()),
        }
    }
}
