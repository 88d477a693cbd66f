use std::path::PathBuf;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::reader::{self, json_kind};
use crate::schema::Schema;

use super::{MAP, MergeMode, apply_section_map};

/// Values from one named profile of a profiles file
/// (`profile → slug → name → value`), applied like [`super::FromMap`].
///
/// When not `required`, a missing file or profile contributes nothing.
#[derive(Debug, Clone)]
pub struct FromProfile {
    file: PathBuf,
    profile: String,
    required: bool,
    options: StepOptions,
}

impl FromProfile {
    pub fn new(file: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            profile: profile.into(),
            required: false,
            options: StepOptions::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    fn contribute(&self, schema: &Schema, values: &mut Values) -> Result<(), StrataError> {
        if !self.file.exists() {
            if self.required {
                return Err(StrataError::Configuration(format!(
                    "profile file {} does not exist",
                    self.file.display()
                )));
            }
            debug!(event = "strata.profile.file_missing", path = %self.file.display());
            return Ok(());
        }
        let profiles = match reader::load_document(&self.file)? {
            JsonValue::Object(profiles) => profiles,
            JsonValue::Null => Default::default(),
            other => {
                return Err(StrataError::Configuration(format!(
                    "profile file {} must map profile names to sections, got {}",
                    self.file.display(),
                    json_kind(&other)
                )));
            }
        };
        let sections = match profiles.get(&self.profile) {
            Some(JsonValue::Object(sections)) => sections,
            Some(other) => {
                return Err(StrataError::Configuration(format!(
                    "profile '{}' in {} must be a map of sections, got {}",
                    self.profile,
                    self.file.display(),
                    json_kind(other)
                )));
            }
            None if self.required => {
                return Err(StrataError::Configuration(format!(
                    "profile '{}' not found in {}",
                    self.profile,
                    self.file.display()
                )));
            }
            None => {
                debug!(event = "strata.profile.not_found", profile = %self.profile);
                return Ok(());
            }
        };
        debug!(event = "strata.profile.applied", profile = %self.profile);
        let options = self.options.over(
            &StepOptions::source(MAP)
                .with_metadata("profile", self.profile.as_str())
                .with_metadata("file", self.file.display().to_string()),
        );
        apply_section_map(schema, values, sections, &options, MergeMode::Override)
    }
}

impl Source for FromProfile {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        self.contribute(schema, values)
    }

    fn label(&self) -> &str {
        "profile"
    }
}
