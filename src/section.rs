//! Sections (layers): named, optionally prefixed groups of definitions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::binding;
use crate::cli::{ArgumentSpec, CliMatches, CliRegistrar, FlagSpec};
use crate::definition::Definition;
use crate::definitions::Definitions;
use crate::error::StrataError;
use crate::parsed::{SectionValues, StepOptions};
use crate::reader;
use crate::validate;
use crate::value::{Object, ParamValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SectionSpec", into = "SectionSpec")]
pub struct Section {
    slug: String,
    name: String,
    description: String,
    prefix: String,
    definitions: Definitions,
}

impl Section {
    pub fn builder(slug: &str, name: &str) -> SectionBuilder {
        SectionBuilder::new(slug, name)
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Prepended to external flag and env names of every definition.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// Replace defaults from a `name → value` map.
    pub fn set_defaults_from_map(&mut self, map: &Object) -> Result<(), StrataError> {
        self.definitions.set_defaults_from_map(map)
    }

    /// Replace defaults from a host struct's fields.
    pub fn set_defaults_from_struct(&mut self, source: &impl Serialize) -> Result<(), StrataError> {
        self.definitions.initialize_defaults_from_struct(source)
    }

    pub(crate) fn merge_definitions(&mut self, other: &Definitions) {
        self.definitions.merge(other);
    }

    /// A copy of this section exposing only the named definitions.
    pub fn whitelist(&self, names: &[&str]) -> Section {
        let mut view = self.clone();
        view.definitions.retain(|name, _| names.contains(&name));
        view
    }

    /// A copy of this section without the named definitions.
    pub fn blacklist(&self, names: &[&str]) -> Section {
        let mut view = self.clone();
        view.definitions.retain(|name, _| !names.contains(&name));
        view
    }

    /// Register flags (and positional arguments) with a CLI adapter.
    pub fn add_to_cli(&self, cli: &mut dyn CliRegistrar) -> Result<(), StrataError> {
        for def in self.definitions.flags() {
            cli.add_flag(FlagSpec::from_definition(def, &self.prefix))?;
        }
        for def in self.definitions.arguments() {
            cli.add_argument(ArgumentSpec::from_definition(def))?;
        }
        Ok(())
    }

    /// Read explicitly provided flags back from a parsed command line.
    ///
    /// Flags the user did not pass are skipped. A `keyValue` flag given with
    /// an empty value clears the map and is tagged `emptyFlag`.
    pub fn parse_from_cli(
        &self,
        matches: &dyn CliMatches,
        options: &StepOptions,
    ) -> Result<SectionValues, StrataError> {
        let mut values = SectionValues::new();
        for def in self.definitions.flags() {
            let flag = def.flag_name(&self.prefix);
            if !matches.flag_provided(&flag) {
                continue;
            }
            let tokens: Vec<String> = matches
                .flag_values(&flag)
                .unwrap_or_default()
                .into_iter()
                .filter(|t| !(def.param_type.is_key_value() && t.is_empty()))
                .collect();
            let step = self
                .step_options()
                .with_metadata("flag", flag.as_str())
                .over(options);
            if def.param_type.is_key_value() && tokens.is_empty() {
                let cleared = ParamValue::KeyValue(Default::default());
                values.update_value(def, cleared, &step.with_metadata("emptyFlag", true))?;
                continue;
            }
            let value = def.parse_tokens(&tokens)?;
            values.update_value(def, value, &step)?;
        }
        Ok(values)
    }

    /// Layer metadata recorded on every step a source writes for this
    /// section.
    pub(crate) fn step_options(&self) -> StepOptions {
        StepOptions::new()
            .with_metadata("layer", self.name.as_str())
            .with_metadata("layer_slug", self.slug.as_str())
            .with_metadata("layer_prefix", self.prefix.as_str())
    }

    /// Load a layer file (`.yaml`, `.yml`, `.json`, or `.toml`).
    pub fn from_file(path: &Path) -> Result<Section, StrataError> {
        let doc = reader::load_document(path)?;
        serde_json::from_value(doc).map_err(|e| StrataError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse a layer from YAML (JSON is accepted too).
    pub fn from_yaml(content: &str) -> Result<Section, StrataError> {
        serde_yaml::from_str(content).map_err(|e| StrataError::Schema(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, StrataError> {
        serde_yaml::to_string(self).map_err(|e| StrataError::Schema(e.to_string()))
    }
}

/// Builder for [`Section`]; problems surface from [`build`](Self::build).
pub struct SectionBuilder {
    slug: String,
    name: String,
    description: String,
    prefix: String,
    definitions: Vec<Definition>,
    defaults: Vec<(String, JsonValue)>,
    error: Option<StrataError>,
}

impl SectionBuilder {
    fn new(slug: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            description: String::new(),
            prefix: String::new(),
            definitions: Vec::new(),
            defaults: Vec::new(),
            error: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_fields(mut self, defs: impl IntoIterator<Item = Definition>) -> Self {
        self.definitions.extend(defs);
        self
    }

    /// Add positional arguments; each is marked as an argument.
    pub fn with_arguments(mut self, defs: impl IntoIterator<Item = Definition>) -> Self {
        self.definitions
            .extend(defs.into_iter().map(Definition::as_argument));
        self
    }

    /// Take defaults from a host struct's fields.
    pub fn with_defaults(mut self, source: &impl Serialize) -> Self {
        match binding::unbind(source) {
            Ok(pairs) => self.defaults.extend(pairs),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Take defaults from a `name → value` map.
    pub fn with_defaults_map(mut self, map: Object) -> Self {
        self.defaults
            .extend(map.into_iter().filter(|(_, v)| !v.is_null()));
        self
    }

    pub fn build(self) -> Result<Section, StrataError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.slug.trim().is_empty() {
            return Err(StrataError::Schema("section slug cannot be empty".into()));
        }
        let mut definitions = Definitions::new();
        for def in self.definitions {
            if definitions.contains(&def.name) {
                return Err(StrataError::Schema(format!(
                    "duplicate parameter '{}' in section '{}'",
                    def.name, self.slug
                )));
            }
            def.validate()?;
            definitions.set(def);
        }
        for (name, raw) in &self.defaults {
            if let Some(def) = definitions.get_mut(name) {
                def.set_default_from_json(raw)?;
            }
        }
        let section = Section {
            slug: self.slug,
            name: self.name,
            description: self.description,
            prefix: self.prefix,
            definitions,
        };
        validate::check_arguments(&section)?;
        Ok(section)
    }
}

/// On-disk form of a layer file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionSpec {
    slug: String,
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    prefix: String,
    #[serde(default)]
    flags: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<Definition>,
}

impl TryFrom<SectionSpec> for Section {
    type Error = StrataError;

    fn try_from(spec: SectionSpec) -> Result<Self, Self::Error> {
        Section::builder(&spec.slug, &spec.name)
            .with_description(&spec.description)
            .with_prefix(&spec.prefix)
            .with_fields(spec.flags)
            .with_arguments(spec.arguments)
            .build()
    }
}

impl From<Section> for SectionSpec {
    fn from(section: Section) -> Self {
        let mut flags = Vec::new();
        let mut arguments = Vec::new();
        for mut def in section.definitions.iter().cloned() {
            if def.is_argument {
                // implied by the list it is written to
                def.is_argument = false;
                arguments.push(def);
            } else {
                flags.push(def);
            }
        }
        SectionSpec {
            slug: section.slug,
            name: section.name,
            description: section.description,
            prefix: section.prefix,
            flags,
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StaticMatches;
    use crate::types::ParameterType;
    use serde::Deserialize;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn db_section() -> Section {
        Section::builder("db", "Database")
            .with_prefix("db-")
            .with_fields([
                Definition::new("host", ParameterType::String).with_default("localhost"),
                Definition::new("port", ParameterType::Int).with_default(5432i64),
                Definition::new("labels", ParameterType::KeyValue),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Section::builder("s", "S")
            .with_fields([
                Definition::new("x", ParameterType::String),
                Definition::new("x", ParameterType::Int),
            ])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate parameter 'x'"));
    }

    #[test]
    fn empty_slug_rejected() {
        assert!(Section::builder("", "S").build().is_err());
    }

    #[test]
    fn whitelist_and_blacklist_leave_original_intact() {
        let section = db_section();
        let white = section.whitelist(&["host"]);
        let black = section.blacklist(&["host"]);
        assert_eq!(white.definitions().names().collect::<Vec<_>>(), vec!["host"]);
        assert_eq!(
            black.definitions().names().collect::<Vec<_>>(),
            vec!["port", "labels"]
        );
        assert_eq!(section.definitions().len(), 3);
    }

    #[derive(Serialize, Deserialize)]
    struct DbDefaults {
        host: String,
        port: i64,
    }

    #[test]
    fn defaults_from_struct_and_map() {
        let section = Section::builder("db", "Database")
            .with_fields([
                Definition::new("host", ParameterType::String),
                Definition::new("port", ParameterType::Int),
            ])
            .with_defaults(&DbDefaults {
                host: "db.internal".into(),
                port: 6543,
            })
            .with_defaults_map(json!({"port": 7000}).as_object().cloned().unwrap_or_default())
            .build()
            .unwrap();
        assert_eq!(
            section.definition("host").unwrap().default,
            Some(ParamValue::from("db.internal"))
        );
        assert_eq!(
            section.definition("port").unwrap().default,
            Some(ParamValue::Integer(7000))
        );
    }

    #[test]
    fn invalid_default_fails_build() {
        let err = Section::builder("s", "S")
            .with_fields([Definition::new("n", ParameterType::Int)])
            .with_defaults_map(json!({"n": "x"}).as_object().cloned().unwrap_or_default())
            .build()
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation { .. }));
    }

    #[test]
    fn parse_from_cli_uses_prefixed_flag_names() {
        let section = db_section();
        let matches = StaticMatches::new().flag("db-port", ["6000"]);
        let values = section
            .parse_from_cli(&matches, &StepOptions::source("flags"))
            .unwrap();
        assert_eq!(values.get_value("port"), Some(&ParamValue::Integer(6000)));
        assert!(values.get("host").is_none());
        let step = &values.get("port").unwrap().log()[0];
        assert_eq!(step.source, "flags");
        assert_eq!(step.metadata["flag"], "db-port");
        assert_eq!(step.metadata["layer_slug"], "db");
    }

    #[test]
    fn empty_key_value_flag_clears_map() {
        let section = db_section();
        let matches = StaticMatches::new().flag("db-labels", [""]);
        let values = section
            .parse_from_cli(&matches, &StepOptions::source("flags"))
            .unwrap();
        let labels = values.get("labels").unwrap();
        assert_eq!(labels.value(), &ParamValue::KeyValue(Default::default()));
        assert_eq!(labels.log()[0].metadata["emptyFlag"], true);
    }

    #[test]
    fn layer_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.yaml");
        fs::write(
            &path,
            "slug: db\nname: Database\nprefix: db-\nflags:\n  - name: host\n    type: string\n    default: localhost\n  - name: level\n    type: choice\n    choices: [a, b]\narguments:\n  - name: target\n    type: string\n    required: true\n",
        )
        .unwrap();
        let section = Section::from_file(&path).unwrap();
        assert_eq!(section.prefix(), "db-");
        assert!(section.definition("target").unwrap().is_argument);

        let yaml = section.to_yaml().unwrap();
        let back = Section::from_yaml(&yaml).unwrap();
        assert_eq!(back, section);
    }

    #[test]
    fn layer_file_invalid_default_is_rejected() {
        let result = Section::from_yaml(
            "slug: s\nname: S\nflags:\n  - name: n\n    type: int\n    default: nope\n",
        );
        assert!(result.is_err());
    }

    #[cfg(feature = "clap")]
    #[test]
    fn registers_with_clap() {
        use crate::clap_cli::ClapCli;
        let mut cli = ClapCli::new(clap::Command::new("t"));
        db_section().add_to_cli(&mut cli).unwrap();
        let cmd = cli.build();
        let m = cmd.try_get_matches_from(["t", "--db-host", "h"]).unwrap();
        let values = db_section()
            .parse_from_cli(&m, &StepOptions::source("flags"))
            .unwrap();
        assert_eq!(values.get_value("host"), Some(&ParamValue::from("h")));
    }
}
