use std::collections::HashMap;

use tracing::debug;

use crate::chain::{Next, Source};
use crate::definition::Definition;
use crate::error::StrataError;
use crate::parsed::{SectionValues, StepOptions, Values};
use crate::schema::Schema;

use super::ENV;

/// Environment variable name for parameter `name` of a section with
/// `section_prefix`: `PREFIX_` + section prefix + name, uppercased, with
/// dashes turned into underscores. An empty `prefix` adds nothing.
///
/// ```
/// assert_eq!(strata::sources::env_key("app", "db-", "pool-size"), "APP_DB_POOL_SIZE");
/// assert_eq!(strata::sources::env_key("", "", "verbose"), "VERBOSE");
/// ```
pub fn env_key(prefix: &str, section_prefix: &str, name: &str) -> String {
    let raw = if prefix.is_empty() {
        format!("{section_prefix}{name}")
    } else {
        format!("{prefix}_{section_prefix}{name}")
    };
    raw.replace('-', "_").to_uppercase()
}

/// Values from environment variables, one variable per definition.
///
/// Reads the process environment unless a snapshot is injected with
/// [`FromEnv::with_vars`], which tests use instead of `std::env::vars()`.
/// List kinds split the variable on commas; `keyValue` values starting with
/// `@` are read from the named file instead.
#[derive(Debug, Clone)]
pub struct FromEnv {
    prefix: String,
    vars: Option<HashMap<String, String>>,
    options: StepOptions,
}

impl FromEnv {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
            options: StepOptions::new(),
        }
    }

    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.vars = Some(vars.into_iter().collect());
        self
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn contribute(
        &self,
        schema: &Schema,
        values: &mut Values,
        vars: &HashMap<String, String>,
    ) -> Result<(), StrataError> {
        let base = self.options.over(&StepOptions::source(ENV));
        for section in schema.iter() {
            let layer = base.over(&section.step_options());
            let mut found = SectionValues::new();
            for def in section.definitions().iter() {
                let key = env_key(&self.prefix, section.prefix(), &def.name);
                let Some(raw) = vars.get(&key) else {
                    continue;
                };
                debug!(
                    event = "strata.env.variable_applied",
                    env_key = %key,
                    section = section.slug(),
                    parameter = %def.name
                );
                let value = def.parse_tokens(&env_tokens(def, raw))?;
                let step = StepOptions::new()
                    .with_metadata("env_key", key.as_str())
                    .over(&layer);
                found.update_value(def, value, &step)?;
            }
            if !found.is_empty() {
                values.get_or_create(section.slug()).merge(found);
            }
        }
        Ok(())
    }
}

fn env_tokens(def: &Definition, raw: &str) -> Vec<String> {
    if def.param_type.is_list() && !(def.param_type.is_key_value() && raw.starts_with('@')) {
        raw.split(',').map(str::to_string).collect()
    } else {
        vec![raw.to_string()]
    }
}

impl Source for FromEnv {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        match &self.vars {
            Some(vars) => self.contribute(schema, values, vars),
            None => self.contribute(schema, values, &std::env::vars().collect()),
        }
    }

    fn label(&self) -> &str {
        ENV
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::fixtures::test::{at, dated_schema, demo_schema, obj, vars};
    use crate::sources::FromMap;
    use crate::value::ParamValue;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn run(env: &[(&str, &str)]) -> Result<Values, StrataError> {
        let mut values = Values::new();
        Chain::new()
            .with(FromEnv::new("app").with_vars(vars(env)))
            .execute(&demo_schema(), &mut values)?;
        Ok(values)
    }

    #[test]
    fn key_construction() {
        assert_eq!(env_key("app", "", "x"), "APP_X");
        assert_eq!(env_key("my-app", "db-", "host"), "MY_APP_DB_HOST");
        assert_eq!(env_key("", "db-", "host"), "DB_HOST");
    }

    #[test]
    fn scalar_with_provenance() {
        let values = run(&[("APP_X", "from-env")]).unwrap();
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("from-env"));
        let step = &x.log()[0];
        assert_eq!(step.source, ENV);
        assert_eq!(step.metadata["env_key"], json!("APP_X"));
        assert_eq!(step.metadata["layer_slug"], json!("demo"));
    }

    #[test]
    fn section_prefix_is_part_of_the_key() {
        let values = run(&[("APP_DB_PORT", "6543"), ("APP_PORT", "1")]).unwrap();
        assert_eq!(values.get_value("db", "port"), Some(&ParamValue::from(6543)));
    }

    #[test]
    fn lists_split_on_commas() {
        let values = run(&[("APP_TAGS", "a,b,c"), ("APP_LABELS", "k:v,x:y")]).unwrap();
        assert_eq!(
            values.get_value("demo", "tags"),
            Some(&ParamValue::from(vec!["a", "b", "c"]))
        );
        let labels: BTreeMap<String, String> = [("k", "v"), ("x", "y")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(values.get_value("demo", "labels"), Some(&ParamValue::from(labels)));
    }

    #[test]
    fn invalid_value_is_fatal() {
        assert!(run(&[("APP_COUNT", "lots")]).is_err());
    }

    #[test]
    fn env_overrides_inner_sources() {
        let mut values = Values::new();
        Chain::new()
            .with(FromEnv::new("app").with_vars(vars(&[("APP_X", "env")])))
            .with(FromMap::new(obj(json!({"demo": {"x": "map"}}))))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("env"));
        let sources: Vec<_> = x.log().iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["map", "env"]);
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let values = run(&[("OTHER_X", "nope"), ("APPX", "nope")]).unwrap();
        assert!(values.is_empty());
    }

    fn run_dated(env: &[(&str, &str)]) -> Result<Values, StrataError> {
        let mut values = Values::new();
        Chain::new()
            .with(FromEnv::new("app").with_vars(vars(env)))
            .execute(&dated_schema(), &mut values)?;
        Ok(values)
    }

    #[test]
    fn relative_and_human_dates_resolve_against_reference() {
        let values = run_dated(&[("APP_SINCE", "10 days ago"), ("APP_UNTIL", "January 1st 2025")])
            .unwrap();
        assert_eq!(
            values.get_value("audit", "since"),
            Some(&ParamValue::Date(at("2024-05-05T12:30:00+02:00")))
        );
        assert_eq!(
            values.get_value("audit", "until"),
            Some(&ParamValue::Date(at("2025-01-01T00:00:00+02:00")))
        );
    }

    #[test]
    fn out_of_range_relative_date_is_an_error() {
        for phrase in ["100000000 days ago", "9223372036854775807 seconds ago"] {
            let err = run_dated(&[("APP_SINCE", phrase)]).unwrap_err();
            assert!(
                matches!(&err, StrataError::Validation { parameter, .. } if parameter == "since"),
                "{phrase}: {err}"
            );
        }
    }
}
