use tracing::trace;

use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::schema::Schema;

use super::DEFAULTS;

/// Fill every parameter that has a declared default.
///
/// The normal form contributes after the inner chain and only touches
/// parameters nothing else has set. [`Defaults::first`] records defaults
/// before the inner chain runs, so later sources append on top of them.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    first: bool,
    options: StepOptions,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first() -> Self {
        Self {
            first: true,
            options: StepOptions::new(),
        }
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    fn record(&self, schema: &Schema, values: &mut Values) -> Result<(), StrataError> {
        let base = self.options.over(&StepOptions::source(DEFAULTS));
        for section in schema.iter() {
            let step = base.over(&section.step_options());
            for def in section.definitions().iter() {
                let Some(default) = &def.default else {
                    continue;
                };
                if values.get_value(section.slug(), &def.name).is_some() {
                    continue;
                }
                trace!(
                    event = "strata.defaults.applied",
                    section = section.slug(),
                    parameter = %def.name
                );
                values
                    .get_or_create(section.slug())
                    .update_value(def, default.clone(), &step)?;
            }
        }
        Ok(())
    }
}

impl Source for Defaults {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        if self.first {
            self.record(schema, values)?;
            next.run(schema, values)
        } else {
            next.run(schema, values)?;
            self.record(schema, values)
        }
    }

    fn label(&self) -> &str {
        DEFAULTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::fixtures::test::{demo_schema, obj};
    use crate::sources::FromMap;
    use crate::value::ParamValue;
    use serde_json::json;

    #[test]
    fn fills_only_parameters_with_defaults() {
        let schema = demo_schema();
        let mut values = Values::new();
        Chain::new()
            .with(Defaults::new())
            .execute(&schema, &mut values)
            .unwrap();
        assert_eq!(values.get_value("demo", "count"), Some(&ParamValue::from(3)));
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("localhost")));
        assert_eq!(values.get_value("default", "format"), Some(&ParamValue::from("json")));
        assert!(values.get_value("demo", "x").is_none());
        let count = values.get_parameter("demo", "count").unwrap();
        assert_eq!(count.winning_source(), Some(DEFAULTS));
        assert_eq!(count.log()[0].metadata["layer_slug"], json!("demo"));
    }

    #[test]
    fn later_defaults_do_not_override_inner_values() {
        let schema = demo_schema();
        let mut values = Values::new();
        Chain::new()
            .with(Defaults::new())
            .with(FromMap::new(obj(json!({"demo": {"count": 7}}))))
            .execute(&schema, &mut values)
            .unwrap();
        let count = values.get_parameter("demo", "count").unwrap();
        assert_eq!(count.value(), &ParamValue::from(7));
        assert_eq!(count.log().len(), 1);
    }

    #[test]
    fn first_defaults_are_overridden_and_logged() {
        let schema = demo_schema();
        let mut values = Values::new();
        Chain::new()
            .with(FromMap::new(obj(json!({"demo": {"count": 7}}))))
            .with(Defaults::first())
            .execute(&schema, &mut values)
            .unwrap();
        let count = values.get_parameter("demo", "count").unwrap();
        assert_eq!(count.value(), &ParamValue::from(7));
        let sources: Vec<_> = count.log().iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["defaults", "map"]);
    }
}
