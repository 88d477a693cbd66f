use crate::chain::{Next, Source};
use crate::cli::CliMatches;
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::schema::Schema;

use super::FLAGS;

/// Values of explicitly passed command-line flags.
///
/// Flags the user did not pass leave the inner chain's values untouched.
/// Positional arguments are handled by [`super::FromArgs`].
pub struct FromCli<'m> {
    matches: &'m dyn CliMatches,
    options: StepOptions,
}

impl<'m> FromCli<'m> {
    pub fn new(matches: &'m dyn CliMatches) -> Self {
        Self {
            matches,
            options: StepOptions::new(),
        }
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }
}

impl Source for FromCli<'_> {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        let options = self.options.over(&StepOptions::source(FLAGS));
        for section in schema.iter() {
            let parsed = section.parse_from_cli(self.matches, &options)?;
            if !parsed.is_empty() {
                values.get_or_create(section.slug()).merge(parsed);
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        FLAGS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::cli::StaticMatches;
    use crate::fixtures::test::{demo_schema, obj};
    use crate::sources::FromMap;
    use crate::value::ParamValue;
    use serde_json::json;

    #[test]
    fn provided_flags_override_inner_values() {
        let matches = StaticMatches::new()
            .flag("x", ["cli"])
            .flag("db-port", ["6000"]);
        let mut values = Values::new();
        Chain::new()
            .with(FromCli::new(&matches))
            .with(FromMap::new(obj(json!({"demo": {"x": "map", "count": 4}}))))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("cli"));
        assert_eq!(x.winning_source(), Some(FLAGS));
        assert_eq!(x.log().last().unwrap().metadata["flag"], json!("x"));
        assert_eq!(values.get_value("demo", "count"), Some(&ParamValue::from(4)));
        assert_eq!(values.get_value("db", "port"), Some(&ParamValue::from(6000)));
    }

    #[test]
    fn empty_key_value_flag_clears_the_map() {
        let matches = StaticMatches::new().flag("labels", [""]);
        let mut values = Values::new();
        Chain::new()
            .with(FromCli::new(&matches))
            .with(FromMap::new(obj(json!({"demo": {"labels": {"a": "1"}}}))))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        let labels = values.get_parameter("demo", "labels").unwrap();
        assert_eq!(labels.value(), &ParamValue::KeyValue(Default::default()));
        assert_eq!(labels.log().last().unwrap().metadata["emptyFlag"], json!(true));
    }

    #[test]
    fn nothing_passed_records_nothing() {
        let matches = StaticMatches::new();
        let mut values = Values::new();
        Chain::new()
            .with(FromCli::new(&matches))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        assert!(values.is_empty());
    }
}
