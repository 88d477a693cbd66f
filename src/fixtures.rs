#[cfg(test)]
pub mod test {
    use chrono::{DateTime, FixedOffset};
    use serde_json::Value as JsonValue;

    use crate::definition::Definition;
    use crate::schema::Schema;
    use crate::section::Section;
    use crate::types::ParameterType;
    use crate::value::Object;

    /// Command-local section: one flag with a short form, one choice with a
    /// default, and an optional positional.
    pub fn default_section() -> Section {
        Section::builder("default", "Default")
            .with_fields([
                Definition::new("verbose", ParameterType::Bool)
                    .with_short('v')
                    .with_help("Verbose output"),
                Definition::new("format", ParameterType::Choice)
                    .with_choices(["json", "yaml"])
                    .with_default("json"),
            ])
            .with_arguments([Definition::new("input", ParameterType::String)])
            .build()
            .unwrap()
    }

    pub fn demo_section() -> Section {
        Section::builder("demo", "Demo")
            .with_fields([
                Definition::new("x", ParameterType::String),
                Definition::new("count", ParameterType::Int).with_default(3),
                Definition::new("tags", ParameterType::StringList),
                Definition::new("labels", ParameterType::KeyValue),
            ])
            .build()
            .unwrap()
    }

    pub fn db_section() -> Section {
        Section::builder("db", "Database")
            .with_prefix("db-")
            .with_fields([
                Definition::new("host", ParameterType::String).with_default("localhost"),
                Definition::new("port", ParameterType::Int).with_default(5432),
                Definition::new("password", ParameterType::Secret),
            ])
            .build()
            .unwrap()
    }

    /// `default`, `demo`, and the `db-`-prefixed `db` section, in that order.
    pub fn demo_schema() -> Schema {
        Schema::from_sections([default_section(), demo_section(), db_section()]).unwrap()
    }

    /// Wednesday, 2024-05-15 12:30:00 +02:00.
    pub fn reference_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-15T12:30:00+02:00").unwrap()
    }

    pub fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    /// An `audit` section whose date parameters resolve relative phrases
    /// against [`reference_time`]; `until` defaults to `tomorrow`.
    pub fn dated_schema() -> Schema {
        let audit = Section::builder("audit", "Audit")
            .with_fields([
                Definition::new("since", ParameterType::Date).with_reference_time(reference_time()),
                Definition::new("until", ParameterType::Date)
                    .with_reference_time(reference_time())
                    .with_default("tomorrow"),
            ])
            .build()
            .unwrap();
        Schema::from_sections([audit]).unwrap()
    }

    /// Unwrap a `json!` literal known to be an object.
    pub fn obj(value: JsonValue) -> Object {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected a JSON object, got {other}"),
        }
    }

    /// Synthetic environment for sources that read variables.
    pub fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn demo_schema_is_consistent() {
        let schema = demo_schema();
        assert_eq!(
            schema.slugs().collect::<Vec<_>>(),
            vec!["default", "demo", "db"]
        );
        assert!(crate::validate::check_schema(&schema).is_ok());
    }
}
