//! Human-readable reports of parsed values and where they came from.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::definition::render_value;
use crate::parsed::{ParsedParameter, Values};
use crate::types::ParameterType;
use crate::value::ParamValue;

const MASK: &str = "***";

/// One recorded step, rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub source: String,
    pub value: String,
    pub metadata: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterReport {
    pub section: String,
    pub name: String,
    pub value: String,
    pub source: String,
    pub steps: Vec<StepReport>,
}

/// Every parsed parameter, in section then parameter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValuesReport {
    pub parameters: Vec<ParameterReport>,
}

impl ValuesReport {
    pub fn get(&self, section: &str, name: &str) -> Option<&ParameterReport> {
        self.parameters
            .iter()
            .find(|p| p.section == section && p.name == name)
    }
}

fn display(param: &ParsedParameter, value: &ParamValue) -> String {
    if param.definition.param_type == ParameterType::Secret {
        MASK.to_string()
    } else {
        render_value(value)
    }
}

/// Describe `values`. Secrets are masked in both current and logged values.
pub fn describe(values: &Values) -> ValuesReport {
    let mut parameters = Vec::new();
    for (slug, section) in values.iter() {
        for (name, param) in section.iter() {
            parameters.push(ParameterReport {
                section: slug.to_string(),
                name: name.to_string(),
                value: display(param, param.value()),
                source: param.winning_source().unwrap_or_default().to_string(),
                steps: param
                    .log()
                    .iter()
                    .map(|step| StepReport {
                        source: step.source.clone(),
                        value: display(param, &step.value),
                        metadata: step.metadata.clone(),
                    })
                    .collect(),
            });
        }
    }
    ValuesReport { parameters }
}

impl fmt::Display for ValuesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}.{} = {}  ({})", p.section, p.name, p.value, p.source)?;
            for step in &p.steps {
                write!(f, "\n    {}: {}", step.source, step.value)?;
                let details: Vec<String> = step
                    .metadata
                    .iter()
                    .filter(|(k, _)| !k.starts_with("layer"))
                    .map(|(k, v)| match v {
                        JsonValue::String(s) => format!("{k}={s}"),
                        other => format!("{k}={other}"),
                    })
                    .collect();
                if !details.is_empty() {
                    write!(f, " [{}]", details.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::fixtures::test::{demo_schema, obj, vars};
    use crate::sources::{Defaults, FromEnv, FromMap};
    use serde_json::json;

    fn values() -> Values {
        let mut values = Values::new();
        Chain::new()
            .with(FromEnv::new("app").with_vars(vars(&[("APP_DB_PASSWORD", "hunter2")])))
            .with(FromMap::new(obj(json!({"demo": {"x": "m"}}))))
            .with(Defaults::new())
            .execute(&demo_schema(), &mut values)
            .unwrap();
        values
    }

    #[test]
    fn reports_value_and_winning_source() {
        let report = describe(&values());
        let x = report.get("demo", "x").unwrap();
        assert_eq!(x.value, "m");
        assert_eq!(x.source, "map");
        assert_eq!(x.steps.len(), 1);
        let count = report.get("demo", "count").unwrap();
        assert_eq!(count.source, "defaults");
    }

    #[test]
    fn secrets_are_masked() {
        let report = describe(&values());
        let password = report.get("db", "password").unwrap();
        assert_eq!(password.value, MASK);
        assert_eq!(password.steps[0].value, MASK);
        assert!(!report.to_string().contains("hunter2"));
    }

    #[test]
    fn display_lists_steps_with_identifiers() {
        let text = describe(&values()).to_string();
        assert!(text.contains("demo.x = m  (map)"));
        assert!(text.contains("env_key=APP_DB_PASSWORD"));
    }
}
