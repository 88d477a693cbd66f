//! Programmatic overrides addressed as `"slug.name"`.
//!
//! Overrides become a section map applied with the highest precedence.
//! [`matching_overrides`] derives them from any serializable value (a clap
//! args struct, a `HashMap`, ...) by matching its keys against parameter
//! names, so fields that are not parameters are skipped.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::StrataError;
use crate::schema::Schema;
use crate::value::Object;

/// Build `slug → name → value` from dotted overrides. Later entries for the
/// same key win.
pub fn overrides_to_map(entries: &[(String, JsonValue)]) -> Result<Object, StrataError> {
    let mut map = Object::new();
    for (key, value) in entries {
        let Some((slug, name)) = key.split_once('.').filter(|(s, n)| !s.is_empty() && !n.is_empty())
        else {
            return Err(StrataError::Configuration(format!(
                "override key '{key}' must have the form 'section.parameter'"
            )));
        };
        let section = map
            .entry(slug.to_string())
            .or_insert_with(|| JsonValue::Object(Object::new()));
        if let JsonValue::Object(params) = section {
            params.insert(name.to_string(), value.clone());
        }
    }
    Ok(map)
}

/// Split a `slug.name=value` assignment. The value stays a string; the
/// parameter's kind coerces it later.
pub fn parse_assignment(input: &str) -> Result<(String, JsonValue), StrataError> {
    let (key, value) = input.split_once('=').ok_or_else(|| {
        StrataError::Configuration(format!("override '{input}' must have the form key=value"))
    })?;
    Ok((key.trim().to_string(), JsonValue::String(value.to_string())))
}

/// Dotted overrides for every top-level key of `source` that names a
/// parameter of `schema`.
///
/// A key matches a parameter when it equals the parameter's external name
/// (`prefix + name`) after `_` → `-`. `null` values are skipped, so unset
/// `Option` fields never override anything.
pub fn matching_overrides(
    schema: &Schema,
    source: &impl Serialize,
) -> Result<Vec<(String, JsonValue)>, StrataError> {
    let JsonValue::Object(fields) =
        serde_json::to_value(source).map_err(|e| StrataError::Binding(e.to_string()))?
    else {
        return Err(StrataError::Binding(
            "override source must serialize to a map".into(),
        ));
    };
    let mut found = Vec::new();
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let wanted = key.replace('_', "-");
        let target = schema.iter().find_map(|section| {
            section
                .definitions()
                .flags()
                .find(|def| def.flag_name(section.prefix()) == wanted)
                .map(|def| format!("{}.{}", section.slug(), def.name))
        });
        if let Some(target) = target {
            found.push((target, value));
        }
    }
    Ok(found)
}
