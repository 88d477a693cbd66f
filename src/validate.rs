//! Structural checks on sections and schemas, and strict-mode detection of
//! unknown keys in config files.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::error::StrataError;
use crate::schema::Schema;
use crate::section::Section;
use crate::value::Object;

/// Positional arguments of a section: required ones precede optional ones,
/// and a list-kind argument, if any, comes last.
pub fn check_arguments(section: &Section) -> Result<(), StrataError> {
    let args: Vec<_> = section.definitions().arguments().collect();
    let mut first_optional: Option<&str> = None;
    for (i, def) in args.iter().enumerate() {
        if def.param_type.is_list() && i + 1 != args.len() {
            return Err(StrataError::Schema(format!(
                "list argument '{}' in section '{}' must be the last argument",
                def.name,
                section.slug()
            )));
        }
        if !def.required {
            first_optional.get_or_insert(&def.name);
        } else if let Some(optional) = first_optional {
            return Err(StrataError::Schema(format!(
                "required argument '{}' cannot follow optional argument '{optional}'",
                def.name
            )));
        }
    }
    Ok(())
}

/// Schema-wide checks: external parameter names (`prefix + name`) are
/// unique, and so are short flags of unprefixed sections.
pub fn check_schema(schema: &Schema) -> Result<(), StrataError> {
    let mut names: HashMap<String, &str> = HashMap::new();
    let mut shorts: HashMap<char, String> = HashMap::new();
    for section in schema.iter() {
        check_arguments(section)?;
        for def in section.definitions().iter() {
            let external = format!("{}{}", section.prefix(), def.name);
            if let Some(other) = names.insert(external.clone(), section.slug()) {
                return Err(StrataError::Schema(format!(
                    "parameter '{external}' is defined by both '{other}' and '{}'",
                    section.slug()
                )));
            }
            if section.prefix().is_empty()
                && let Some(short) = def.short_flag
                && let Some(other) = shorts.insert(short, external.clone())
            {
                return Err(StrataError::Schema(format!(
                    "short flag '-{short}' is used by both '{other}' and '{external}'"
                )));
            }
        }
    }
    Ok(())
}

/// Report keys inside known sections of `doc` that match no definition.
///
/// Unknown section slugs are left alone. Line numbers are found by
/// searching `content` for the key after its section; 0 when not found.
pub fn validate_unknown_keys(
    schema: &Schema,
    doc: &Object,
    content: &str,
    path: &Path,
) -> Result<(), StrataError> {
    let mut errors = Vec::new();
    for (slug, entries) in doc {
        let (Some(section), JsonValue::Object(entries)) = (schema.get(slug), entries) else {
            continue;
        };
        for key in entries.keys() {
            let known = section
                .definitions()
                .iter()
                .any(|d| &d.name == key || d.short_flag.map(String::from).as_ref() == Some(key));
            if !known {
                errors.push(StrataError::UnknownKey {
                    key: format!("{slug}.{key}"),
                    path: path.to_path_buf(),
                    line: find_key_line(content, slug, key),
                });
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StrataError::UnknownKeys(errors))
    }
}

/// Whether `line` assigns `name` as a YAML/JSON (`name:`) or TOML
/// (`name =`) key, or is the TOML header `[name]`.
fn declares_key(line: &str, name: &str) -> bool {
    let trimmed = line.trim();
    if let Some(header) = trimmed.strip_prefix('[')
        && !header.starts_with('[')
    {
        return header.trim_end_matches(']').trim() == name;
    }
    let unquoted = trimmed.trim_start_matches(['"', '\'']);
    unquoted
        .strip_prefix(name)
        .map(|rest| rest.trim_start_matches(['"', '\'']).trim_start())
        .is_some_and(|rest| rest.starts_with(':') || rest.starts_with('='))
}

/// 1-indexed line of `key` within section `slug`.
fn find_key_line(content: &str, slug: &str, key: &str) -> usize {
    let lines: Vec<&str> = content.lines().collect();
    let Some(start) = lines.iter().position(|l| declares_key(l, slug)) else {
        return 0;
    };
    lines[start + 1..]
        .iter()
        .position(|l| declares_key(l, key))
        .map(|offset| start + offset + 2)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;
    use crate::types::ParameterType;
    use std::path::PathBuf;

    fn section(slug: &str, prefix: &str, defs: Vec<Definition>) -> Section {
        Section::builder(slug, slug)
            .with_prefix(prefix)
            .with_fields(defs)
            .build()
            .unwrap()
    }

    fn path() -> PathBuf {
        PathBuf::from("/test/config.yaml")
    }

    #[test]
    fn list_argument_must_be_last() {
        let err = Section::builder("default", "Default")
            .with_arguments([
                Definition::new("files", ParameterType::StringList),
                Definition::new("out", ParameterType::String),
            ])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be the last argument"));
    }

    #[test]
    fn required_cannot_follow_optional() {
        let err = Section::builder("default", "Default")
            .with_arguments([
                Definition::new("a", ParameterType::String),
                Definition::new("b", ParameterType::String).with_required(true),
            ])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cannot follow optional argument 'a'"));
    }

    #[test]
    fn valid_argument_order_passes() {
        let ok = Section::builder("default", "Default")
            .with_arguments([
                Definition::new("a", ParameterType::Int).with_required(true),
                Definition::new("b", ParameterType::IntList),
            ])
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn duplicate_external_names_detected() {
        let schema = Schema::from_sections([
            section("a", "db-", vec![Definition::new("host", ParameterType::String)]),
            section("b", "", vec![Definition::new("db-host", ParameterType::String)]),
        ])
        .unwrap();
        let err = check_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("'db-host'"));
    }

    #[test]
    fn prefix_disambiguates_same_names() {
        let schema = Schema::from_sections([
            section("a", "a-", vec![Definition::new("host", ParameterType::String)]),
            section("b", "b-", vec![Definition::new("host", ParameterType::String)]),
        ])
        .unwrap();
        assert!(check_schema(&schema).is_ok());
    }

    #[test]
    fn duplicate_short_flags_detected() {
        let schema = Schema::from_sections([
            section("a", "", vec![Definition::new("verbose", ParameterType::Bool).with_short('v')]),
            section("b", "", vec![Definition::new("version", ParameterType::Bool).with_short('v')]),
        ])
        .unwrap();
        assert!(check_schema(&schema).is_err());
    }

    fn demo_schema() -> Schema {
        Schema::from_sections([section(
            "demo",
            "",
            vec![
                Definition::new("host", ParameterType::String),
                Definition::new("verbose", ParameterType::Bool).with_short('v'),
            ],
        )])
        .unwrap()
    }

    #[test]
    fn unknown_key_reported_with_line() {
        let content = "demo:\n  host: x\n  typo: 1\nother:\n  anything: 2\n";
        let doc = crate::reader::decode_document(content, "config.yaml").unwrap();
        let doc = doc.as_object().cloned().unwrap_or_default();
        let err = validate_unknown_keys(&demo_schema(), &doc, content, &path()).unwrap_err();
        match err {
            StrataError::UnknownKeys(keys) => {
                assert_eq!(keys.len(), 1);
                match &keys[0] {
                    StrataError::UnknownKey { key, line, .. } => {
                        assert_eq!(key, "demo.typo");
                        assert_eq!(*line, 3);
                    }
                    other => panic!("Expected UnknownKey, got: {other:?}"),
                }
            }
            other => panic!("Expected UnknownKeys, got: {other:?}"),
        }
    }

    #[test]
    fn toml_line_numbers_follow_section_header() {
        let content = "[other]\ntypo = 0\n\n[demo]\nhost = \"x\"\ntypo = 1\n";
        assert_eq!(find_key_line(content, "demo", "typo"), 6);
    }

    #[test]
    fn short_flag_keys_are_known() {
        let content = "demo:\n  v: true\n";
        let doc = crate::reader::decode_document(content, "config.yaml").unwrap();
        let doc = doc.as_object().cloned().unwrap_or_default();
        assert!(validate_unknown_keys(&demo_schema(), &doc, content, &path()).is_ok());
    }
}
