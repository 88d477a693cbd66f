//! Serde-driven binding between parameter values and host structs.
//!
//! A struct field binds to the parameter with the same (serde) name. A field
//! whose name is a glob such as `"db_*"` (via `#[serde(rename = "db_*")]`)
//! binds every parameter matching the glob into a map field. Field names are
//! only known once serde asks for a struct, so decoding goes through a small
//! [`Deserializer`] that intercepts `deserialize_struct` and hands everything
//! else to `serde_json`.

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::StrataError;
use crate::value::Object;

fn is_wildcard(field: &str) -> bool {
    field.contains('*')
}

fn pattern(field: &str) -> Result<glob::Pattern, String> {
    glob::Pattern::new(field).map_err(|e| format!("invalid wildcard field '{field}': {e}"))
}

/// Decode `params` (parameter name → value) into `T`.
pub(crate) fn bind<T: DeserializeOwned>(params: Object) -> Result<T, StrataError> {
    T::deserialize(StructBinder { params }).map_err(|e| StrataError::Binding(e.to_string()))
}

/// Serialize `source` and flatten it into `(parameter name, value)` pairs.
/// Wildcard fields contribute one pair per matching map entry; `null`
/// fields (unset options) are skipped.
pub(crate) fn unbind(source: &impl Serialize) -> Result<Vec<(String, JsonValue)>, StrataError> {
    let tree = serde_json::to_value(source).map_err(|e| StrataError::Binding(e.to_string()))?;
    let JsonValue::Object(fields) = tree else {
        return Err(StrataError::Binding(format!(
            "expected a struct or map, got {}",
            crate::reader::json_kind(&tree)
        )));
    };
    let mut pairs = Vec::new();
    for (field, value) in fields {
        if value.is_null() {
            continue;
        }
        if is_wildcard(&field) {
            let glob = pattern(&field).map_err(StrataError::Binding)?;
            let JsonValue::Object(entries) = value else {
                return Err(StrataError::Binding(format!(
                    "wildcard field '{field}' must be a map"
                )));
            };
            pairs.extend(
                entries
                    .into_iter()
                    .filter(|(name, v)| glob.matches(name) && !v.is_null()),
            );
        } else {
            pairs.push((field, value));
        }
    }
    Ok(pairs)
}

struct StructBinder {
    params: Object,
}

impl<'de> Deserializer<'de> for StructBinder {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        JsonValue::Object(self.params).deserialize_any(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let mut shaped = Object::new();
        for field in fields.iter().filter(|f| is_wildcard(f)) {
            let glob = pattern(field).map_err(de::Error::custom)?;
            let matched: Object = self
                .params
                .iter()
                .filter(|(k, _)| glob.matches(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            shaped.insert(field.to_string(), JsonValue::Object(matched));
        }
        for (k, v) in self.params {
            shaped.entry(k).or_insert(v);
        }
        JsonValue::Object(shaped).deserialize_struct(name, fields, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn obj(v: JsonValue) -> Object {
        match v {
            JsonValue::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        #[serde(default)]
        tags: Vec<String>,
        since: Option<DateTime<FixedOffset>>,
    }

    #[test]
    fn binds_fields_by_name() {
        let s: Server = bind(obj(json!({
            "host": "localhost",
            "port": 8080,
            "tags": ["a"],
            "since": "2020-01-01T00:00:00+00:00",
            "unrelated": true,
        })))
        .unwrap();
        assert_eq!(s.host, "localhost");
        assert_eq!(s.port, 8080);
        assert_eq!(s.tags, vec!["a"]);
        assert!(s.since.is_some());
    }

    #[test]
    fn missing_option_binds_to_none() {
        let s: Server = bind(obj(json!({"host": "h", "port": 1}))).unwrap();
        assert_eq!(s.since, None);
        assert!(s.tags.is_empty());
    }

    #[test]
    fn type_mismatch_is_binding_error() {
        let err = bind::<Server>(obj(json!({"host": "h", "port": "x"}))).unwrap_err();
        assert!(matches!(err, StrataError::Binding(_)));
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Limits {
        name: String,
        #[serde(rename = "limit_*")]
        limits: BTreeMap<String, i64>,
    }

    #[test]
    fn wildcard_field_collects_matching_parameters() {
        let l: Limits = bind(obj(json!({
            "name": "n",
            "limit_cpu": 2,
            "limit_mem": 512,
            "other": 1,
        })))
        .unwrap();
        assert_eq!(l.limits.len(), 2);
        assert_eq!(l.limits["limit_mem"], 512);
    }

    #[test]
    fn unbind_expands_wildcards_and_skips_nulls() {
        let mut limits = BTreeMap::new();
        limits.insert("limit_cpu".to_string(), 2);
        limits.insert("bogus".to_string(), 3);
        let pairs = unbind(&Limits {
            name: "n".into(),
            limits,
        })
        .unwrap();
        let names: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["limit_cpu", "name"]);

        let server = Server {
            host: "h".into(),
            port: 1,
            tags: vec![],
            since: None,
        };
        let pairs = unbind(&server).unwrap();
        assert!(pairs.iter().all(|(k, _)| k != "since"));
    }

    #[test]
    fn unbind_rejects_scalars() {
        assert!(unbind(&5).is_err());
    }
}
