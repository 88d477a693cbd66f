//! Coerced parameter values.
//!
//! Raw inputs arrive either as CLI/env string tokens or as untyped
//! `serde_json::Value` trees (config files, maps, profiles). Once a
//! definition has coerced them they become a [`ParamValue`], whose variant
//! always matches the shape expected by the parameter kind.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::StrataError;

/// A JSON object, the shape of `objectFromFile` values.
pub type Object = Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<FixedOffset>),
    StringList(Vec<String>),
    IntegerList(Vec<i64>),
    FloatList(Vec<f64>),
    KeyValue(BTreeMap<String, String>),
    Object(Object),
    ObjectList(Vec<Object>),
    File(FileData),
    FileList(Vec<FileData>),
}

impl ParamValue {
    /// Short human name of the variant, used in validation messages.
    pub fn shape(&self) -> &'static str {
        match self {
            ParamValue::String(_) => "string",
            ParamValue::Integer(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Date(_) => "date",
            ParamValue::StringList(_) => "string list",
            ParamValue::IntegerList(_) => "integer list",
            ParamValue::FloatList(_) => "float list",
            ParamValue::KeyValue(_) => "key/value map",
            ParamValue::Object(_) => "object",
            ParamValue::ObjectList(_) => "object list",
            ParamValue::File(_) => "file",
            ParamValue::FileList(_) => "file list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            ParamValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_key_value(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ParamValue::KeyValue(m) => Some(m),
            _ => None,
        }
    }

    /// Convert to an untyped JSON tree. Dates become RFC 3339 strings and
    /// files become objects describing the file.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ParamValue::String(s) => JsonValue::String(s.clone()),
            ParamValue::Integer(i) => JsonValue::from(*i),
            ParamValue::Float(f) => JsonValue::from(*f),
            ParamValue::Bool(b) => JsonValue::Bool(*b),
            ParamValue::Date(d) => {
                JsonValue::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            ParamValue::StringList(v) => JsonValue::from(v.clone()),
            ParamValue::IntegerList(v) => JsonValue::from(v.clone()),
            ParamValue::FloatList(v) => JsonValue::from(v.clone()),
            ParamValue::KeyValue(m) => JsonValue::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                    .collect(),
            ),
            ParamValue::Object(o) => JsonValue::Object(o.clone()),
            ParamValue::ObjectList(v) => {
                JsonValue::Array(v.iter().cloned().map(JsonValue::Object).collect())
            }
            ParamValue::File(f) => f.to_json(),
            ParamValue::FileList(v) => JsonValue::Array(v.iter().map(FileData::to_json).collect()),
        }
    }

    /// Deserialize the value into any serde type, e.g. a host struct field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StrataError> {
        serde_json::from_value(self.to_json()).map_err(|e| StrataError::Binding(e.to_string()))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Integer(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<DateTime<FixedOffset>> for ParamValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        ParamValue::Date(v)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(v: DateTime<Utc>) -> Self {
        ParamValue::Date(v.fixed_offset())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StringList(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::StringList(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntegerList(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::FloatList(v)
    }
}

impl From<BTreeMap<String, String>> for ParamValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        ParamValue::KeyValue(v)
    }
}

impl From<Object> for ParamValue {
    fn from(v: Object) -> Self {
        ParamValue::Object(v)
    }
}

/// Detected format of a loaded file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Json,
    Yaml,
    Toml,
    Csv,
    Tsv,
    Text,
}

impl FileType {
    pub fn from_extension(ext: &str) -> FileType {
        match ext.to_ascii_lowercase().as_str() {
            "json" => FileType::Json,
            "yaml" | "yml" => FileType::Yaml,
            "toml" => FileType::Toml,
            "csv" => FileType::Csv,
            "tsv" => FileType::Tsv,
            _ => FileType::Text,
        }
    }
}

/// A file loaded by a `file` / `fileList` parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileData {
    /// Path as given by the user (`-` for standard input).
    pub path: PathBuf,
    /// Canonicalized path, or `path` when canonicalization is impossible.
    pub real_path: PathBuf,
    pub base_name: String,
    pub extension: String,
    pub file_type: FileType,
    pub content: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Parsed document for JSON, YAML, and TOML files.
    pub parsed: Option<JsonValue>,
}

impl FileData {
    pub fn to_json(&self) -> JsonValue {
        let mut obj = Map::new();
        obj.insert(
            "path".into(),
            JsonValue::String(self.path.display().to_string()),
        );
        obj.insert(
            "real_path".into(),
            JsonValue::String(self.real_path.display().to_string()),
        );
        obj.insert("base_name".into(), JsonValue::String(self.base_name.clone()));
        obj.insert("extension".into(), JsonValue::String(self.extension.clone()));
        obj.insert(
            "file_type".into(),
            serde_json::to_value(self.file_type).unwrap_or(JsonValue::Null),
        );
        obj.insert("content".into(), JsonValue::String(self.content.clone()));
        obj.insert("size".into(), JsonValue::from(self.size));
        obj.insert(
            "last_modified".into(),
            self.last_modified
                .map(|t| JsonValue::String(t.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
        );
        obj.insert(
            "parsed".into(),
            self.parsed.clone().unwrap_or(JsonValue::Null),
        );
        JsonValue::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_convert_to_json() {
        assert_eq!(ParamValue::from("x").to_json(), json!("x"));
        assert_eq!(ParamValue::from(3i64).to_json(), json!(3));
        assert_eq!(ParamValue::from(true).to_json(), json!(true));
    }

    #[test]
    fn key_value_converts_to_object() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), "1".to_string());
        assert_eq!(ParamValue::KeyValue(m).to_json(), json!({"a": "1"}));
    }

    #[test]
    fn date_serializes_as_rfc3339() {
        let d = DateTime::parse_from_rfc3339("2021-03-04T05:06:07+02:00").unwrap();
        assert_eq!(
            ParamValue::Date(d).to_json(),
            json!("2021-03-04T05:06:07+02:00")
        );
    }

    #[test]
    fn decode_into_native_types() {
        let v = ParamValue::from(vec!["a", "b"]);
        let decoded: Vec<String> = v.decode().unwrap();
        assert_eq!(decoded, vec!["a", "b"]);

        let n: u16 = ParamValue::from(8080i64).decode().unwrap();
        assert_eq!(n, 8080);
    }

    #[test]
    fn decode_type_mismatch_is_binding_error() {
        let err = ParamValue::from("nope").decode::<i64>().unwrap_err();
        assert!(matches!(err, StrataError::Binding(_)));
    }

    #[test]
    fn float_accessor_widens_integers() {
        assert_eq!(ParamValue::Integer(2).as_f64(), Some(2.0));
        assert_eq!(ParamValue::from("2").as_f64(), None);
    }

    #[test]
    fn file_type_from_extension() {
        assert_eq!(FileType::from_extension("YML"), FileType::Yaml);
        assert_eq!(FileType::from_extension("tsv"), FileType::Tsv);
        assert_eq!(FileType::from_extension("md"), FileType::Text);
    }
}
