//! Extension-driven decoding of file contents.
//!
//! Used by the file-loading parameter kinds (`stringFromFile`,
//! `objectListFromFile`, `file`, `keyValue` with `@path`, ...) and by the
//! config-file sources. `-` as a path means standard input; a document read
//! from stdin (or with an unknown extension) is decoded as YAML, which also
//! accepts JSON.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::StrataError;
use crate::types::ParameterType;
use crate::value::{FileData, FileType, Object, ParamValue};

pub const STDIN_PATH: &str = "-";

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn decode_error(name: &str, reason: impl ToString) -> StrataError {
    StrataError::Decode {
        path: PathBuf::from(name),
        reason: reason.to_string(),
    }
}

/// Read a whole file (or stdin for `-`) into a string.
pub fn read_input(path: &str) -> Result<String, StrataError> {
    read_input_from(path, std::io::stdin())
}

/// [`read_input`] with `stdin` standing in for standard input.
pub fn read_input_from(path: &str, mut stdin: impl Read) -> Result<String, StrataError> {
    if path == STDIN_PATH {
        let mut content = String::new();
        stdin
            .read_to_string(&mut content)
            .map_err(|e| StrataError::io(path, e))?;
        return Ok(content);
    }
    std::fs::read_to_string(path).map_err(|e| StrataError::io(path, e))
}

/// Decode a structured document. The format is picked from `name`'s
/// extension; anything that is not `.json` or `.toml` goes through YAML.
pub fn decode_document(content: &str, name: &str) -> Result<JsonValue, StrataError> {
    match FileType::from_extension(&extension_of(name)) {
        FileType::Json => serde_json::from_str(content).map_err(|e| decode_error(name, e)),
        FileType::Toml => toml::from_str(content).map_err(|e| decode_error(name, e)),
        _ => {
            if content.trim().is_empty() {
                return Ok(JsonValue::Null);
            }
            serde_yaml::from_str(content).map_err(|e| decode_error(name, e))
        }
    }
}

/// Read and decode a config document from disk.
pub fn load_document(path: &Path) -> Result<JsonValue, StrataError> {
    let content = std::fs::read_to_string(path).map_err(|e| StrataError::io(path, e))?;
    debug!(
        event = "strata.reader.document_loaded",
        path = %path.display(),
        bytes = content.len()
    );
    decode_document(&content, &path.to_string_lossy())
}

/// Decode CSV/TSV content with a mandatory header row into one object per
/// data row. Cells stay strings.
pub fn decode_table(content: &str, name: &str) -> Result<Vec<Object>, StrataError> {
    let delimiter = match FileType::from_extension(&extension_of(name)) {
        FileType::Tsv => b'\t',
        _ => b',',
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| decode_error(name, e))?.clone();
    if headers.is_empty() {
        return Err(decode_error(name, "missing header row"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| decode_error(name, e))?;
        let row: Object = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), JsonValue::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn is_tabular(name: &str) -> bool {
    matches!(
        FileType::from_extension(&extension_of(name)),
        FileType::Csv | FileType::Tsv
    )
}

fn is_structured(name: &str) -> bool {
    matches!(
        FileType::from_extension(&extension_of(name)),
        FileType::Json | FileType::Yaml | FileType::Toml
    )
}

/// Render a JSON scalar the way a user would type it. Nested values are
/// rendered as compact JSON.
pub fn json_to_plain_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn expect_object(value: JsonValue, name: &str) -> Result<Object, StrataError> {
    match value {
        JsonValue::Object(o) => Ok(o),
        other => Err(decode_error(
            name,
            format!("expected an object, got {}", json_kind(&other)),
        )),
    }
}

fn expect_object_list(value: JsonValue, name: &str) -> Result<Vec<Object>, StrataError> {
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| expect_object(item, name))
            .collect(),
        JsonValue::Object(o) => Ok(vec![o]),
        JsonValue::Null => Ok(vec![]),
        other => Err(decode_error(
            name,
            format!("expected a list of objects, got {}", json_kind(&other)),
        )),
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Decode `content` (named `name`, used for extension dispatch and error
/// messages) into the value shape required by `kind`.
pub fn parse_content(
    kind: ParameterType,
    content: String,
    name: &str,
) -> Result<ParamValue, StrataError> {
    match kind {
        ParameterType::StringFromFile | ParameterType::StringFromFiles => {
            Ok(ParamValue::String(content))
        }
        ParameterType::StringListFromFile | ParameterType::StringListFromFiles => {
            if is_structured(name) {
                let doc = decode_document(&content, name)?;
                let list: Vec<JsonValue> = match doc {
                    JsonValue::Array(items) => items,
                    JsonValue::Null => vec![],
                    other => {
                        return Err(decode_error(
                            name,
                            format!("expected a list, got {}", json_kind(&other)),
                        ));
                    }
                };
                Ok(ParamValue::StringList(
                    list.iter().map(json_to_plain_string).collect(),
                ))
            } else {
                Ok(ParamValue::StringList(split_lines(&content)))
            }
        }
        ParameterType::ObjectFromFile => {
            if is_tabular(name) {
                let mut rows = decode_table(&content, name)?;
                if rows.len() != 1 {
                    return Err(decode_error(
                        name,
                        format!("expected exactly one data row, found {}", rows.len()),
                    ));
                }
                Ok(ParamValue::Object(rows.remove(0)))
            } else {
                let doc = decode_document(&content, name)?;
                Ok(ParamValue::Object(expect_object(doc, name)?))
            }
        }
        ParameterType::ObjectListFromFile | ParameterType::ObjectListFromFiles => {
            if is_tabular(name) {
                Ok(ParamValue::ObjectList(decode_table(&content, name)?))
            } else {
                let doc = decode_document(&content, name)?;
                Ok(ParamValue::ObjectList(expect_object_list(doc, name)?))
            }
        }
        ParameterType::KeyValue => {
            let map = if is_structured(name) || name == STDIN_PATH {
                let doc = decode_document(&content, name)?;
                expect_object(doc, name)?
                    .iter()
                    .map(|(k, v)| (k.clone(), json_to_plain_string(v)))
                    .collect()
            } else {
                parse_key_value_lines(&content, name)?
            };
            Ok(ParamValue::KeyValue(map))
        }
        ParameterType::File | ParameterType::FileList => {
            Ok(ParamValue::File(file_data_from_content(name, content, None)))
        }
        other => Err(decode_error(
            name,
            format!("parameters of type {other} are not loaded from files"),
        )),
    }
}

fn parse_key_value_lines(
    content: &str,
    name: &str,
) -> Result<BTreeMap<String, String>, StrataError> {
    let mut map = BTreeMap::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| decode_error(name, format!("expected key:value, got '{line}'")))?;
        map.insert(k.to_string(), v.to_string());
    }
    Ok(map)
}

/// Read everything from `reader` and decode it for `kind`.
pub fn parse_from_reader(
    kind: ParameterType,
    mut reader: impl Read,
    name: &str,
) -> Result<ParamValue, StrataError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| StrataError::io(name, e))?;
    parse_content(kind, content, name)
}

/// Load a single path (or stdin) for `kind`.
pub fn parse_from_path(kind: ParameterType, path: &str) -> Result<ParamValue, StrataError> {
    parse_from_input(kind, path, std::io::stdin())
}

fn parse_from_input(
    kind: ParameterType,
    path: &str,
    stdin: impl Read,
) -> Result<ParamValue, StrataError> {
    if matches!(kind, ParameterType::File | ParameterType::FileList) {
        return load_file_data_from(path, stdin).map(ParamValue::File);
    }
    debug!(event = "strata.reader.parameter_file", path, kind = %kind);
    let content = read_input_from(path, stdin)?;
    parse_content(kind, content, path)
}

fn file_data_from_content(
    path: &str,
    content: String,
    metadata: Option<std::fs::Metadata>,
) -> FileData {
    let p = PathBuf::from(path);
    let extension = extension_of(path);
    let file_type = FileType::from_extension(&extension);
    let parsed = match file_type {
        FileType::Json | FileType::Yaml | FileType::Toml => decode_document(&content, path).ok(),
        _ => None,
    };
    let size = metadata
        .as_ref()
        .map(|m| m.len())
        .unwrap_or(content.len() as u64);
    let last_modified = metadata
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);
    FileData {
        real_path: std::fs::canonicalize(&p).unwrap_or_else(|_| p.clone()),
        base_name: p
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: p,
        extension,
        file_type,
        content,
        size,
        last_modified,
        parsed,
    }
}

/// Load a file with its metadata for `file` / `fileList` parameters.
pub fn load_file_data(path: &str) -> Result<FileData, StrataError> {
    load_file_data_from(path, std::io::stdin())
}

fn load_file_data_from(path: &str, stdin: impl Read) -> Result<FileData, StrataError> {
    let content = read_input_from(path, stdin)?;
    let metadata = if path == STDIN_PATH {
        None
    } else {
        Some(std::fs::metadata(path).map_err(|e| StrataError::io(path, e))?)
    };
    Ok(file_data_from_content(path, content, metadata))
}
