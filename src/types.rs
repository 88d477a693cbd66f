//! The closed set of parameter kinds and their derived predicates.
//!
//! Every kind has a stable camel-cased wire name (`stringList`,
//! `objectFromFile`, ...) used in layer files and error messages. All value
//! coercion dispatches on [`ParameterType`] in one place, the definition's
//! coercer; the predicates here are pure functions of the tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterType {
    String,
    Secret,
    #[serde(alias = "integer")]
    Int,
    Float,
    Bool,
    Date,
    Choice,
    StringList,
    #[serde(alias = "integerList")]
    IntList,
    FloatList,
    ChoiceList,
    KeyValue,
    StringFromFile,
    StringFromFiles,
    StringListFromFile,
    StringListFromFiles,
    ObjectFromFile,
    ObjectListFromFile,
    ObjectListFromFiles,
    File,
    FileList,
}

impl ParameterType {
    pub const ALL: [ParameterType; 21] = [
        ParameterType::String,
        ParameterType::Secret,
        ParameterType::Int,
        ParameterType::Float,
        ParameterType::Bool,
        ParameterType::Date,
        ParameterType::Choice,
        ParameterType::StringList,
        ParameterType::IntList,
        ParameterType::FloatList,
        ParameterType::ChoiceList,
        ParameterType::KeyValue,
        ParameterType::StringFromFile,
        ParameterType::StringFromFiles,
        ParameterType::StringListFromFile,
        ParameterType::StringListFromFiles,
        ParameterType::ObjectFromFile,
        ParameterType::ObjectListFromFile,
        ParameterType::ObjectListFromFiles,
        ParameterType::File,
        ParameterType::FileList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Secret => "secret",
            ParameterType::Int => "int",
            ParameterType::Float => "float",
            ParameterType::Bool => "bool",
            ParameterType::Date => "date",
            ParameterType::Choice => "choice",
            ParameterType::StringList => "stringList",
            ParameterType::IntList => "intList",
            ParameterType::FloatList => "floatList",
            ParameterType::ChoiceList => "choiceList",
            ParameterType::KeyValue => "keyValue",
            ParameterType::StringFromFile => "stringFromFile",
            ParameterType::StringFromFiles => "stringFromFiles",
            ParameterType::StringListFromFile => "stringListFromFile",
            ParameterType::StringListFromFiles => "stringListFromFiles",
            ParameterType::ObjectFromFile => "objectFromFile",
            ParameterType::ObjectListFromFile => "objectListFromFile",
            ParameterType::ObjectListFromFiles => "objectListFromFiles",
            ParameterType::File => "file",
            ParameterType::FileList => "fileList",
        }
    }

    /// Kinds that consume every remaining CLI token (and comma-split a single
    /// token) instead of exactly one.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ParameterType::StringList
                | ParameterType::IntList
                | ParameterType::FloatList
                | ParameterType::ChoiceList
                | ParameterType::KeyValue
                | ParameterType::StringFromFiles
                | ParameterType::StringListFromFile
                | ParameterType::StringListFromFiles
                | ParameterType::ObjectListFromFile
                | ParameterType::ObjectListFromFiles
                | ParameterType::FileList
        )
    }

    /// Kinds whose parsed value is a structured document (object or list of
    /// objects).
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            ParameterType::ObjectFromFile
                | ParameterType::ObjectListFromFile
                | ParameterType::ObjectListFromFiles
        )
    }

    pub fn is_key_value(&self) -> bool {
        matches!(self, ParameterType::KeyValue)
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, ParameterType::Choice | ParameterType::ChoiceList)
    }

    /// Whether `raw` names a file to load for this kind. `keyValue` loads a
    /// file only when the value starts with `@`.
    pub fn is_file_loading(&self, raw: &str) -> bool {
        match self {
            ParameterType::KeyValue => raw.starts_with('@'),
            other => other.always_loads_file(),
        }
    }

    /// File-loading kinds for which every value is a path.
    pub fn always_loads_file(&self) -> bool {
        matches!(
            self,
            ParameterType::StringFromFile
                | ParameterType::StringFromFiles
                | ParameterType::StringListFromFile
                | ParameterType::StringListFromFiles
                | ParameterType::ObjectFromFile
                | ParameterType::ObjectListFromFile
                | ParameterType::ObjectListFromFiles
                | ParameterType::File
                | ParameterType::FileList
        )
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = match s {
            "integer" => "int",
            "integerList" => "intList",
            other => other,
        };
        ParameterType::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| StrataError::Schema(format!("unknown parameter type '{s}'")))
    }
}
