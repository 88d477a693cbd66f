use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`StrataError`], for callers that branch on
/// the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Schema,
    Parse,
    Required,
    Mapper,
    Configuration,
    Io,
}

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("Invalid value for '{parameter}': {reason}")]
    Validation { parameter: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Could not parse '{parameter}': {reason}")]
    Parse { parameter: String, reason: String },

    #[error("Parameter '{parameter}' is required")]
    Required { parameter: String },

    #[error("Too many arguments: unexpected {}", .extra.join(" "))]
    TooManyArguments { extra: Vec<String> },

    #[error("Could not parse date '{input}'")]
    InvalidDate { input: String },

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown key '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown keys in config file: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    UnknownKeys(Vec<StrataError>),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Struct binding failed: {0}")]
    Binding(String),
}

impl StrataError {
    pub(crate) fn validation(parameter: &str, reason: impl Into<String>) -> Self {
        StrataError::Validation {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(parameter: &str, reason: impl Into<String>) -> Self {
        StrataError::Parse {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StrataError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Validation { .. } | StrataError::InvalidDate { .. } => {
                ErrorKind::Validation
            }
            StrataError::Schema(_)
            | StrataError::UnknownKey { .. }
            | StrataError::UnknownKeys(_) => ErrorKind::Schema,
            StrataError::Parse { .. }
            | StrataError::TooManyArguments { .. }
            | StrataError::Decode { .. }
            | StrataError::Binding(_) => ErrorKind::Parse,
            StrataError::Required { .. } => ErrorKind::Required,
            StrataError::Mapper(_) => ErrorKind::Mapper,
            StrataError::Configuration(_) => ErrorKind::Configuration,
            StrataError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Failures raised while compiling or evaluating pattern mapping rules.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Rule '{pattern}' references unknown capture '{{{capture}}}' in target '{target}'")]
    UnknownCapture {
        pattern: String,
        capture: String,
        target: String,
    },

    #[error("Rule '{pattern}' has no target layer")]
    MissingTargetLayer { pattern: String },

    #[error("Rule '{pattern}' has no target parameter")]
    MissingTargetParameter { pattern: String },

    #[error("Rule '{pattern}' targets unknown layer '{layer}'")]
    UnknownLayer { pattern: String, layer: String },

    #[error(
        "Rule '{pattern}' targets unknown parameter '{parameter}' in layer '{layer}' (checked as '{resolved}')"
    )]
    UnknownParameter {
        pattern: String,
        layer: String,
        parameter: String,
        resolved: String,
    },

    #[error("Pattern '{pattern}' matched multiple distinct values for '{layer}.{parameter}'")]
    MultipleDistinctValues {
        pattern: String,
        layer: String,
        parameter: String,
    },

    #[error(
        "Value collision for '{layer}.{parameter}': rules '{first}' and '{second}' produce different values"
    )]
    Collision {
        layer: String,
        parameter: String,
        first: String,
        second: String,
    },

    #[error(
        "Required pattern '{pattern}' did not match (nearest existing path: '{nearest}', missing segment: '{missing}')"
    )]
    RequiredMissing {
        pattern: String,
        nearest: String,
        missing: String,
    },

    #[error("Invalid mapping document: {0}")]
    InvalidDocument(String),
}
