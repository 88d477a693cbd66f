//! Framework-free CLI capability.
//!
//! The core never parses a command line itself. A CLI adapter implements
//! [`CliRegistrar`] to receive flag and argument declarations and
//! [`CliMatches`] to hand back what the user typed; sections translate
//! between those and their definitions. The clap adapter lives in
//! `clap_cli` behind the `clap` feature, and [`StaticMatches`] is a plain
//! in-memory implementation for callers that parse arguments another way.

use std::collections::BTreeMap;

use crate::definition::{Definition, render_value};
use crate::error::StrataError;
use crate::types::ParameterType;

/// A flag declaration derived from a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    /// Long flag name, also the id used to read matches back.
    pub long: String,
    pub short: Option<char>,
    pub help: String,
    pub param_type: ParameterType,
    pub choices: Vec<String>,
    /// Rendered default for help output; secrets are masked.
    pub default_display: Option<String>,
    pub required: bool,
}

impl FlagSpec {
    /// `prefix + name` with `_` → `-`; the short alias only without prefix.
    pub fn from_definition(def: &Definition, prefix: &str) -> Self {
        let default_display = def.default.as_ref().map(|v| match def.param_type {
            ParameterType::Secret => "***".to_string(),
            _ => render_value(v),
        });
        FlagSpec {
            long: def.flag_name(prefix),
            short: if prefix.is_empty() { def.short_flag } else { None },
            help: def.help.clone(),
            param_type: def.param_type,
            choices: def.choices.clone(),
            default_display,
            required: def.required,
        }
    }

    /// Whether the flag may be given several times / comma-separated.
    pub fn takes_many(&self) -> bool {
        self.param_type.is_list()
    }
}

/// A positional argument declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    pub help: String,
    pub param_type: ParameterType,
    pub required: bool,
}

impl ArgumentSpec {
    pub fn from_definition(def: &Definition) -> Self {
        ArgumentSpec {
            name: def.name.clone(),
            help: def.help.clone(),
            param_type: def.param_type,
            required: def.required,
        }
    }
}

/// Receives flag and argument declarations.
pub trait CliRegistrar {
    fn add_flag(&mut self, spec: FlagSpec) -> Result<(), StrataError>;
    fn add_argument(&mut self, spec: ArgumentSpec) -> Result<(), StrataError>;
}

/// Reads back a parsed command line.
pub trait CliMatches {
    /// Raw string values of the flag, `None` when it has none.
    fn flag_values(&self, long: &str) -> Option<Vec<String>>;
    /// Whether the user explicitly supplied the flag.
    fn flag_provided(&self, long: &str) -> bool;
    /// All positional tokens, in order.
    fn positional_args(&self) -> Vec<String>;
}

/// An already-parsed command line held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticMatches {
    flags: BTreeMap<String, Vec<String>>,
    args: Vec<String>,
}

impl StaticMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag<I, S>(mut self, long: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags
            .entry(long.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl CliMatches for StaticMatches {
    fn flag_values(&self, long: &str) -> Option<Vec<String>> {
        self.flags.get(long).cloned()
    }

    fn flag_provided(&self, long: &str) -> bool {
        self.flags.contains_key(long)
    }

    fn positional_args(&self) -> Vec<String> {
        self.args.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_spec_applies_prefix_and_drops_short() {
        let def = Definition::new("max_items", ParameterType::Int).with_short('m');
        let plain = FlagSpec::from_definition(&def, "");
        assert_eq!(plain.long, "max-items");
        assert_eq!(plain.short, Some('m'));

        let prefixed = FlagSpec::from_definition(&def, "db-");
        assert_eq!(prefixed.long, "db-max-items");
        assert_eq!(prefixed.short, None);
    }

    #[test]
    fn secret_default_is_masked() {
        let def = Definition::new("token", ParameterType::Secret).with_default("hunter2");
        let spec = FlagSpec::from_definition(&def, "");
        assert_eq!(spec.default_display.as_deref(), Some("***"));
    }

    #[test]
    fn list_default_renders_joined() {
        let def = Definition::new("tags", ParameterType::StringList).with_default(vec!["a", "b"]);
        let spec = FlagSpec::from_definition(&def, "");
        assert_eq!(spec.default_display.as_deref(), Some("a,b"));
        assert!(spec.takes_many());
    }

    #[test]
    fn static_matches_reports_provided_flags() {
        let m = StaticMatches::new().flag("name", ["x"]).args(["1", "2"]);
        assert!(m.flag_provided("name"));
        assert!(!m.flag_provided("other"));
        assert_eq!(m.flag_values("name"), Some(vec!["x".to_string()]));
        assert_eq!(m.positional_args(), vec!["1", "2"]);
    }
}
