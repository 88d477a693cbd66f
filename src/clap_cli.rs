//! Clap adapter for the CLI capability.
//!
//! [`ClapCli`] collects flag and argument declarations from sections into a
//! `clap::Command`; `ArgMatches` implements [`CliMatches`] so the parsed
//! result can be fed back to the `FromCli` and `FromArgs` sources.
//!
//! Flags are registered without clap-side defaults, so "was it provided"
//! is answered by clap's value source and defaults stay the business of the
//! `Defaults` source. All positional tokens land in one trailing argument and
//! are resolved by the section's argument definitions.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::cli::{ArgumentSpec, CliMatches, CliRegistrar, FlagSpec};
use crate::error::StrataError;
use crate::types::ParameterType;

/// Id of the catch-all positional argument.
pub const POSITIONAL_ID: &str = "strata_positional";

pub struct ClapCli {
    command: Command,
    arguments: Vec<ArgumentSpec>,
}

impl ClapCli {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            arguments: Vec::new(),
        }
    }

    /// Finish the command, adding the positional argument if any was
    /// declared.
    pub fn build(self) -> Command {
        if self.arguments.is_empty() {
            return self.command;
        }
        let value_name = self
            .arguments
            .iter()
            .map(|a| {
                let name = a.name.to_uppercase();
                let name = if a.param_type.is_list() { format!("{name}...") } else { name };
                if a.required { name } else { format!("[{name}]") }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let help = self
            .arguments
            .iter()
            .filter(|a| !a.help.is_empty())
            .map(|a| format!("{}: {}", a.name, a.help))
            .collect::<Vec<_>>()
            .join("; ");
        self.command.arg(
            Arg::new(POSITIONAL_ID)
                .value_name(value_name)
                .help(help)
                .num_args(0..)
                .action(ArgAction::Append)
                .trailing_var_arg(true),
        )
    }

    fn has_arg(&self, id: &str) -> bool {
        self.command.get_arguments().any(|a| a.get_id() == id)
    }

    fn has_short(&self, short: char) -> bool {
        self.command
            .get_arguments()
            .any(|a| a.get_short() == Some(short))
    }
}

fn help_text(spec: &FlagSpec) -> String {
    match &spec.default_display {
        Some(d) if spec.help.is_empty() => format!("[default: {d}]"),
        Some(d) => format!("{} [default: {d}]", spec.help),
        None => spec.help.clone(),
    }
}

impl CliRegistrar for ClapCli {
    fn add_flag(&mut self, spec: FlagSpec) -> Result<(), StrataError> {
        if self.has_arg(&spec.long) {
            return Err(StrataError::Schema(format!(
                "flag '--{}' is registered twice",
                spec.long
            )));
        }
        let mut arg = Arg::new(spec.long.clone())
            .long(spec.long.clone())
            .help(help_text(&spec));
        if let Some(short) = spec.short
            && !self.has_short(short)
        {
            arg = arg.short(short);
        }
        arg = match spec.param_type {
            ParameterType::Bool => arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            ParameterType::KeyValue => arg
                .action(ArgAction::Append)
                .num_args(0..=1)
                .default_missing_value("")
                .value_delimiter(','),
            ParameterType::Choice => arg.value_parser(spec.choices.clone()),
            ParameterType::StringList
            | ParameterType::IntList
            | ParameterType::FloatList
            | ParameterType::ChoiceList => arg.action(ArgAction::Append).value_delimiter(','),
            t if t.is_list() => arg.action(ArgAction::Append),
            _ => arg,
        };
        let command = std::mem::take(&mut self.command);
        self.command = command.arg(arg);
        Ok(())
    }

    fn add_argument(&mut self, spec: ArgumentSpec) -> Result<(), StrataError> {
        if self.arguments.iter().any(|a| a.name == spec.name) {
            return Err(StrataError::Schema(format!(
                "argument '{}' is registered twice",
                spec.name
            )));
        }
        self.arguments.push(spec);
        Ok(())
    }
}

impl CliMatches for ArgMatches {
    fn flag_values(&self, long: &str) -> Option<Vec<String>> {
        let raw = self.try_get_raw(long).ok().flatten()?;
        Some(raw.map(|v| v.to_string_lossy().into_owned()).collect())
    }

    fn flag_provided(&self, long: &str) -> bool {
        matches!(self.try_contains_id(long), Ok(true))
            && self.value_source(long) == Some(ValueSource::CommandLine)
    }

    fn positional_args(&self) -> Vec<String> {
        self.flag_values(POSITIONAL_ID).unwrap_or_default()
    }
}
