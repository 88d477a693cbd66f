//! Declarative parameter layers and composable source pipelines for command
//! line tools.
//!
//! Strata describes a program's configurable parameters once, as typed
//! [`Definition`]s grouped into named [`Section`]s of a [`Schema`], then
//! fills them from any mix of sources: defaults, config files, environment
//! variables, profiles, command-line flags and positional arguments, or
//! plain maps. Every value remembers where it came from.
//!
//! ```ignore
//! let schema = Schema::from_sections([
//!     Section::builder("db", "Database")
//!         .with_prefix("db-")
//!         .with_fields([
//!             Definition::new("host", ParameterType::String).with_default("localhost"),
//!             Definition::new("port", ParameterType::Int).with_default(5432i64),
//!         ])
//!         .build()?,
//! ])?;
//!
//! let values = Strata::builder().app_name("myapp").load(&schema)?;
//! let db: DbConfig = values.decode_section("db")?;
//! ```
//!
//! # Parameters
//!
//! A [`Definition`] names a parameter, gives it a [`ParameterType`] (strings,
//! numbers, dates, choices, lists, key/value maps, and kinds that load their
//! value from a file), and optionally a default, a help text, a short flag,
//! and whether it is required. Inputs are coerced to the declared kind and
//! checked before they are recorded, so a [`ParsedParameter`] always holds a
//! valid [`ParamValue`].
//!
//! A [`Section`] groups definitions under a slug. Its optional prefix is
//! prepended to every parameter's external name: the `port` parameter of a
//! section with prefix `db-` is the `--db-port` flag and the `APP_DB_PORT`
//! environment variable, but is stored and bound as `port`.
//!
//! # Sources and chains
//!
//! A [`Source`] contributes values and decides whether it runs before or
//! after the rest of the chain. [`Chain`] lists sources from highest to
//! lowest precedence:
//!
//! ```ignore
//! Chain::new()
//!     .with(FromEnv::new("APP"))
//!     .with(FromFile::new("config.yaml"))
//!     .with(Defaults::new())
//!     .execute(&schema, &mut values)?;
//! ```
//!
//! The standard sources live in [`sources`]. Each records its own tag
//! (`defaults`, `file:<path>`, `env`, `flags`, `args`, `map`, `merge`,
//! `custom`) and the identifier it read from (file path, env key, flag, map
//! key) on every step, which [`inspect::describe`] renders.
//!
//! # Pipeline builder
//!
//! [`Strata::builder`] wires the usual layering in one place:
//!
//! ```text
//! Defaults              Definition::with_default
//!        ↑ overridden by
//! Profile               profiles.yaml, selected by name
//!        ↑ overridden by
//! Config files          search paths in order, later paths win
//!        ↑ overridden by
//! Environment vars      PREFIX_[SECTION_PREFIX]NAME
//!        ↑ overridden by
//! Positional args, flags
//!        ↑ overridden by
//! Overrides             set_override / overrides_from
//! ```
//!
//! followed by a check that every required parameter has a value.
//!
//! # Config files and mappers
//!
//! Config files are YAML, JSON, or TOML. By default their top-level keys
//! are section slugs. A [`ConfigMapper`] reshapes arbitrary documents
//! instead; [`PatternMapper`] does so from declarative rules such as
//! `app.{env}.api_key → demo.{env}-api-key`.
//!
//! # Command-line integration
//!
//! The [`cli`] module describes flags and arguments without tying them to a
//! parser. With the `clap` feature (on by default), [`ClapCli`] registers
//! sections on a `clap::Command` and `clap::ArgMatches` feeds the
//! [`FromCli`](sources::FromCli) and [`FromArgs`](sources::FromArgs)
//! sources.
//!
//! # Errors
//!
//! Every fallible operation returns [`StrataError`]. [`StrataError::kind`]
//! gives a coarse [`ErrorKind`] for callers that branch on the category.

pub mod chain;
pub mod cli;
#[cfg(feature = "clap")]
pub mod clap_cli;
pub mod date;
pub mod definition;
pub mod definitions;
pub mod discovery;
pub mod error;
pub mod inspect;
pub mod mapper;
pub mod ordered;
pub mod overrides;
pub mod parsed;
pub mod reader;
pub mod schema;
pub mod section;
pub mod sources;
pub mod types;
pub mod validate;
pub mod value;

mod binding;
mod builder;

#[cfg(test)]
mod fixtures;

pub use builder::{PipelineBuilder, Strata};
pub use chain::{Chain, Next, Source};
pub use cli::{ArgumentSpec, CliMatches, CliRegistrar, FlagSpec, StaticMatches};
#[cfg(feature = "clap")]
pub use clap_cli::ClapCli;
pub use definition::Definition;
pub use definitions::Definitions;
pub use discovery::{Boundary, SearchMode, SearchPath};
pub use error::{ErrorKind, MapperError, StrataError};
pub use mapper::{ConfigMapper, MappingRule, PatternMapper};
pub use parsed::{ParseStep, ParsedParameter, SectionValues, StepOptions, Values};
pub use schema::Schema;
pub use section::Section;
pub use types::ParameterType;
pub use value::{FileData, ParamValue};
