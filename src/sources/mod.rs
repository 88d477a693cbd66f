//! Standard sources.
//!
//! Every source here runs the inner chain first and contributes afterwards
//! (so it overrides what inner sources set), except for the `*_first`
//! variants, which contribute before the inner chain runs.

mod args;
mod cli;
mod defaults;
mod env;
mod file;
mod filter;
mod map;
mod ops;
mod profile;
mod required;

use tracing::trace;

pub use args::FromArgs;
pub use cli::FromCli;
pub use defaults::Defaults;
pub use env::{FromEnv, env_key};
pub use file::{FromFile, FromFiles, FromResolvedFiles, load_config_file};
pub use filter::{Filter, SchemaFilter};
pub use map::FromMap;
pub use ops::{MergeSelective, MergeValues, Replace, ReplaceAll, ReplaceSelective};
pub use profile::FromProfile;
pub use required::{CheckRequired, check_required};

use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::reader::json_kind;
use crate::schema::Schema;
use crate::value::Object;

pub const DEFAULTS: &str = "defaults";
pub const FLAGS: &str = "flags";
pub const ARGS: &str = "args";
pub const ENV: &str = "env";
pub const MAP: &str = "map";
pub const MERGE: &str = "merge";
pub const CUSTOM: &str = "custom";

/// Source tag of values read from the config file at `path`.
pub fn file_tag(path: &std::path::Path) -> String {
    format!("file:{}", path.display())
}

/// How a section map is folded into existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeMode {
    Override,
    AsDefault,
}

/// Apply a `slug → name → value` map: every schema section present in `map`
/// is gathered (provided keys only) and merged. Unknown slugs are ignored.
pub(crate) fn apply_section_map(
    schema: &Schema,
    values: &mut Values,
    map: &Object,
    options: &StepOptions,
    mode: MergeMode,
) -> Result<(), StrataError> {
    for section in schema.iter() {
        let entries = match map.get(section.slug()) {
            None | Some(serde_json::Value::Null) => continue,
            Some(serde_json::Value::Object(entries)) => entries,
            Some(other) => {
                return Err(StrataError::validation(
                    section.slug(),
                    format!("expected a map of parameter values, got {}", json_kind(other)),
                ));
            }
        };
        let step = options.over(&section.step_options());
        let gathered = section
            .definitions()
            .gather_from_map(entries, true, &step)?;
        trace!(
            event = "strata.source.section_gathered",
            section = section.slug(),
            parameters = gathered.len(),
            source = step.source.as_deref().unwrap_or_default(),
        );
        if gathered.is_empty() {
            continue;
        }
        let target = values.get_or_create(section.slug());
        match mode {
            MergeMode::Override => target.merge(gathered),
            MergeMode::AsDefault => target.merge_as_default(gathered),
        }
    }
    Ok(())
}

/// A source computing a section map from the schema; recorded as `custom`.
pub struct FnSource<F> {
    f: F,
}

/// Wrap a closure returning `slug → name → value` as a source.
pub fn from_fn<F>(f: F) -> FnSource<F>
where
    F: Fn(&Schema) -> Result<Object, StrataError>,
{
    FnSource { f }
}

impl<F> Source for FnSource<F>
where
    F: Fn(&Schema) -> Result<Object, StrataError>,
{
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        let map = (self.f)(schema)?;
        apply_section_map(
            schema,
            values,
            &map,
            &StepOptions::source(CUSTOM),
            MergeMode::Override,
        )
    }

    fn label(&self) -> &str {
        CUSTOM
    }
}
