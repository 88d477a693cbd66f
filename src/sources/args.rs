use crate::chain::{Next, Source};
use crate::cli::CliMatches;
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::schema::{DEFAULT_SLUG, Schema};

use super::ARGS;

/// Positional arguments, resolved against the argument definitions of the
/// `default` section.
///
/// Provided arguments override the inner chain. Argument defaults only fill
/// parameters nothing else has set.
#[derive(Debug, Clone)]
pub struct FromArgs {
    args: Vec<String>,
    ignore_required: bool,
    options: StepOptions,
}

impl FromArgs {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ignore_required: false,
            options: StepOptions::new(),
        }
    }

    pub fn from_matches(matches: &dyn CliMatches) -> Self {
        Self::new(matches.positional_args())
    }

    /// Skip the missing-required-argument check (used when a later check,
    /// or a help/version exit, makes it premature).
    pub fn ignore_required(mut self, ignore: bool) -> Self {
        self.ignore_required = ignore;
        self
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }
}

impl Source for FromArgs {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        let Some(section) = schema.default_section() else {
            if self.args.is_empty() {
                return Ok(());
            }
            return Err(StrataError::TooManyArguments {
                extra: self.args.clone(),
            });
        };
        let options = self
            .options
            .over(&StepOptions::source(ARGS))
            .over(&section.step_options());
        let parsed = section
            .definitions()
            .parse_arguments(&self.args, self.ignore_required, &options)?;
        let target = values.get_or_create(DEFAULT_SLUG);
        target.merge(parsed.provided);
        target.merge_as_default(parsed.defaulted);
        Ok(())
    }

    fn label(&self) -> &str {
        ARGS
    }
}
