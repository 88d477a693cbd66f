//! Source composition.
//!
//! A [`Source`] receives the schema, the accumulating values, and a [`Next`]
//! handle to the rest of the chain. Sources listed first are outermost: one
//! that runs `next` before contributing overrides everything after it, one
//! that contributes first is overridden by them. The first error stops the
//! chain and is returned unchanged.

use tracing::{debug, trace};

use crate::error::StrataError;
use crate::parsed::Values;
use crate::schema::Schema;

pub trait Source {
    fn apply(&self, schema: &Schema, values: &mut Values, next: Next<'_>)
    -> Result<(), StrataError>;

    /// Short label used in log events.
    fn label(&self) -> &str {
        "source"
    }
}

/// The not-yet-run remainder of a chain.
pub struct Next<'a> {
    rest: &'a [Box<dyn Source + 'a>],
}

impl<'a> Next<'a> {
    /// Run the remaining sources against `schema`, which may be a narrowed
    /// copy of the one this source received.
    pub fn run(self, schema: &Schema, values: &mut Values) -> Result<(), StrataError> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                trace!(event = "strata.chain.source_entered", source = head.label());
                head.apply(schema, values, Next { rest: tail })
            }
            None => Ok(()),
        }
    }
}

/// Run `sources` against a private copy of `schema`, accumulating into
/// `values`.
pub fn execute<'a>(
    schema: &Schema,
    values: &mut Values,
    sources: &'a [Box<dyn Source + 'a>],
) -> Result<(), StrataError> {
    let schema = schema.clone();
    debug!(
        event = "strata.chain.started",
        sources = sources.len(),
        sections = schema.len()
    );
    let result = Next { rest: sources }.run(&schema, values);
    match &result {
        Ok(()) => debug!(event = "strata.chain.completed"),
        Err(e) => debug!(event = "strata.chain.failed", error = %e),
    }
    result
}

/// An owned list of sources, built fluently.
#[derive(Default)]
pub struct Chain<'a> {
    sources: Vec<Box<dyn Source + 'a>>,
}

impl<'a> Chain<'a> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Append a source; it runs inside every source added before it.
    pub fn with(mut self, source: impl Source + 'a) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: impl Source + 'a) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[Box<dyn Source + 'a>] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<Box<dyn Source + 'a>> {
        self.sources
    }

    pub fn execute(&self, schema: &Schema, values: &mut Values) -> Result<(), StrataError> {
        execute(schema, values, &self.sources)
    }
}
