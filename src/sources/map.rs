use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::{StepOptions, Values};
use crate::schema::Schema;
use crate::value::Object;

use super::{MAP, MergeMode, apply_section_map};

/// Values from an in-memory `slug → name → value` map.
///
/// By default the map is applied after the inner chain and overrides it.
/// [`FromMap::first`] applies it before the inner chain instead, and
/// [`FromMap::as_default`] only fills parameters that are still unset.
#[derive(Debug, Clone)]
pub struct FromMap {
    map: Object,
    first: bool,
    mode: MergeMode,
    options: StepOptions,
}

impl FromMap {
    pub fn new(map: Object) -> Self {
        Self {
            map,
            first: false,
            mode: MergeMode::Override,
            options: StepOptions::new(),
        }
    }

    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.mode = MergeMode::AsDefault;
        self
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    fn contribute(&self, schema: &Schema, values: &mut Values) -> Result<(), StrataError> {
        let options = self.options.over(&StepOptions::source(MAP));
        apply_section_map(schema, values, &self.map, &options, self.mode)
    }
}

impl Source for FromMap {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        if self.first {
            self.contribute(schema, values)?;
            next.run(schema, values)
        } else {
            next.run(schema, values)?;
            self.contribute(schema, values)
        }
    }

    fn label(&self) -> &str {
        MAP
    }
}
