use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::Values;
use crate::schema::Schema;

/// Runs the inner chain, then fails for the first required parameter that
/// still has no value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckRequired;

pub fn check_required() -> CheckRequired {
    CheckRequired
}

impl Source for CheckRequired {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        for section in schema.iter() {
            for def in section.definitions().iter().filter(|d| d.required) {
                if values.get_value(section.slug(), &def.name).is_none() {
                    return Err(StrataError::Required {
                        parameter: def.flag_name(section.prefix()),
                    });
                }
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "required"
    }
}
