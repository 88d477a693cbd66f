//! Value-plane operators: they run the inner chain, then splice in values
//! parsed elsewhere.

use tracing::trace;

use crate::chain::{Next, Source};
use crate::error::StrataError;
use crate::parsed::{SectionValues, StepOptions, Values};
use crate::schema::Schema;

use super::MERGE;

/// Copy of the `slugs` sections of `values` (all of them when `None`), each
/// parameter carrying a trailing `merge` step.
fn tagged_for_merge(values: &Values, slugs: Option<&[String]>) -> Values {
    let options = StepOptions::source(MERGE);
    let mut out = Values::new();
    for (slug, section) in values.iter() {
        if slugs.is_some_and(|wanted| !wanted.iter().any(|s| s == slug)) {
            continue;
        }
        let mut section = section.clone();
        section.record_all(&options);
        trace!(event = "strata.merge.section", section = slug, parameters = section.len());
        out.replace(slug, section);
    }
    out
}

/// Replace one section's values wholesale.
#[derive(Debug, Clone)]
pub struct Replace {
    slug: String,
    values: SectionValues,
}

impl Replace {
    pub fn new(slug: impl Into<String>, values: SectionValues) -> Self {
        Self {
            slug: slug.into(),
            values,
        }
    }
}

impl Source for Replace {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        values.replace(self.slug.clone(), self.values.clone());
        Ok(())
    }

    fn label(&self) -> &str {
        "replace"
    }
}

/// Replace every section with `values`.
#[derive(Debug, Clone)]
pub struct ReplaceAll {
    values: Values,
}

impl ReplaceAll {
    pub fn new(values: Values) -> Self {
        Self { values }
    }
}

impl Source for ReplaceAll {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        *values = self.values.clone();
        Ok(())
    }

    fn label(&self) -> &str {
        "replace"
    }
}

/// Replace the listed sections with their counterparts in `values`.
/// Slugs absent from `values` are left alone.
#[derive(Debug, Clone)]
pub struct ReplaceSelective {
    values: Values,
    slugs: Vec<String>,
}

impl ReplaceSelective {
    pub fn new<I, S>(values: Values, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values,
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }
}

impl Source for ReplaceSelective {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        for slug in &self.slugs {
            if let Some(section) = self.values.get(slug) {
                values.replace(slug.clone(), section.clone());
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "replace"
    }
}

/// Merge `values` over the inner chain's result, appending their logs plus
/// a `merge` step per parameter.
#[derive(Debug, Clone)]
pub struct MergeValues {
    values: Values,
}

impl MergeValues {
    pub fn new(values: Values) -> Self {
        Self { values }
    }
}

impl Source for MergeValues {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        values.merge(tagged_for_merge(&self.values, None));
        Ok(())
    }

    fn label(&self) -> &str {
        "merge"
    }
}

/// [`MergeValues`] restricted to the listed sections.
#[derive(Debug, Clone)]
pub struct MergeSelective {
    values: Values,
    slugs: Vec<String>,
}

impl MergeSelective {
    pub fn new<I, S>(values: Values, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values,
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }
}

impl Source for MergeSelective {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        values.merge(tagged_for_merge(&self.values, Some(&self.slugs)));
        Ok(())
    }

    fn label(&self) -> &str {
        "merge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::fixtures::test::{demo_schema, obj};
    use crate::sources::FromMap;
    use crate::value::ParamValue;
    use serde_json::json;

    fn parse(map: serde_json::Value) -> Values {
        let mut values = Values::new();
        Chain::new()
            .with(FromMap::new(obj(map)))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        values
    }

    fn run(source: impl Source) -> Values {
        let mut values = Values::new();
        Chain::new()
            .with(source)
            .with(FromMap::new(obj(
                json!({"demo": {"x": "base", "count": 1}, "db": {"host": "h"}}),
            )))
            .execute(&demo_schema(), &mut values)
            .unwrap();
        values
    }

    #[test]
    fn replace_swaps_one_section() {
        let other = parse(json!({"demo": {"x": "other"}}));
        let values = run(Replace::new("demo", other.get("demo").unwrap().clone()));
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("other")));
        assert!(values.get_value("demo", "count").is_none());
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("h")));
    }

    #[test]
    fn replace_all_discards_inner_values() {
        let values = run(ReplaceAll::new(parse(json!({"demo": {"x": "only"}}))));
        assert!(values.get("db").is_none());
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("only")));
    }

    #[test]
    fn replace_selective_touches_listed_sections() {
        let other = parse(json!({"demo": {"x": "r"}, "db": {"host": "r"}}));
        let values = run(ReplaceSelective::new(other, ["db"]));
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("r")));
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("base")));
    }

    #[test]
    fn merge_appends_logs() {
        let values = run(MergeValues::new(parse(json!({"demo": {"x": "merged"}}))));
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("merged"));
        let sources: Vec<_> = x.log().iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["map", "map", MERGE]);
        assert_eq!(x.winning_source(), Some(MERGE));
        assert_eq!(x.log()[2].value, ParamValue::from("merged"));
        // untouched parameters keep their own log
        let count = values.get_parameter("demo", "count").unwrap();
        assert_eq!(count.value(), &ParamValue::from(1));
        assert_eq!(count.winning_source(), Some("map"));
    }

    #[test]
    fn merge_selective_skips_unlisted_sections() {
        let other = parse(json!({"demo": {"x": "m"}, "db": {"host": "m"}}));
        let values = run(MergeSelective::new(other, ["demo"]));
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("m")));
        assert_eq!(
            values.get_parameter("demo", "x").unwrap().winning_source(),
            Some(MERGE)
        );
        let host = values.get_parameter("db", "host").unwrap();
        assert_eq!(host.value(), &ParamValue::from("h"));
        assert_eq!(host.log().len(), 1);
    }
}
