//! Schema-plane operators: restrict which sections and parameters the
//! sources they govern can see.

use std::collections::BTreeMap;

use tracing::debug;

use crate::chain::{self, Chain, Next, Source};
use crate::error::StrataError;
use crate::parsed::Values;
use crate::schema::Schema;

/// A restriction of a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaFilter {
    WhitelistSections(Vec<String>),
    BlacklistSections(Vec<String>),
    /// Per listed section, keep only the named parameters. Unlisted
    /// sections are untouched.
    WhitelistParameters(BTreeMap<String, Vec<String>>),
    /// Per listed section, drop the named parameters.
    BlacklistParameters(BTreeMap<String, Vec<String>>),
}

fn strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

impl SchemaFilter {
    /// A narrowed copy of `schema`.
    pub fn restrict(&self, schema: &Schema) -> Schema {
        let mut narrowed = schema.clone();
        match self {
            SchemaFilter::WhitelistSections(slugs) => {
                narrowed.retain(|s| slugs.iter().any(|slug| slug == s.slug()));
            }
            SchemaFilter::BlacklistSections(slugs) => {
                narrowed.retain(|s| !slugs.iter().any(|slug| slug == s.slug()));
            }
            SchemaFilter::WhitelistParameters(per_section) => {
                for (slug, names) in per_section {
                    if let Some(section) = schema.get(slug) {
                        narrowed.set(section.whitelist(&strs(names)));
                    }
                }
            }
            SchemaFilter::BlacklistParameters(per_section) => {
                for (slug, names) in per_section {
                    if let Some(section) = schema.get(slug) {
                        narrowed.set(section.blacklist(&strs(names)));
                    }
                }
            }
        }
        narrowed
    }
}

/// Applies a [`SchemaFilter`] either to the rest of the chain, or, with
/// [`Filter::wrapping`], to a sub-chain of its own while the rest of the
/// chain keeps the full schema.
pub struct Filter<'a> {
    filter: SchemaFilter,
    inner: Option<Chain<'a>>,
}

impl<'a> Filter<'a> {
    pub fn new(filter: SchemaFilter) -> Self {
        Self {
            filter,
            inner: None,
        }
    }

    pub fn whitelist_sections<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SchemaFilter::WhitelistSections(
            slugs.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn blacklist_sections<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SchemaFilter::BlacklistSections(
            slugs.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn whitelist_parameters(per_section: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(SchemaFilter::WhitelistParameters(per_section))
    }

    pub fn blacklist_parameters(per_section: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(SchemaFilter::BlacklistParameters(per_section))
    }

    /// Run `inner` on the restricted schema after the rest of the chain,
    /// instead of restricting the rest of the chain.
    pub fn wrapping(mut self, inner: Chain<'a>) -> Self {
        self.inner = Some(inner);
        self
    }
}

impl Source for Filter<'_> {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        let narrowed = self.filter.restrict(schema);
        debug!(
            event = "strata.filter.applied",
            sections = narrowed.len(),
            wrapped = self.inner.is_some()
        );
        match &self.inner {
            None => next.run(&narrowed, values),
            Some(inner) => {
                next.run(schema, values)?;
                chain::execute(&narrowed, values, inner.sources())
            }
        }
    }

    fn label(&self) -> &str {
        "filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{demo_schema, obj};
    use crate::sources::{Defaults, FromMap};
    use crate::value::ParamValue;
    use serde_json::json;

    fn all() -> FromMap {
        FromMap::new(obj(json!({
            "demo": {"x": "a", "count": 2},
            "db": {"host": "b", "port": 1}
        })))
    }

    fn run(chain: Chain<'_>) -> Values {
        let mut values = Values::new();
        chain.execute(&demo_schema(), &mut values).unwrap();
        values
    }

    #[test]
    fn whitelisted_sections_restrict_the_rest() {
        let values = run(Chain::new()
            .with(Filter::whitelist_sections(["db"]))
            .with(all()));
        assert!(values.get_value("demo", "x").is_none());
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("b")));
    }

    #[test]
    fn blacklisted_sections_are_hidden() {
        let values = run(Chain::new()
            .with(Filter::blacklist_sections(["db"]))
            .with(all()));
        assert!(values.get("db").is_none());
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("a")));
    }

    #[test]
    fn parameter_lists_apply_per_section() {
        let keep = BTreeMap::from([("demo".to_string(), vec!["x".to_string()])]);
        let values = run(Chain::new()
            .with(Filter::whitelist_parameters(keep))
            .with(all()));
        assert!(values.get_value("demo", "count").is_none());
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("a")));
        assert_eq!(values.get_value("db", "port"), Some(&ParamValue::from(1)));

        let drop = BTreeMap::from([("db".to_string(), vec!["port".to_string()])]);
        let values = run(Chain::new()
            .with(Filter::blacklist_parameters(drop))
            .with(all()));
        assert!(values.get_value("db", "port").is_none());
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("b")));
    }

    #[test]
    fn wrapped_sub_chain_sees_the_restriction_only() {
        let values = run(Chain::new()
            .with(Filter::whitelist_sections(["demo"]).wrapping(Chain::new().with(Defaults::new())))
            .with(FromMap::new(obj(json!({"db": {"host": "outer"}})))));
        assert_eq!(values.get_value("demo", "count"), Some(&ParamValue::from(3)));
        assert!(values.get_value("db", "port").is_none());
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("outer")));
    }

    #[test]
    fn caller_schema_is_not_modified() {
        let schema = demo_schema();
        let mut values = Values::new();
        Chain::new()
            .with(Filter::blacklist_sections(["demo", "db"]))
            .with(all())
            .execute(&schema, &mut values)
            .unwrap();
        assert_eq!(schema, demo_schema());
        assert!(values.is_empty());
    }
}
