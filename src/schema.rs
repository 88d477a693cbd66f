//! Ordered, slug-keyed collection of sections.

use crate::cli::CliRegistrar;
use crate::definitions::Definitions;
use crate::error::StrataError;
use crate::ordered::OrderedMap;
use crate::section::Section;

/// Slug of the section holding command-local flags and positional arguments.
pub const DEFAULT_SLUG: &str = "default";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    sections: OrderedMap<Section>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from sections, rejecting duplicate slugs.
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Result<Self, StrataError> {
        let mut schema = Schema::new();
        for section in sections {
            schema.add(section)?;
        }
        Ok(schema)
    }

    /// Append a section. Slugs are unique within a schema.
    pub fn add(&mut self, section: Section) -> Result<(), StrataError> {
        if self.sections.contains_key(section.slug()) {
            return Err(StrataError::Schema(format!(
                "duplicate section slug '{}'",
                section.slug()
            )));
        }
        self.sections.insert(section.slug().to_string(), section);
        Ok(())
    }

    /// Insert or replace the section with the same slug.
    pub fn set(&mut self, section: Section) {
        self.sections.insert(section.slug().to_string(), section);
    }

    pub fn get(&self, slug: &str) -> Option<&Section> {
        self.sections.get(slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut Section> {
        self.sections.get_mut(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.sections.contains_key(slug)
    }

    pub fn remove(&mut self, slug: &str) -> Option<Section> {
        self.sections.remove(slug)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.sections.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn as_list(&self) -> Vec<&Section> {
        self.iter().collect()
    }

    pub fn default_section(&self) -> Option<&Section> {
        self.get(DEFAULT_SLUG)
    }

    /// A schema holding only the listed sections, in this schema's order.
    /// Unknown slugs are ignored.
    pub fn subset(&self, slugs: &[&str]) -> Schema {
        let mut subset = self.clone();
        subset.retain(|s| slugs.contains(&s.slug()));
        subset
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Section) -> bool) {
        self.sections.retain(|_, s| keep(s));
    }

    /// Merge `other` in: new slugs are appended, existing sections take the
    /// other side's definitions on top of their own.
    pub fn merge(&mut self, other: &Schema) {
        for section in other.iter() {
            match self.sections.get_mut(section.slug()) {
                Some(existing) => existing.merge_definitions(section.definitions()),
                None => {
                    self.sections
                        .insert(section.slug().to_string(), section.clone());
                }
            }
        }
    }

    /// Every definition renamed to its external name (`prefix + name`).
    /// Later sections win on clashes; see `validate::check_schema` for
    /// detecting them.
    pub fn get_all_definitions(&self) -> Definitions {
        self.iter()
            .flat_map(|section| {
                section.definitions().iter().map(move |def| {
                    let mut renamed = def.clone();
                    renamed.name = format!("{}{}", section.prefix(), def.name);
                    renamed
                })
            })
            .collect()
    }

    /// Register every section with a CLI adapter.
    pub fn add_to_cli(&self, cli: &mut dyn CliRegistrar) -> Result<(), StrataError> {
        for section in self.iter() {
            section.add_to_cli(cli)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;
    use crate::types::ParameterType;

    fn section(slug: &str, prefix: &str, names: &[&str]) -> Section {
        Section::builder(slug, slug)
            .with_prefix(prefix)
            .with_fields(
                names
                    .iter()
                    .map(|n| Definition::new(*n, ParameterType::String)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_slug_rejected() {
        let err = Schema::from_sections([section("a", "", &["x"]), section("a", "", &["y"])])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate section slug 'a'"));
    }

    #[test]
    fn subset_keeps_schema_order() {
        let schema = Schema::from_sections([
            section("a", "", &["x"]),
            section("b", "", &["y"]),
            section("c", "", &["z"]),
        ])
        .unwrap();
        let subset = schema.subset(&["c", "a", "missing"]);
        assert_eq!(subset.slugs().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn merge_appends_and_extends() {
        let mut left = Schema::from_sections([section("a", "", &["x"])]).unwrap();
        let right =
            Schema::from_sections([section("a", "", &["y"]), section("b", "", &["z"])]).unwrap();
        left.merge(&right);
        assert_eq!(left.slugs().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            left.get("a").unwrap().definitions().names().collect::<Vec<_>>(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn all_definitions_use_prefixed_names() {
        let schema = Schema::from_sections([
            section("default", "", &["verbose"]),
            section("db", "db-", &["host"]),
        ])
        .unwrap();
        let all = schema.get_all_definitions();
        assert_eq!(all.names().collect::<Vec<_>>(), vec!["verbose", "db-host"]);
    }

    #[test]
    fn clone_is_deep() {
        let schema = Schema::from_sections([section("a", "", &["x", "y"])]).unwrap();
        let mut copy = schema.clone();
        let narrowed = copy.get("a").unwrap().whitelist(&["x"]);
        copy.set(narrowed);
        assert_eq!(schema.get("a").unwrap().definitions().len(), 2);
        assert_eq!(copy.get("a").unwrap().definitions().len(), 1);
    }
}
