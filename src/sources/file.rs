use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::chain::{Next, Source};
use crate::cli::CliMatches;
use crate::error::StrataError;
use crate::mapper::ConfigMapper;
use crate::parsed::{StepOptions, Values};
use crate::reader::{self, json_kind};
use crate::schema::Schema;
use crate::validate;
use crate::value::Object;

use super::{MergeMode, apply_section_map, file_tag};

/// Read a config file into a `slug → name → value` map.
///
/// Without a mapper the document must already have that shape (an empty
/// document is an empty map). With `strict`, keys inside known sections
/// that match no definition are reported. Strict checking applies to
/// unmapped documents only; a mapper validates its own targets.
pub fn load_config_file(
    path: &Path,
    schema: &Schema,
    mapper: Option<&dyn ConfigMapper>,
    strict: bool,
) -> Result<Object, StrataError> {
    let name = path.to_string_lossy();
    let content = reader::read_input(&name)?;
    let doc = reader::decode_document(&content, &name)?;
    if let Some(mapper) = mapper {
        return mapper.map(&doc);
    }
    let map = match doc {
        JsonValue::Object(map) => map,
        JsonValue::Null => Object::new(),
        other => {
            return Err(StrataError::Decode {
                path: path.to_path_buf(),
                reason: format!("expected a map of sections, got {}", json_kind(&other)),
            });
        }
    };
    if strict {
        validate::validate_unknown_keys(schema, &map, &content, path)?;
    }
    Ok(map)
}

/// Shared file-reading settings of the file sources.
#[derive(Clone, Default)]
struct FileOptions {
    mapper: Option<Arc<dyn ConfigMapper>>,
    strict: bool,
    options: StepOptions,
}

impl FileOptions {
    /// Apply `paths` in order, so later files override earlier ones.
    fn apply_all(
        &self,
        schema: &Schema,
        values: &mut Values,
        paths: &[PathBuf],
    ) -> Result<(), StrataError> {
        for path in paths {
            let map = load_config_file(path, schema, self.mapper.as_deref(), self.strict)?;
            debug!(
                event = "strata.file.loaded",
                path = %path.display(),
                sections = map.len()
            );
            let display = path.display().to_string();
            let options = self.options.over(
                &StepOptions::source(file_tag(path)).with_metadata("file", display),
            );
            apply_section_map(schema, values, &map, &options, MergeMode::Override)?;
        }
        Ok(())
    }
}

macro_rules! file_option_setters {
    () => {
        /// Transform each document with `mapper` before applying it.
        pub fn with_mapper(mut self, mapper: impl ConfigMapper + 'static) -> Self {
            self.settings.mapper = Some(Arc::new(mapper));
            self
        }

        pub fn with_shared_mapper(mut self, mapper: Arc<dyn ConfigMapper>) -> Self {
            self.settings.mapper = Some(mapper);
            self
        }

        /// Reject keys that match no definition of their section.
        pub fn strict(mut self, strict: bool) -> Self {
            self.settings.strict = strict;
            self
        }

        pub fn with_options(mut self, options: StepOptions) -> Self {
            self.settings.options = options;
            self
        }
    };
}

/// Values from one config file (YAML, JSON, or TOML by extension).
#[derive(Clone)]
pub struct FromFile {
    path: PathBuf,
    settings: FileOptions,
}

impl FromFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: FileOptions::default(),
        }
    }

    file_option_setters!();
}

impl Source for FromFile {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        self.settings
            .apply_all(schema, values, std::slice::from_ref(&self.path))
    }

    fn label(&self) -> &str {
        "file"
    }
}

/// Values from several config files, listed from lowest to highest
/// precedence.
#[derive(Clone)]
pub struct FromFiles {
    paths: Vec<PathBuf>,
    settings: FileOptions,
}

impl FromFiles {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            settings: FileOptions::default(),
        }
    }

    file_option_setters!();
}

impl Source for FromFiles {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        self.settings.apply_all(schema, values, &self.paths)
    }

    fn label(&self) -> &str {
        "files"
    }
}

type Resolver<'m> = Box<dyn Fn(&dyn CliMatches) -> Result<Vec<PathBuf>, StrataError> + 'm>;

/// Config files chosen at run time from the parsed command line, e.g. a
/// `--config` flag. The resolver returns paths from lowest to highest
/// precedence.
pub struct FromResolvedFiles<'m> {
    matches: &'m dyn CliMatches,
    resolver: Resolver<'m>,
    settings: FileOptions,
}

impl<'m> FromResolvedFiles<'m> {
    pub fn new(
        matches: &'m dyn CliMatches,
        resolver: impl Fn(&dyn CliMatches) -> Result<Vec<PathBuf>, StrataError> + 'm,
    ) -> Self {
        Self {
            matches,
            resolver: Box::new(resolver),
            settings: FileOptions::default(),
        }
    }

    file_option_setters!();
}

impl Source for FromResolvedFiles<'_> {
    fn apply(
        &self,
        schema: &Schema,
        values: &mut Values,
        next: Next<'_>,
    ) -> Result<(), StrataError> {
        next.run(schema, values)?;
        let paths = (self.resolver)(self.matches)?;
        debug!(event = "strata.file.resolved", files = paths.len());
        self.settings.apply_all(schema, values, &paths)
    }

    fn label(&self) -> &str {
        "files"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::cli::StaticMatches;
    use crate::fixtures::test::{demo_schema, obj};
    use crate::value::ParamValue;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run(source: impl Source) -> Result<Values, StrataError> {
        let mut values = Values::new();
        Chain::new().with(source).execute(&demo_schema(), &mut values)?;
        Ok(values)
    }

    #[test]
    fn yaml_file_with_provenance() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.yaml", "demo:\n  x: from-file\n  count: 5\n");
        let values = run(FromFile::new(&path)).unwrap();
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("from-file"));
        assert_eq!(x.winning_source(), Some(file_tag(&path).as_str()));
        assert_eq!(x.log()[0].metadata["file"], json!(path.display().to_string()));
        assert_eq!(values.get_value("demo", "count"), Some(&ParamValue::from(5)));
    }

    #[test]
    fn toml_and_json_are_read_by_extension() {
        let dir = TempDir::new().unwrap();
        let toml = write(&dir, "a.toml", "[db]\nhost = \"toml-host\"\n");
        let json = write(&dir, "b.json", r#"{"db": {"port": 7000}}"#);
        let values = run(FromFiles::new([toml, json])).unwrap();
        assert_eq!(values.get_value("db", "host"), Some(&ParamValue::from("toml-host")));
        assert_eq!(values.get_value("db", "port"), Some(&ParamValue::from(7000)));
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let low = write(&dir, "low.yaml", "demo:\n  x: low\n  count: 1\n");
        let high = write(&dir, "high.yaml", "demo:\n  x: high\n");
        let values = run(FromFiles::new([&low, &high])).unwrap();
        let x = values.get_parameter("demo", "x").unwrap();
        assert_eq!(x.value(), &ParamValue::from("high"));
        assert_eq!(x.log().len(), 2);
        assert_eq!(values.get_value("demo", "count"), Some(&ParamValue::from(1)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = run(FromFile::new("/nonexistent/strata.yaml")).unwrap_err();
        assert!(matches!(err, StrataError::Io { .. }));
    }

    #[test]
    fn empty_file_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.yaml", "");
        assert!(run(FromFile::new(&path)).unwrap().is_empty());
    }

    #[test]
    fn scalar_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scalar.yaml", "just text\n");
        let err = run(FromFile::new(&path)).unwrap_err();
        assert!(err.to_string().contains("expected a map of sections"));
    }

    #[test]
    fn strict_mode_reports_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.yaml", "demo:\n  x: ok\n  colour: red\n");
        assert!(run(FromFile::new(&path)).is_ok());
        let err = run(FromFile::new(&path).strict(true)).unwrap_err();
        assert!(err.to_string().contains("demo.colour"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn mapper_reshapes_the_document() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "flat.yaml", "name: mapped\n");
        let mapper = |doc: &JsonValue| -> Result<Object, StrataError> {
            Ok(obj(json!({"demo": {"x": doc["name"].clone()}})))
        };
        let values = run(FromFile::new(&path).with_mapper(mapper)).unwrap();
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("mapped")));
    }

    #[test]
    fn resolved_files_come_from_the_command_line() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "chosen.yaml", "demo:\n  x: chosen\n");
        let matches = StaticMatches::new().flag("config", [path.display().to_string()]);
        let source = FromResolvedFiles::new(&matches, |m: &dyn CliMatches| {
            Ok(m.flag_values("config")
                .unwrap_or_default()
                .into_iter()
                .map(PathBuf::from)
                .collect())
        });
        let values = run(source).unwrap();
        assert_eq!(values.get_value("demo", "x"), Some(&ParamValue::from("chosen")));
    }
}
