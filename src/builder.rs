use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::chain::Chain;
use crate::cli::CliMatches;
use crate::discovery::{self, DEFAULT_FILE_NAME, DEFAULT_PROFILE_FILE_NAME, SearchMode, SearchPath};
use crate::error::StrataError;
use crate::mapper::ConfigMapper;
use crate::overrides;
use crate::parsed::{StepOptions, Values};
use crate::schema::Schema;
use crate::sources::{
    Defaults, FromArgs, FromCli, FromEnv, FromFiles, FromMap, FromProfile, check_required,
};
use crate::validate;

/// Entry point for assembling a standard source pipeline.
pub struct Strata;

impl Strata {
    pub fn builder<'m>() -> PipelineBuilder<'m> {
        PipelineBuilder::new()
    }
}

/// Builder for the standard layered pipeline.
///
/// Sources run from highest to lowest precedence:
///
/// ```text
/// overrides > CLI flags > positional args > environment > config files > profile > defaults
/// ```
///
/// wrapped by a check that every required parameter ended up with a value.
/// Every layer is sparse: unset parameters fall through to the layer below.
pub struct PipelineBuilder<'m> {
    app_name: Option<String>,
    config_file: Option<PathBuf>,
    file_name: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    search_mode: SearchMode,
    env_prefix: Option<String>,
    env_enabled: bool,
    env_vars: Option<Vec<(String, String)>>,
    profile: Option<String>,
    profile_file: Option<PathBuf>,
    mapper: Option<Arc<dyn ConfigMapper>>,
    strict: bool,
    overrides: Vec<(String, JsonValue)>,
    override_sources: Vec<JsonValue>,
    deferred: Option<String>,
    matches: Option<&'m dyn CliMatches>,
    args: Option<Vec<String>>,
}

impl<'m> PipelineBuilder<'m> {
    fn new() -> Self {
        Self {
            app_name: None,
            config_file: None,
            file_name: None,
            search_paths: None,
            search_mode: SearchMode::default(),
            env_prefix: None,
            env_enabled: true,
            env_vars: None,
            profile: None,
            profile_file: None,
            mapper: None,
            strict: false,
            overrides: Vec::new(),
            override_sources: Vec::new(),
            deferred: None,
            matches: None,
            args: None,
        }
    }

    /// Set the application name. This derives defaults:
    /// - search paths → `[SearchPath::Platform]`
    /// - env prefix → upper-cased name with `-` → `_`
    /// - profile file → `<platform config dir>/profiles.yaml`
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Load exactly this file instead of discovering one. It must exist.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Override the discovered file name (default: `config.yaml`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Replace the default search paths. Listed lowest priority first.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path, starting from `[Platform]` if none were set.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths
            .get_or_insert_with(|| vec![SearchPath::Platform])
            .push(path);
        self
    }

    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable the environment layer entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Read the environment layer from `vars` instead of the process
    /// environment.
    pub fn env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Apply the named profile. A named profile that cannot be found is an
    /// error.
    pub fn profile(mut self, name: &str) -> Self {
        self.profile = Some(name.to_string());
        self
    }

    pub fn profile_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_file = Some(path.into());
        self
    }

    /// Rewrite config file documents through `mapper` before applying them.
    pub fn mapper(mut self, mapper: impl ConfigMapper + 'static) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Reject unknown parameter keys in config files (default: `false`).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a `"slug.name"` override. `None` values are ignored, which suits
    /// optional clap fields.
    pub fn set_override<V: Into<JsonValue>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.overrides.push((key.to_string(), v.into()));
        }
        self
    }

    /// Add overrides from any serializable value, matching its fields
    /// against parameter names once the schema is known. Fields that name
    /// no parameter are skipped.
    ///
    /// Composes with [`set_override`](Self::set_override); explicit
    /// overrides win over matched ones.
    pub fn overrides_from<S: Serialize>(mut self, source: &S) -> Self {
        match serde_json::to_value(source) {
            Ok(value) => self.override_sources.push(value),
            Err(e) => {
                self.deferred.get_or_insert(format!("override source: {e}"));
            }
        }
        self
    }

    /// Read flags (and, unless [`args`](Self::args) is set, positional
    /// arguments) from parsed command-line matches.
    pub fn cli(mut self, matches: &'m dyn CliMatches) -> Self {
        self.matches = Some(matches);
        self
    }

    /// Positional arguments for the default section.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    fn effective_file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME)
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        if let Some(paths) = &self.search_paths {
            return paths.clone();
        }
        vec![SearchPath::Platform]
    }

    /// `None` when the environment layer is disabled or there is nothing to
    /// derive a prefix from.
    fn effective_env_prefix(&self) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        if let Some(prefix) = &self.env_prefix {
            return Some(prefix.clone());
        }
        self.app_name
            .as_ref()
            .map(|app| app.to_uppercase().replace('-', "_"))
    }

    fn discovery_configured(&self) -> bool {
        self.search_paths.is_some() || self.file_name.is_some()
    }

    fn effective_config_files(&self) -> Result<Vec<PathBuf>, StrataError> {
        if let Some(path) = &self.config_file {
            if self.discovery_configured() {
                return Err(StrataError::Configuration(
                    "config_file cannot be combined with search_paths or file_name".into(),
                ));
            }
            return Ok(vec![path.clone()]);
        }
        if self.app_name.is_none() && self.search_paths.is_none() {
            return Ok(Vec::new());
        }
        discovery::find_config_files(
            &self.effective_search_paths(),
            self.effective_file_name(),
            self.app_name.as_deref().unwrap_or_default(),
            self.search_mode,
        )
    }

    fn effective_profile_file(&self) -> Result<PathBuf, StrataError> {
        if let Some(path) = &self.profile_file {
            return Ok(path.clone());
        }
        self.app_name
            .as_deref()
            .and_then(discovery::platform_config_dir)
            .map(|dir| dir.join(DEFAULT_PROFILE_FILE_NAME))
            .ok_or_else(|| {
                StrataError::Configuration(
                    "a profile needs either profile_file or app_name to locate profiles".into(),
                )
            })
    }

    fn effective_overrides(
        &self,
        schema: &Schema,
    ) -> Result<Vec<(String, JsonValue)>, StrataError> {
        let mut all = Vec::new();
        for source in &self.override_sources {
            all.extend(overrides::matching_overrides(schema, source)?);
        }
        all.extend(self.overrides.iter().cloned());
        Ok(all)
    }

    /// Assemble the source chain for `schema` without running it.
    pub fn build_chain(&self, schema: &Schema) -> Result<Chain<'m>, StrataError> {
        if let Some(reason) = &self.deferred {
            return Err(StrataError::Binding(reason.clone()));
        }
        let mut chain = Chain::new().with(check_required());

        let overrides = self.effective_overrides(schema)?;
        if !overrides.is_empty() {
            let map = overrides::overrides_to_map(&overrides)?;
            let options = StepOptions::new().with_metadata("override", true);
            chain.push(FromMap::new(map).with_options(options));
        }

        if let Some(matches) = self.matches {
            chain.push(FromCli::new(matches));
        }
        let args = self
            .args
            .clone()
            .or_else(|| self.matches.map(|m| m.positional_args()));
        if let Some(args) = args {
            chain.push(FromArgs::new(args).ignore_required(true));
        }

        if let Some(prefix) = self.effective_env_prefix() {
            let mut env = FromEnv::new(prefix);
            if let Some(vars) = &self.env_vars {
                env = env.with_vars(vars.iter().cloned());
            }
            chain.push(env);
        }

        let files = self.effective_config_files()?;
        if !files.is_empty() {
            let mut source = FromFiles::new(files).strict(self.strict);
            if let Some(mapper) = &self.mapper {
                source = source.with_shared_mapper(Arc::clone(mapper));
            }
            chain.push(source);
        }

        if let Some(profile) = &self.profile {
            let file = self.effective_profile_file()?;
            chain.push(FromProfile::new(file, profile.as_str()).required(true));
        }

        chain.push(Defaults::new());
        debug!(event = "strata.builder.chain_built", sources = chain.len());
        Ok(chain)
    }

    /// Check `schema`, then run the standard pipeline over it.
    pub fn load(&self, schema: &Schema) -> Result<Values, StrataError> {
        validate::check_schema(schema)?;
        let chain = self.build_chain(schema)?;
        let mut values = Values::new();
        chain.execute(schema, &mut values)?;
        Ok(values)
    }

    /// Load and decode one section into a host struct.
    pub fn load_section<T: DeserializeOwned>(
        &self,
        schema: &Schema,
        slug: &str,
    ) -> Result<T, StrataError> {
        self.load(schema)?.decode_section(slug)
    }
}
