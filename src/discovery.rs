//! Locating config files on disk.
//!
//! [`SearchPath`]s are expanded into directories listed from lowest to
//! highest priority, then each directory is checked for the config file
//! name. [`SearchMode`] decides whether every hit is used or only the
//! highest-priority one. Missing files are skipped; other I/O errors
//! propagate.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StrataError;

/// Config file name used when none is configured.
pub const DEFAULT_FILE_NAME: &str = "config.yaml";

/// Profiles file name inside the platform config directory.
pub const DEFAULT_PROFILE_FILE_NAME: &str = "profiles.yaml";

/// Where the walk of [`SearchPath::Ancestors`] stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// Walk up to the filesystem root.
    Root,
    /// Stop at (and include) the first directory containing this entry,
    /// e.g. `.git`. Walks to the root when it never appears.
    Marker(String),
}

/// A place to look for config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    /// Per-user platform config directory for the app (`~/.config/<app>` on
    /// Linux).
    Platform,
    /// A directory relative to the user's home, e.g. `Home(".myapp".into())`.
    Home(String),
    Cwd,
    Path(PathBuf),
    /// The working directory and its parents, shallowest first.
    Ancestors(Boundary),
}

/// How many of the discovered files are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Every file found, later ones overriding earlier ones.
    #[default]
    Merge,
    /// Only the highest-priority file found.
    FirstMatch,
}

/// The platform config directory of `app_name`, if the platform has one.
pub fn platform_config_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|p| p.config_dir().to_path_buf())
}

/// Directories from `start` up to `boundary`, shallowest first.
pub fn ancestors_of(start: &Path, boundary: &Boundary) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in start.ancestors() {
        dirs.push(dir.to_path_buf());
        if let Boundary::Marker(marker) = boundary
            && dir.join(marker).exists()
        {
            break;
        }
    }
    dirs.reverse();
    dirs
}

/// Expand `paths` into concrete directories, lowest priority first.
///
/// `cwd` anchors `Cwd` and `Ancestors`. `Platform` needs an app name;
/// `Platform` and `Home` entries that cannot be resolved are dropped.
pub fn expand_search_paths(paths: &[SearchPath], app_name: &str, cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for path in paths {
        match path {
            SearchPath::Platform if app_name.is_empty() => {}
            SearchPath::Platform => dirs.extend(platform_config_dir(app_name)),
            SearchPath::Home(sub) => {
                dirs.extend(directories::UserDirs::new().map(|u| u.home_dir().join(sub)));
            }
            SearchPath::Cwd => dirs.push(cwd.to_path_buf()),
            SearchPath::Path(dir) => dirs.push(dir.clone()),
            SearchPath::Ancestors(boundary) => dirs.extend(ancestors_of(cwd, boundary)),
        }
    }
    dirs
}

fn exists(path: &Path) -> Result<bool, StrataError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StrataError::io(path, e)),
    }
}

/// Existing `<dir>/<file_name>` paths in `dirs`, lowest priority first.
pub fn find_in_dirs(
    dirs: &[PathBuf],
    file_name: &str,
    mode: SearchMode,
) -> Result<Vec<PathBuf>, StrataError> {
    let mut found = Vec::new();
    match mode {
        SearchMode::Merge => {
            for dir in dirs {
                let candidate = dir.join(file_name);
                if exists(&candidate)? {
                    found.push(candidate);
                }
            }
        }
        SearchMode::FirstMatch => {
            for dir in dirs.iter().rev() {
                let candidate = dir.join(file_name);
                if exists(&candidate)? {
                    found.push(candidate);
                    break;
                }
            }
        }
    }
    debug!(
        event = "strata.discovery.completed",
        searched = dirs.len(),
        found = found.len(),
        file_name = file_name
    );
    Ok(found)
}

/// Discover config files for `app_name` starting from the process working
/// directory.
pub fn find_config_files(
    paths: &[SearchPath],
    file_name: &str,
    app_name: &str,
    mode: SearchMode,
) -> Result<Vec<PathBuf>, StrataError> {
    let cwd = std::env::current_dir().map_err(|e| StrataError::io(".", e))?;
    find_in_dirs(&expand_search_paths(paths, app_name, &cwd), file_name, mode)
}
