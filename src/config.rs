//! Category configuration.
//!
//! Configuration is a TOML file, `organizer.toml`, that maps each category
//! (which becomes a subfolder name) to the extensions sorted into it:
//!
//! ```toml
//! [folders]
//! pdf = [".pdf"]
//! images = [".png", ".jpg"]
//!
//! [options]
//! on_conflict = "overwrite"   # or "skip"
//! ```
//!
//! The file lives in `$XDG_CONFIG_HOME`, or `~/.config` when that variable
//! is unset. Categories keep their document order, so an extension listed
//! twice belongs to the category that appears later in the file.

use crate::file_category::CategoryMap;
use crate::file_organizer::ConflictPolicy;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name of the configuration inside the config home.
pub const CONFIG_FILE_NAME: &str = "organizer.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at an explicitly requested path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// IO error while reading configuration.
    #[error("error reading config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid TOML syntax or an `[options]` value of the wrong shape.
    #[error("error parsing config file {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },
}

/// Settings from the `[options]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// What to do when a file with the same name is already in the category folder.
    pub on_conflict: ConflictPolicy,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizerConfig {
    /// Category name to extensions, in document order.
    pub folders: Vec<(String, Vec<String>)>,
    pub options: Options,
}

impl OrganizerConfig {
    /// Loads the configuration used for a run.
    ///
    /// With an explicit `config_path` the file must exist. Otherwise the
    /// default location from [`resolve_config_path`] is used, and a missing
    /// file yields an empty configuration: everything is watched, nothing is
    /// moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(
        config_path: Option<&Path>,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match resolve_config_path(env_lookup) {
            Some(path) if path.exists() => Self::load_from_file(&path),
            Some(path) => {
                warn!(path = %path.display(), "no config file, nothing will be moved");
                Ok(Self::default())
            }
            None => {
                warn!("neither XDG_CONFIG_HOME nor HOME is set, nothing will be moved");
                Ok(Self::default())
            }
        }
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::ConfigInvalid` if parsing fails.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|reason| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses configuration text.
    ///
    /// A missing or malformed `[folders]` section is not an error: it yields
    /// no categories. Extension entries that are not strings are skipped.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;

        let folders = match table.remove("folders") {
            Some(toml::Value::Table(folders)) => folders
                .into_iter()
                .map(|(category, extensions)| {
                    let extensions = extension_list(&category, extensions);
                    (category, extensions)
                })
                .collect(),
            Some(_) => {
                warn!("[folders] is not a table, nothing will be moved");
                Vec::new()
            }
            None => {
                warn!("no [folders] section, nothing will be moved");
                Vec::new()
            }
        };

        let options = match table.remove("options") {
            Some(value) => value
                .try_into::<Options>()
                .map_err(|e| format!("invalid [options]: {}", e))?,
            None => Options::default(),
        };

        Ok(Self { folders, options })
    }

    /// Builds the extension lookup from `[folders]`.
    pub fn category_map(&self) -> CategoryMap {
        CategoryMap::build(self.folders.iter().cloned())
    }
}

fn extension_list(category: &str, value: toml::Value) -> Vec<String> {
    let items = match value {
        toml::Value::Array(items) => items,
        toml::Value::String(single) => return vec![single],
        other => {
            warn!(category, kind = other.type_str(), "expected a list of extensions");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            toml::Value::String(ext) => Some(ext),
            other => {
                warn!(category, value = %other, "skipping non-string extension");
                None
            }
        })
        .collect()
}

/// Resolves the configuration file path from environment variables.
///
/// `$XDG_CONFIG_HOME/organizer.toml` when the variable is set and not empty,
/// else `$HOME/.config/organizer.toml`. The lookup is injected so callers and
/// tests decide where values come from.
///
/// ```
/// use organizer::config::resolve_config_path;
/// use std::path::PathBuf;
///
/// let path = resolve_config_path(|key| match key {
///     "HOME" => Some("/home/me".to_string()),
///     _ => None,
/// });
/// assert_eq!(path, Some(PathBuf::from("/home/me/.config/organizer.toml")));
/// ```
pub fn resolve_config_path(env_lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let non_empty = |key: &str| env_lookup(key).filter(|value| !value.is_empty());

    let config_home = match non_empty("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(non_empty("HOME")?).join(".config"),
    };
    Some(config_home.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_resolve_prefers_xdg_config_home() {
        let path = resolve_config_path(env(&[("XDG_CONFIG_HOME", "/cfg"), ("HOME", "/home/me")]));
        assert_eq!(path, Some(PathBuf::from("/cfg/organizer.toml")));
    }

    #[test]
    fn test_resolve_falls_back_to_home() {
        let path = resolve_config_path(env(&[("HOME", "/home/me")]));
        assert_eq!(path, Some(PathBuf::from("/home/me/.config/organizer.toml")));
    }

    #[test]
    fn test_resolve_empty_xdg_is_unset() {
        let path = resolve_config_path(env(&[("XDG_CONFIG_HOME", ""), ("HOME", "/home/me")]));
        assert_eq!(path, Some(PathBuf::from("/home/me/.config/organizer.toml")));
    }

    #[test]
    fn test_resolve_without_any_variable() {
        assert_eq!(resolve_config_path(env(&[])), None);
    }

    #[test]
    fn test_parse_folders_in_document_order() {
        let config = OrganizerConfig::parse(
            r#"
            [folders]
            pdf = [".pdf"]
            images = [".png", ".jpg"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.folders,
            vec![
                ("pdf".to_string(), vec![".pdf".to_string()]),
                (
                    "images".to_string(),
                    vec![".png".to_string(), ".jpg".to_string()]
                ),
            ]
        );
        assert_eq!(config.options.on_conflict, ConflictPolicy::Overwrite);
    }

    #[test]
    fn test_duplicate_extension_later_category_wins() {
        let config = OrganizerConfig::parse(
            r#"
            [folders]
            zdocs = [".pdf"]
            apapers = [".pdf"]
            "#,
        )
        .unwrap();

        // Document order, not alphabetical order, decides.
        assert_eq!(config.category_map().resolve(".pdf"), "apapers");
    }

    #[test]
    fn test_missing_folders_section_is_empty() {
        let config = OrganizerConfig::parse("title = \"x\"").unwrap();
        assert!(config.folders.is_empty());
        assert!(config.category_map().is_empty());
    }

    #[test]
    fn test_folders_not_a_table_is_empty() {
        let config = OrganizerConfig::parse("folders = 3").unwrap();
        assert!(config.folders.is_empty());
    }

    #[test]
    fn test_non_string_extensions_are_skipped() {
        let config = OrganizerConfig::parse(
            r#"
            [folders]
            pdf = [".pdf", 7, ".PDF"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.folders,
            vec![("pdf".to_string(), vec![".pdf".to_string(), ".PDF".to_string()])]
        );
    }

    #[test]
    fn test_parse_options() {
        let config = OrganizerConfig::parse(
            r#"
            [folders]
            pdf = [".pdf"]

            [options]
            on_conflict = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(config.options.on_conflict, ConflictPolicy::Skip);
    }

    #[test]
    fn test_invalid_options_value_is_error() {
        let result = OrganizerConfig::parse(
            r#"
            [options]
            on_conflict = "rename"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(OrganizerConfig::parse("[folders\npdf = ").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("organizer.toml");

        let result = OrganizerConfig::load(Some(&missing), |_| None);

        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_default_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().to_string_lossy().to_string();

        let config = OrganizerConfig::load(None, |key| {
            (key == "XDG_CONFIG_HOME").then(|| home.clone())
        })
        .unwrap();

        assert_eq!(config, OrganizerConfig::default());
    }

    #[test]
    fn test_load_from_xdg_config_home() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[folders]\npdf = [\".pdf\"]\n",
        )
        .unwrap();
        let home = temp_dir.path().to_string_lossy().to_string();

        let config = OrganizerConfig::load(None, |key| {
            (key == "XDG_CONFIG_HOME").then(|| home.clone())
        })
        .unwrap();

        assert_eq!(config.category_map().resolve(".pdf"), "pdf");
    }

    #[test]
    fn test_load_malformed_file_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[folders]\npdf = [\".pdf\"").unwrap();

        let result = OrganizerConfig::load(Some(&path), |_| None);

        assert!(matches!(result, Err(ConfigError::ConfigInvalid { .. })));
    }
}
