//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Directory export archives are written to.
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tt.db"),
            export_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `<config_dir>/tt/config.toml`, the given
    /// file, then `TT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tt"))
}

/// Returns the platform-specific data directory for tt.
///
/// On Linux: `~/.local/share/tt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tt() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tt");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tt.db"));
        assert_eq!(config.export_dir, PathBuf::from("."));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/tt-test/tt.db\"\nexport_dir = \"/tmp/tt-test/exports\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/tt-test/tt.db"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/tt-test/exports"));
    }

    #[test]
    fn test_missing_explicit_file_keeps_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(&temp.path().join("absent.toml"))).unwrap();
        assert_eq!(config.export_dir, Config::default().export_dir);
    }
}
