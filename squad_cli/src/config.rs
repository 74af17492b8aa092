use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use squad_core::ExportFormat;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_file: String,
    /// Where the per-key JSON files live; XDG data home when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Storage scope; unset means the shared guest scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub default_export_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            log_file: "/dev/null".to_string(),
            data_dir: None,
            user_id: None,
            default_export_format: "json".to_string(),
        }
    }
}

impl Config {
    /// Falls back to JSON when the configured format is not recognised.
    pub fn export_format(&self) -> ExportFormat {
        ExportFormat::parse(&self.default_export_format).unwrap_or(ExportFormat::Json)
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(default_data_dir)
    }
}

fn base_dirs() -> BaseDirectories {
    BaseDirectories::with_prefix(env!("CARGO_PKG_NAME"))
}

pub fn get_config_path() -> Option<PathBuf> {
    let config_home = base_dirs().get_config_home()?;
    Some(config_home.join("config.toml"))
}

pub fn default_data_dir() -> Option<PathBuf> {
    base_dirs().get_data_home()
}

pub fn read() -> Config {
    match get_config_path() {
        Some(path) => read_from(&path),
        None => Config::default(),
    }
}

pub fn read_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
            return Config::default();
        }
    };

    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        Config::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: Config = toml::from_str("user_id = \"coach\"\nlog_level = \"debug\"\n").unwrap();
        assert_eq!(cfg.user_id.as_deref(), Some("coach"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.log_file, "/dev/null");
        assert_eq!(cfg.export_format(), ExportFormat::Json);
    }

    #[test]
    fn test_export_format_falls_back_to_json() {
        let cfg = Config {
            default_export_format: "CSV".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.export_format(), ExportFormat::Csv);

        let cfg = Config {
            default_export_format: "xlsx".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.export_format(), ExportFormat::Json);
    }

    #[test]
    fn test_read_from_missing_or_invalid_file() {
        let dir = std::env::temp_dir().join(format!("squad_cli_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(read_from(&dir.join("missing.toml")), Config::default());

        let bad = dir.join("bad.toml");
        fs::write(&bad, "log_level = [").unwrap();
        assert_eq!(read_from(&bad), Config::default());

        let good = dir.join("good.toml");
        fs::write(&good, "data_dir = \"/tmp/squad\"\n").unwrap();
        assert_eq!(read_from(&good).data_dir, Some(PathBuf::from("/tmp/squad")));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_serializes_without_unset_options() {
        let text = toml::to_string(&Config::default()).unwrap();
        assert!(text.contains("log_level = \"info\""));
        assert!(!text.contains("user_id"));
    }
}
