//! CLI Configuration

use crate::output::OutputFormat;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub store_path: Option<String>,
    pub default_format: Option<String>,
}

impl Config {
    pub fn load(profile: Option<&str>) -> Result<Self, String> {
        Self::load_from(&Self::config_path(profile)?)
    }

    pub fn save(&self, profile: Option<&str>) -> Result<PathBuf, String> {
        let path = Self::config_path(profile)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
            toml::from_str(&content).map_err(|e| e.to_string())
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, content).map_err(|e| e.to_string())
    }

    /// Store directory, `~/.formsmith/store` unless configured.
    pub fn store_dir(&self) -> Result<PathBuf, String> {
        match &self.store_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::base_dir()?.join("store")),
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, String> {
        match &self.default_format {
            Some(name) => parse_format(name),
            None => Ok(OutputFormat::Table),
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), String> {
        match key {
            "store_path" => self.store_path = Some(value),
            "default_format" => {
                parse_format(&value)?;
                self.default_format = Some(value);
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<&str>, String> {
        match key {
            "store_path" => Ok(self.store_path.as_deref()),
            "default_format" => Ok(self.default_format.as_deref()),
            _ => Err(format!("Unknown config key: {}", key)),
        }
    }

    fn base_dir() -> Result<PathBuf, String> {
        let home = dirs::home_dir().ok_or("Cannot find home directory")?;
        Ok(home.join(".formsmith"))
    }

    fn config_path(profile: Option<&str>) -> Result<PathBuf, String> {
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(Self::base_dir()?.join(filename))
    }
}

fn parse_format(name: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(name, true).map_err(|_| format!("Unknown output format: {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(matches!(config.output_format(), Ok(OutputFormat::Table)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.work.toml");

        let mut config = Config::default();
        config.set("store_path", "/tmp/forms".into()).unwrap();
        config.set("default_format", "yaml".into()).unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.store_dir().unwrap(), PathBuf::from("/tmp/forms"));
        assert!(matches!(loaded.output_format(), Ok(OutputFormat::Yaml)));
    }

    #[test]
    fn test_unknown_keys_and_formats() {
        let mut config = Config::default();
        assert!(config.set("api_key", "x".into()).is_err());
        assert!(config.set("default_format", "xml".into()).is_err());
        assert_eq!(config.default_format, None);
        assert!(config.get("nope").is_err());
        assert_eq!(config.get("store_path").unwrap(), None);
    }
}
