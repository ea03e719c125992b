//! Configuration loading and environment selection

use crate::config::types::{FolderConfig, LayoutConfig};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Folders and layout rules of one environment (`dev`, `prod`, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Environment {
    pub folders: FolderConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Whole configuration file, keyed by environment name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    pub environments: IndexMap<String, Environment>,
}

impl Config {
    /// Loads the configuration at `config_path`.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML. Relative
    /// folders are resolved against the directory holding the file.
    pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        if !config_path.is_file() {
            return Err(Error::ConfigNotFound {
                config_path: config_path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = match config_path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        debug!(
            "Loaded configuration from '{}' with environments {:?}",
            config_path.display(),
            config.environments.keys().collect::<Vec<_>>()
        );

        // a bare file name has an empty parent
        let base = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base = std::path::absolute(base)?;
        Ok(config.rebase(&base))
    }

    /// Returns the environment called `name`, validated.
    pub fn environment(&self, name: &str) -> Result<&Environment> {
        let environment = self.environments.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
            Error::ConfigurationError(format!(
                "environment '{name}' is not defined (available: {})",
                known.join(", ")
            ))
        })?;
        environment.layout.validate()?;
        Ok(environment)
    }

    fn rebase(self, base: &Path) -> Self {
        let environments = self
            .environments
            .into_iter()
            .map(|(name, env)| {
                let folders = env.folders.rebase(base);
                (name, Environment { folders, ..env })
            })
            .collect();
        Self { environments }
    }
}
