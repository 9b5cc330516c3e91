//! Render configuration
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults (`seed = 0`, `time = 0`, `docstep = 0`)
//! 2. Config file: the first of `flux.toml` / `.flux.toml` in the working directory
//! 3. Environment: `FLUX_SEED`, `FLUX_TIME`, `FLUX_DOCSTEP`, `FLUX_ASSET_ROOT`
//!
//! # Example Config File
//!
//! ```toml
//! [render]
//! seed = 42
//! time = 0.0
//! docstep = 3
//! asset_root = "media"
//! ```

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file names probed by [`RenderConfig::load`], in order
pub const CONFIG_FILES: &[&str] = &["flux.toml", ".flux.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Persistent render settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Global seed for every random choice
    pub seed: u64,
    /// Initial clock, in seconds
    pub time: f64,
    /// Initial docstep
    pub docstep: u64,
    /// Directory bank roots are resolved against; the working directory when unset
    pub asset_root: Option<PathBuf>,
    /// File the settings came from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    render: RenderConfig,
}

impl RenderConfig {
    /// Load from the working directory and the process environment.
    ///
    /// Unreadable files and malformed variables are logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::load_from_dir(Path::new("."));
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Defaults overlaid with the first config file found in `dir`
    pub fn load_from_dir(dir: &Path) -> Self {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    log::info!("Loaded render config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.render)
    }

    /// Apply `FLUX_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Err(e) = self.try_apply_env(lookup) {
            log::warn!("{}", e);
        }
    }

    /// Like [`apply_env`](Self::apply_env) but stops at the first malformed value
    pub fn try_apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::InvalidEnv { name, value })
        }

        if let Some(value) = lookup("FLUX_SEED") {
            self.seed = parse("FLUX_SEED", value)?;
            log::info!("Seed from env: {}", self.seed);
        }
        if let Some(value) = lookup("FLUX_TIME") {
            self.time = parse("FLUX_TIME", value)?;
        }
        if let Some(value) = lookup("FLUX_DOCSTEP") {
            self.docstep = parse("FLUX_DOCSTEP", value)?;
        }
        if let Some(value) = lookup("FLUX_ASSET_ROOT") {
            if !value.is_empty() {
                self.asset_root = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }

    pub fn into_options(self) -> RenderOptions {
        RenderOptions {
            seed: self.seed,
            time: self.time,
            docstep: self.docstep,
            asset_root: self.asset_root,
        }
    }
}

/// Inputs of one render pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub seed: u64,
    pub time: f64,
    pub docstep: u64,
    pub asset_root: Option<PathBuf>,
}

impl RenderOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_docstep(mut self, docstep: u64) -> Self {
        self.docstep = docstep;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_toml() {
        let config = RenderConfig::from_toml_str(
            r#"
            [render]
            seed = 42
            docstep = 3
            asset_root = "media"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.docstep, 3);
        assert_eq!(config.time, 0.0);
        assert_eq!(config.asset_root, Some(PathBuf::from("media")));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RenderConfig::from_toml_str("").unwrap(), RenderConfig::default());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            RenderConfig::from_toml_str("[render]\nseed = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("FLUX_SEED", "9"), ("FLUX_TIME", "2.5"), ("FLUX_ASSET_ROOT", "/srv/media")]
            .into_iter()
            .collect();
        let mut config = RenderConfig { docstep: 4, ..Default::default() };
        config.try_apply_env(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.seed, 9);
        assert_eq!(config.time, 2.5);
        assert_eq!(config.docstep, 4);
        assert_eq!(config.asset_root, Some(PathBuf::from("/srv/media")));
    }

    #[test]
    fn test_malformed_env() {
        let mut config = RenderConfig::default();
        let err = config
            .try_apply_env(|name| (name == "FLUX_DOCSTEP").then(|| "-1".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for FLUX_DOCSTEP: '-1'");

        // The lenient form keeps the previous value
        config.apply_env(|name| (name == "FLUX_SEED").then(|| "x".to_string()));
        assert_eq!(config.seed, 0);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RenderConfig::load_from_dir(dir.path()), RenderConfig::default());

        std::fs::write(dir.path().join(".flux.toml"), "[render]\nseed = 5\n").unwrap();
        let config = RenderConfig::load_from_dir(dir.path());
        assert_eq!(config.seed, 5);
        assert_eq!(config.config_path, Some(dir.path().join(".flux.toml")));

        let options = config.into_options();
        assert_eq!(options, RenderOptions::default().with_seed(5));
    }
}
