//! Configuration loading from multiple sources

use crate::{validate_config, ConfigError, PipelineConfig, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "SETTLE_PIPELINE";

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<PipelineConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading pipeline config");

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}",
                extension
            ))),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<PipelineConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<PipelineConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<PipelineConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables
    ///
    /// Uses default prefix "SETTLE_PIPELINE"
    pub fn from_env() -> Result<PipelineConfig> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Environment variables should be in the format: PREFIX__SECTION__KEY
    /// For example: SETTLE_PIPELINE__RUN__MAX_CONCURRENCY=8
    pub fn from_env_with_prefix(prefix: &str) -> Result<PipelineConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Later sources win key by key, so unset variables leave file values intact.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<PipelineConfig> {
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        Self::builder().add_file(path, true).add_env(env_prefix).build()
    }

    /// Load, apply `SETTLE_PIPELINE__*` overrides and validate
    ///
    /// Without a path only defaults and the environment are used.
    pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
        let config = match path {
            Some(path) => Self::from_file_with_env(path, DEFAULT_ENV_PREFIX)?,
            None => Self::from_env()?,
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Build configuration using the config crate's builder pattern
    ///
    /// This allows for more complex configuration scenarios with multiple sources
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for complex configuration loading scenarios
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// Set a default value for a key
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispatchMode;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [run]
            max_concurrency = 4
            dispatch = "every_stage"
            isolate_lookup_panics = false

            [logging]
            level = "debug"
            json = true

            [metrics]
            enabled = false
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.run.max_concurrency, Some(4));
        assert_eq!(config.run.dispatch, DispatchMode::EveryStage);
        assert!(!config.run.isolate_lookup_panics);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
run:
  max_concurrency: 2
logging:
  level: warn
"#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.run.max_concurrency, Some(2));
        assert_eq!(config.run.dispatch, DispatchMode::Final);
        assert!(config.run.isolate_lookup_panics);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{ "run": { "dispatch": "final" }, "metrics": { "enabled": true } }"#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.run.dispatch, DispatchMode::Final);
        assert_eq!(config.run.max_concurrency, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ConfigLoader::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_unknown_dispatch_mode_rejected() {
        let toml = r#"
            [run]
            dispatch = "sometimes"
        "#;

        assert!(ConfigLoader::from_toml(toml).is_err());
    }
}
