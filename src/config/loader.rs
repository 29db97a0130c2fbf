//! Configuration loading and merging logic
//!
//! Precedence order (highest to lowest):
//! 1. Command line flags (applied by the caller)
//! 2. Environment variable overrides
//! 3. Root config file
//! 4. Built-in defaults

use std::path::Path;

use anyhow::{Context, Result};

use super::{paths, schema::Config};
use crate::render::parse_fields;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the root config file (if any) with environment overrides applied
    pub fn load() -> Result<Config> {
        let path = paths::root_config_path();
        let config = if path.exists() {
            Self::load_file(&path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        Ok(Self::apply_env_overrides(config, |key| std::env::var(key).ok()))
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty file is a valid, all-defaults config
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate the root config file
    ///
    /// Fails on invalid YAML, unknown keys, invalid value types, a zero
    /// traversal concurrency and unknown field names.
    pub fn validate() -> Result<()> {
        let path = paths::root_config_path();
        if path.exists() {
            let config = Self::load_file(&path)?;
            Self::check(&config)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        }

        let merged = Self::load().context("Failed to load merged configuration")?;
        Self::check(&merged).context("Invalid configuration after environment overrides")
    }

    /// Semantic checks that serde cannot express
    pub fn check(config: &Config) -> Result<()> {
        if config.traversal.concurrency == 0 {
            anyhow::bail!("traversal.concurrency must be at least 1");
        }
        parse_fields(&config.describe_fields).context("Invalid describeFields")?;
        parse_fields(&config.diagnose_fields).context("Invalid diagnoseFields")?;
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env_overrides<F>(mut config: Config, var: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = var("XPTRACE_DEFAULT_NAMESPACE") {
            config.default_namespace = namespace;
        }

        if let Some(output) = var("XPTRACE_OUTPUT") {
            match output.parse() {
                Ok(format) => config.output = format,
                Err(e) => tracing::warn!("Ignoring XPTRACE_OUTPUT: {}", e),
            }
        }

        if let Some(concurrency) = var("XPTRACE_CONCURRENCY") {
            match concurrency.parse() {
                Ok(n) => config.traversal.concurrency = n,
                Err(e) => tracing::warn!("Ignoring XPTRACE_CONCURRENCY: {}", e),
            }
        }

        if let Some(policy) = var("XPTRACE_ON_CHILD_ERROR") {
            match serde_yaml::from_str(&policy) {
                Ok(p) => config.traversal.on_child_error = p,
                Err(e) => tracing::warn!("Ignoring XPTRACE_ON_CHILD_ERROR: {}", e),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutputFormat;
    use crate::trace::ChildErrorPolicy;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::apply_env_overrides(
            Config::default(),
            env(&[
                ("XPTRACE_DEFAULT_NAMESPACE", "team-a"),
                ("XPTRACE_OUTPUT", "json"),
                ("XPTRACE_CONCURRENCY", "16"),
                ("XPTRACE_ON_CHILD_ERROR", "abort"),
            ]),
        );

        assert_eq!(config.default_namespace, "team-a");
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.traversal.concurrency, 16);
        assert_eq!(config.traversal.on_child_error, ChildErrorPolicy::Abort);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = ConfigLoader::apply_env_overrides(
            Config::default(),
            env(&[("XPTRACE_OUTPUT", "png"), ("XPTRACE_CONCURRENCY", "many")]),
        );
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.default_namespace = "crossplane-system".to_string();
        ConfigLoader::save(&config, &path).unwrap();

        assert_eq!(ConfigLoader::load_file(&path).unwrap(), config);
    }

    #[test]
    fn test_empty_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(ConfigLoader::load_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_check_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.traversal.concurrency = 0;
        assert!(ConfigLoader::check(&config).is_err());
    }

    #[test]
    fn test_check_rejects_unknown_fields() {
        let mut config = Config::default();
        config.diagnose_fields = vec!["kind".to_string(), "owner".to_string()];
        let err = ConfigLoader::check(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown field 'owner'"));
    }
}
