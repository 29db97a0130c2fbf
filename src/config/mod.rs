//! Configuration system for xptrace
//!
//! A single YAML file with environment overrides. The loaded values end up
//! as explicit options passed to the graph builder and the renderers.

pub mod loader;
pub mod paths;
pub mod schema;

use anyhow::Context;

pub use loader::ConfigLoader;
pub use schema::{Config, DiscoveryConfig, TraversalConfig};

use crate::render::parse_fields;

/// Keys accepted by `config get` and `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "defaultNamespace",
    "output",
    "describeFields",
    "diagnoseFields",
    "discovery.cacheEnabled",
    "discovery.cacheTtlSeconds",
    "traversal.concurrency",
    "traversal.onChildError",
    "traversal.eventOrder",
    "traversal.clusterEventNamespace",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "defaultNamespace" => Ok(config.default_namespace.clone()),
        "output" => Ok(config.output.to_string()),
        "describeFields" => Ok(config.describe_fields.join(",")),
        "diagnoseFields" => Ok(config.diagnose_fields.join(",")),
        "discovery.cacheEnabled" => Ok(config.discovery.cache_enabled.to_string()),
        "discovery.cacheTtlSeconds" => Ok(config.discovery.cache_ttl_seconds.to_string()),
        "traversal.concurrency" => Ok(config.traversal.concurrency.to_string()),
        "traversal.onChildError" => scalar(&config.traversal.on_child_error),
        "traversal.eventOrder" => scalar(&config.traversal.event_order),
        "traversal.clusterEventNamespace" => Ok(config.traversal.cluster_event_namespace.clone()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "defaultNamespace" => {
            config.default_namespace = value.to_string();
        }
        "output" => {
            config.output = value.parse()?;
        }
        "describeFields" => {
            config.describe_fields = field_list(value)?;
        }
        "diagnoseFields" => {
            config.diagnose_fields = field_list(value)?;
        }
        "discovery.cacheEnabled" => {
            config.discovery.cache_enabled = value
                .parse()
                .context("discovery.cacheEnabled must be 'true' or 'false'")?;
        }
        "discovery.cacheTtlSeconds" => {
            config.discovery.cache_ttl_seconds = value
                .parse()
                .context("discovery.cacheTtlSeconds must be a number")?;
        }
        "traversal.concurrency" => {
            let concurrency: usize = value
                .parse()
                .context("traversal.concurrency must be a number")?;
            if concurrency == 0 {
                anyhow::bail!("traversal.concurrency must be at least 1");
            }
            config.traversal.concurrency = concurrency;
        }
        "traversal.onChildError" => {
            config.traversal.on_child_error = serde_yaml::from_str(value)
                .context("traversal.onChildError must be 'continue' or 'abort'")?;
        }
        "traversal.eventOrder" => {
            config.traversal.event_order = serde_yaml::from_str(value)
                .context("traversal.eventOrder must be 'server' or 'newest'")?;
        }
        "traversal.clusterEventNamespace" => {
            config.traversal.cluster_event_namespace = value.to_string();
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

/// Comma separated field names, validated
fn field_list(value: &str) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    parse_fields(&names)?;
    Ok(names)
}

fn scalar<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    let yaml = serde_yaml::to_string(value).context("Failed to serialize value")?;
    Ok(yaml.trim().to_string())
}
