//! Configuration schema definitions
//!
//! Defines the structure of the configuration file using serde for serialization.

use serde::{Deserialize, Serialize};

use crate::render::OutputFormat;
use crate::trace::{ChildErrorPolicy, EventOrder, TraceOptions};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Namespace used when `-n` is not given
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Output format used when `-o` is not given
    #[serde(default)]
    pub output: OutputFormat,

    /// Columns for `describe`; empty means built-in defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub describe_fields: Vec<String>,

    /// Columns for `diagnose`; empty means built-in defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnose_fields: Vec<String>,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub traversal: TraversalConfig,
}

/// Discovery cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Reuse discovery results between invocations
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum age of a cached discovery snapshot
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

/// Graph builder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TraversalConfig {
    /// Cluster requests in flight at once during one build
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub on_child_error: ChildErrorPolicy,

    #[serde(default)]
    pub event_order: EventOrder,

    /// Namespace queried for events of cluster-scoped objects
    #[serde(default = "default_cluster_event_namespace")]
    pub cluster_event_namespace: String,
}

impl TraversalConfig {
    pub fn trace_options(&self) -> TraceOptions {
        TraceOptions {
            concurrency: self.concurrency,
            on_child_error: self.on_child_error,
            event_order: self.event_order,
            cluster_event_namespace: self.cluster_event_namespace.clone(),
        }
    }
}

// Default value functions
fn default_namespace() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_seconds() -> u64 {
    600
}

fn default_concurrency() -> usize {
    4
}

fn default_cluster_event_namespace() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            output: OutputFormat::default(),
            describe_fields: Vec::new(),
            diagnose_fields: Vec::new(),
            discovery: DiscoveryConfig::default(),
            traversal: TraversalConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_true(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            on_child_error: ChildErrorPolicy::default(),
            event_order: EventOrder::default(),
            cluster_event_namespace: default_cluster_event_namespace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.output, OutputFormat::Cli);
        assert!(config.discovery.cache_enabled);
        assert_eq!(config.traversal.concurrency, 4);
        assert_eq!(config.traversal.trace_options(), TraceOptions::default());
    }

    #[test]
    fn test_config_serialization() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("defaultNamespace"));
        assert!(yaml.contains("cacheTtlSeconds"));
        assert!(yaml.contains("onChildError: continue"));
        assert!(!yaml.contains("describeFields"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
defaultNamespace: crossplane-system
output: graph
describeFields: [kind, name]
traversal:
  onChildError: abort
  eventOrder: newest
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_namespace, "crossplane-system");
        assert_eq!(config.output, OutputFormat::Graph);
        assert_eq!(config.describe_fields, vec!["kind", "name"]);
        assert_eq!(config.traversal.on_child_error, ChildErrorPolicy::Abort);
        assert_eq!(config.traversal.event_order, EventOrder::Newest);
        assert_eq!(config.traversal.concurrency, 4);
        assert_eq!(config.discovery.cache_ttl_seconds, 600);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = serde_yaml::from_str::<Config>("readOnly: true\n").unwrap_err();
        assert!(err.to_string().contains("readOnly"));
    }
}
