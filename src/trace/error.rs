//! Error taxonomy for resource graph resolution
//!
//! Root failures are returned to the caller as-is. Child failures are either
//! recorded on a failed node or wrapped in [`TraceError::Branch`], depending
//! on the configured [`ChildErrorPolicy`](crate::trace::ChildErrorPolicy).

use thiserror::Error;

/// Errors produced while resolving, fetching or expanding resources
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TraceError {
    /// No entry in the discovery document matches the requested kind/group
    #[error("no API resource found for kind '{kind}'{}", fmt_group(group))]
    Resolution { kind: String, group: String },

    /// The discovery document itself could not be obtained
    #[error("failed to query API discovery: {0}")]
    ScopeDetermination(String),

    /// The resolved object does not exist
    #[error("{kind} '{name}' not found{}", fmt_namespace(namespace))]
    ObjectNotFound {
        kind: String,
        name: String,
        namespace: Option<String>,
    },

    /// Connectivity, authentication or any other API server failure
    #[error("request to API server failed: {0}")]
    Transport(String),

    /// A reference field exists but has the wrong shape or misses keys
    #[error("malformed reference at {path}: {reason}")]
    MalformedReference { path: String, reason: String },

    /// The reference points back at one of its own ancestors
    #[error("cyclic reference: {key} is already an ancestor")]
    CyclicReference { key: String },

    /// A child failed while the build runs with the abort policy
    #[error("failed to build {path}: {source}")]
    Branch {
        path: String,
        #[source]
        source: Box<TraceError>,
    },
}

impl TraceError {
    /// Map a kube API error for a point read
    pub fn from_kube(err: kube::Error, kind: &str, name: &str, namespace: Option<&str>) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => TraceError::ObjectNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
            },
            other => TraceError::Transport(other.to_string()),
        }
    }

    /// The innermost error, looking through `Branch` wrappers
    pub fn root_cause(&self) -> &TraceError {
        match self {
            TraceError::Branch { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn fmt_group(group: &str) -> String {
    if group.is_empty() {
        String::new()
    } else {
        format!(" in group '{}'", group)
    }
}

fn fmt_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!(" in namespace '{}'", ns),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_message_includes_group() {
        let err = TraceError::Resolution {
            kind: "bucket".to_string(),
            group: "s3.aws".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no API resource found for kind 'bucket' in group 's3.aws'"
        );
    }

    #[test]
    fn test_not_found_message_cluster_scoped() {
        let err = TraceError::ObjectNotFound {
            kind: "Bucket".to_string(),
            name: "b1".to_string(),
            namespace: None,
        };
        assert_eq!(err.to_string(), "Bucket 'b1' not found");
    }

    #[test]
    fn test_root_cause_unwraps_branches() {
        let inner = TraceError::Transport("connection refused".to_string());
        let err = TraceError::Branch {
            path: "A/a > B/b".to_string(),
            source: Box::new(TraceError::Branch {
                path: "A/a > B/b > C/c".to_string(),
                source: Box::new(inner.clone()),
            }),
        };
        assert_eq!(err.root_cause(), &inner);
    }
}
