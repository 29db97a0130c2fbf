//! Kind/group/version to REST resource resolution
//!
//! Works purely on a [`DiscoverySnapshot`], so a single snapshot serves every
//! lookup of one invocation.

use kube::core::ApiResource;

use crate::kube::discovery::{DiscoveredResource, DiscoverySnapshot};
use crate::trace::error::TraceError;

/// A concrete REST resource plus its scope
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub resource: ApiResource,
    pub namespaced: bool,
}

impl ResolvedType {
    /// `kind.group/version`, stable key used for cycle detection
    pub fn gvk_key(&self) -> String {
        if self.resource.group.is_empty() {
            format!("{}/{}", self.resource.version, self.resource.kind)
        } else {
            format!(
                "{}/{}/{}",
                self.resource.group, self.resource.version, self.resource.kind
            )
        }
    }
}

/// Resolves user and reference supplied type names against discovery
#[derive(Debug, Clone)]
pub struct TypeResolver {
    snapshot: DiscoverySnapshot,
}

impl TypeResolver {
    pub fn new(snapshot: DiscoverySnapshot) -> Self {
        Self { snapshot }
    }

    /// Resolve `kind` (Kind, plural, singular or short name) to a REST resource
    ///
    /// `group` restricts the match to one API group. `api_version` may be
    /// `group/version` or a bare core `version`; its group is used when
    /// `group` is empty, its version selects among served versions.
    pub fn resolve(
        &self,
        kind: &str,
        group: &str,
        api_version: &str,
    ) -> Result<ResolvedType, TraceError> {
        let (version_group, version) = split_api_version(api_version);
        self.resolve_in(kind, group, version_group, version)
    }

    /// Resolve a command line `TYPE[.GROUP]` with an optional bare `version`
    ///
    /// A version without a group does not imply the core group here: every
    /// group serving the kind is considered and the one serving `version` wins.
    pub fn resolve_version(
        &self,
        kind: &str,
        group: &str,
        version: &str,
    ) -> Result<ResolvedType, TraceError> {
        self.resolve_in(kind, group, None, Some(version).filter(|v| !v.is_empty()))
    }

    fn resolve_in(
        &self,
        kind: &str,
        group: &str,
        implied_group: Option<&str>,
        version: Option<&str>,
    ) -> Result<ResolvedType, TraceError> {
        let (kind, group) = split_qualified(kind, group);

        // An explicit group wins over the one implied by apiVersion
        let group_filter: Option<&str> = if !group.is_empty() {
            Some(group)
        } else {
            implied_group
        };

        let token = kind.to_lowercase();
        let candidates: Vec<&DiscoveredResource> = self
            .snapshot
            .resources
            .iter()
            .filter(|r| group_filter.is_none_or(|g| r.group == g))
            .filter(|r| matches_token(r, &token))
            .collect();

        let chosen = version
            .and_then(|v| candidates.iter().find(|r| r.version == v))
            .or_else(|| candidates.first())
            .ok_or_else(|| TraceError::Resolution {
                kind: kind.to_string(),
                group: group_filter.unwrap_or_default().to_string(),
            })?;

        if group_filter.is_none() {
            let groups: Vec<&str> = candidates
                .iter()
                .map(|r| r.group.as_str())
                .filter(|g| *g != chosen.group)
                .collect();
            if !groups.is_empty() {
                tracing::debug!(
                    "Kind '{}' is ambiguous, using group '{}' over {:?}",
                    kind,
                    chosen.group,
                    groups
                );
            }
        }

        // Keep a requested version even if discovery only lists the preferred one
        let version = version.unwrap_or(&chosen.version).to_string();
        let api_version = if chosen.group.is_empty() {
            version.clone()
        } else {
            format!("{}/{}", chosen.group, version)
        };

        tracing::debug!(
            "Resolved '{}' to {} ({})",
            kind,
            chosen.plural,
            if chosen.namespaced {
                "namespaced"
            } else {
                "cluster"
            }
        );

        Ok(ResolvedType {
            resource: ApiResource {
                group: chosen.group.clone(),
                version,
                api_version,
                kind: chosen.kind.clone(),
                plural: chosen.plural.clone(),
            },
            namespaced: chosen.namespaced,
        })
    }

    /// Scope lookup only
    pub fn is_namespaced(
        &self,
        kind: &str,
        group: &str,
        api_version: &str,
    ) -> Result<bool, TraceError> {
        self.resolve(kind, group, api_version).map(|r| r.namespaced)
    }
}

/// `xstorages.example.org` with no explicit group -> (`xstorages`, `example.org`)
fn split_qualified<'a>(kind: &'a str, group: &'a str) -> (&'a str, &'a str) {
    if group.is_empty() {
        if let Some((resource, qualified_group)) = kind.split_once('.') {
            return (resource, qualified_group);
        }
    }
    (kind, group)
}

/// (`Some(group)`, `Some(version)`) from an apiVersion; a bare version means the core group
fn split_api_version(api_version: &str) -> (Option<&str>, Option<&str>) {
    if api_version.is_empty() {
        return (None, None);
    }
    match api_version.split_once('/') {
        Some((group, version)) => (Some(group), Some(version).filter(|v| !v.is_empty())),
        None => (Some(""), Some(api_version)),
    }
}

fn matches_token(resource: &DiscoveredResource, token: &str) -> bool {
    resource.plural == token
        || resource.singular == token
        || resource.kind.to_lowercase() == token
        || resource.short_names.iter().any(|s| s == token)
}
