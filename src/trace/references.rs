//! Reference field extraction and type token parsing

use serde_json::Value;

use crate::trace::error::TraceError;

/// A child reference read from `spec.resourceRef` or `spec.resourceRefs[]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub name: String,
    pub kind: String,
    pub api_version: String,
    /// Explicit namespace on the reference, overrides the inherited one
    pub namespace: Option<String>,
}

/// Reference entry as found in the document, possibly malformed
///
/// Malformed entries keep whatever identity could be read so that a failed
/// node can still be shown in place.
#[derive(Debug, Clone, PartialEq)]
pub enum RefEntry {
    Valid(ChildRef),
    Malformed {
        kind: String,
        name: String,
        api_version: String,
        error: TraceError,
    },
}

/// Collect the child references of an object document
///
/// `spec.resourceRef` wins over `spec.resourceRefs`; `null` counts as absent.
/// `owner` is used for error paths only.
pub fn child_refs(document: &Value, owner: &str) -> Vec<RefEntry> {
    let spec = document.get("spec");

    if let Some(single) = spec.and_then(|s| s.get("resourceRef")).filter(|v| !v.is_null()) {
        let path = format!("{} spec.resourceRef", owner);
        return vec![parse_ref(single, &path)];
    }

    match spec.and_then(|s| s.get("resourceRefs")).filter(|v| !v.is_null()) {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| parse_ref(item, &format!("{} spec.resourceRefs[{}]", owner, idx)))
            .collect(),
        Some(_) => vec![RefEntry::Malformed {
            kind: String::new(),
            name: String::new(),
            api_version: String::new(),
            error: TraceError::MalformedReference {
                path: format!("{} spec.resourceRefs", owner),
                reason: "expected a sequence of references".to_string(),
            },
        }],
    }
}

fn parse_ref(value: &Value, path: &str) -> RefEntry {
    let field = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if !value.is_object() {
        return RefEntry::Malformed {
            kind: String::new(),
            name: String::new(),
            api_version: String::new(),
            error: TraceError::MalformedReference {
                path: path.to_string(),
                reason: "expected a mapping".to_string(),
            },
        };
    }

    let name = field("name");
    let kind = field("kind");
    let api_version = field("apiVersion");

    match (name, kind, api_version) {
        (Some(name), Some(kind), Some(api_version)) => RefEntry::Valid(ChildRef {
            name,
            kind,
            api_version,
            namespace: field("namespace"),
        }),
        (name, kind, api_version) => {
            let missing: Vec<&str> = [
                ("name", name.is_none()),
                ("kind", kind.is_none()),
                ("apiVersion", api_version.is_none()),
            ]
            .into_iter()
            .filter(|(_, absent)| *absent)
            .map(|(key, _)| key)
            .collect();

            RefEntry::Malformed {
                kind: kind.unwrap_or_default(),
                name: name.unwrap_or_default(),
                api_version: api_version.unwrap_or_default(),
                error: TraceError::MalformedReference {
                    path: path.to_string(),
                    reason: format!("missing {}", missing.join(", ")),
                },
            }
        }
    }
}

/// A user supplied type token: `TYPE[.GROUP][/VERSION]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeRef {
    /// Kind, plural, singular or short name
    pub resource: String,
    pub group: String,
    pub version: String,
}

impl TypeRef {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        let (resource_group, version) = match token.split_once('/') {
            Some((rg, v)) => (rg, v),
            None => (token, ""),
        };
        let (resource, group) = match resource_group.split_once('.') {
            Some((r, g)) => (r, g),
            None => (resource_group, ""),
        };

        Self {
            resource: resource.to_string(),
            group: group.to_string(),
            version: version.to_string(),
        }
    }
}
