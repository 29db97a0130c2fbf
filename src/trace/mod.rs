//! Resource tree resolution
//!
//! Resolves a claim or composite resource into the tree of objects it
//! references through `spec.resourceRef`/`spec.resourceRefs`, attaches the
//! latest event of every node, and diagnoses unhealthy nodes.

mod builder;
mod diagnose;
mod error;
mod fetch;
mod models;
mod references;
mod resolver;

pub use builder::{ChildErrorPolicy, GraphBuilder, TraceOptions};
pub use diagnose::{Diagnosis, Finding, LineageReport, diagnose, unhealthy_with_lineage};
pub use error::TraceError;
pub use fetch::{EventOrder, FetchedObject, ObjectFetcher, effective_namespace, latest_event};
pub use models::{
    BranchFailure, CONDITION_READY, CONDITION_SYNCED, Condition, ResourceNode, api_group_of,
};
pub use references::{ChildRef, RefEntry, TypeRef, child_refs};
pub use resolver::{ResolvedType, TypeResolver};
