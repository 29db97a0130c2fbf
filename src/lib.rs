//! xptrace library
//!
//! Resolves Crossplane claims and composite resources into the tree of
//! managed resources they reference, and renders or diagnoses that tree.
//! Used by the `xptrace` binary and by the integration tests.

pub mod cli;
pub mod config;
pub mod kube;
pub mod render;
pub mod trace;

pub use trace::{
    ChildErrorPolicy, Diagnosis, GraphBuilder, ResourceNode, TraceError, TraceOptions, diagnose,
};
