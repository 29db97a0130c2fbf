//! `describe` and `diagnose` command handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{Config, paths};
use crate::kube::cluster::KubeCluster;
use crate::kube::create_client;
use crate::kube::discovery::DiscoveryCache;
use crate::render::{
    Field, OutputFormat, default_describe_fields, default_diagnose_fields, dot::is_png_path,
    dot::render_dot, dot::write_png, json::render_json, json::render_lineage_json, parse_fields, table::render_lineage_table,
    table::render_table,
};
use crate::trace::{Diagnosis, GraphBuilder, ResourceNode, TypeRef, diagnose, unhealthy_with_lineage};

/// Arguments shared by `describe` and `diagnose`
#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    /// Resource type as TYPE[.GROUP][/VERSION], e.g. xobjectstorage.my-fqdn.cloud/v1alpha1
    pub resource: String,

    /// Resource name
    pub name: String,

    /// Namespace of namespaced roots (defaults to config `defaultNamespace`)
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Path to a kubeconfig file
    #[arg(short = 'k', long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Output format (defaults to config `output`)
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Comma separated fields: parent, name, kind, namespace, apiversion, synced, ready, message, event
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Write the output to this file instead of stdout; graph output to a `.png` path is rendered as an image
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Ignore cached API discovery
    #[arg(long)]
    pub refresh_discovery: bool,
}

/// Arguments of `diagnose`
#[derive(Args, Debug, Clone)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    /// Report every unhealthy resource with its full ancestry instead of a flat list
    #[arg(long)]
    pub lineage: bool,
}

/// Build and render the full tree
pub async fn handle_describe(args: TraceArgs, config: &Config) -> Result<()> {
    let fields = resolve_fields(
        args.fields.as_deref(),
        &config.describe_fields,
        default_describe_fields,
    )?;
    let format = args.output.unwrap_or(config.output);

    let root = build_tree(&args, config).await?;
    let rendered = render_tree(&root, format, &fields)?;
    write_output(&rendered, args.path.as_deref(), format == OutputFormat::Graph)
}

/// Build the tree and report its unhealthy resources
pub async fn handle_diagnose(args: DiagnoseArgs, config: &Config) -> Result<()> {
    let trace = args.trace;
    let fields = resolve_fields(
        trace.fields.as_deref(),
        &config.diagnose_fields,
        default_diagnose_fields,
    )?;
    let format = args_format(&trace, config, args.lineage)?;

    let root = build_tree(&trace, config).await?;

    if args.lineage {
        let report = unhealthy_with_lineage(&root);
        let rendered = if report.is_empty() {
            no_findings_message(&root)
        } else if format == OutputFormat::Json {
            render_lineage_json(&report)?
        } else {
            format!("{}\n{}", FINDINGS_HEADER, render_lineage_table(&report, &fields))
        };
        return write_output(&rendered, trace.path.as_deref(), false);
    }

    let diagnosis = diagnose(&root);
    let rendered = diagnosis_output(&root, &diagnosis, format, &fields)?;
    let is_graph = format == OutputFormat::Graph && !diagnosis.is_empty();
    write_output(&rendered, trace.path.as_deref(), is_graph)
}

const FINDINGS_HEADER: &str = "Identified the following resources as potentially unhealthy.";

fn no_findings_message(root: &ResourceNode) -> String {
    format!(
        "Couldn't diagnose any issue with resource {} {}.\n",
        root.kind(),
        root.name()
    )
}

/// Text printed by `diagnose` for a flattened diagnosis
pub fn diagnosis_output(
    root: &ResourceNode,
    diagnosis: &Diagnosis,
    format: OutputFormat,
    fields: &[Field],
) -> Result<String> {
    let Some(tree) = diagnosis.tree() else {
        return Ok(no_findings_message(root));
    };

    Ok(match format {
        OutputFormat::Cli => format!("{}\n{}", FINDINGS_HEADER, render_table(tree, fields)),
        other => render_tree(tree, other, fields)?,
    })
}

/// Render a tree in the requested format
pub fn render_tree(root: &ResourceNode, format: OutputFormat, fields: &[Field]) -> Result<String> {
    match format {
        OutputFormat::Cli => Ok(render_table(root, fields)),
        OutputFormat::Graph => Ok(render_dot(root, fields)),
        OutputFormat::Json => render_json(root),
    }
}

/// Fields from the command line, else from config, else built-in defaults
pub fn resolve_fields(
    cli: Option<&[String]>,
    configured: &[String],
    defaults: fn() -> Vec<Field>,
) -> Result<Vec<Field>> {
    match cli {
        Some(names) if !names.is_empty() => parse_fields(names),
        _ if !configured.is_empty() => {
            parse_fields(configured).context("Invalid fields in configuration")
        }
        _ => Ok(defaults()),
    }
}

fn args_format(args: &TraceArgs, config: &Config, lineage: bool) -> Result<OutputFormat> {
    let format = args.output.unwrap_or(config.output);
    if lineage && format == OutputFormat::Graph {
        anyhow::bail!("--lineage supports cli and json output only");
    }
    Ok(format)
}

async fn build_tree(args: &TraceArgs, config: &Config) -> Result<ResourceNode> {
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| config.default_namespace.clone());
    let type_ref = TypeRef::parse(&args.resource);

    let connection = create_client(args.kubeconfig.as_deref(), args.context.as_deref()).await?;
    let mut cluster = KubeCluster::new(connection.client, connection.cluster_url.clone());

    if config.discovery.cache_enabled {
        let cache = DiscoveryCache::new(
            paths::discovery_cache_dir(),
            config.discovery.cache_ttl_seconds,
        );
        if args.refresh_discovery {
            cache.invalidate(&connection.cluster_url);
        }
        cluster = cluster.with_discovery_cache(cache);
    }

    let builder = GraphBuilder::connect(cluster, config.traversal.trace_options())
        .await
        .context("Failed to discover API resources")?;

    builder
        .build(
            &type_ref.resource,
            &type_ref.group,
            &type_ref.version,
            &args.name,
            &namespace,
        )
        .await
        .with_context(|| format!("Failed to build resource tree for {} {}", args.resource, args.name))
}

/// Print `rendered`, or write it to `path`; DOT sent to a `.png` path is rendered
fn write_output(rendered: &str, path: Option<&Path>, is_graph: bool) -> Result<()> {
    match path {
        Some(path) if is_graph && is_png_path(path) => {
            write_png(rendered, path)?;
            eprintln!("Graph written to {}", path.display());
        }
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            eprintln!("Output written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
