//! Kubernetes client module
//!
//! Builds the client used for discovery, object reads and event listings.
//! Proxy settings from `HTTP_PROXY`/`HTTPS_PROXY` are honoured by kube's
//! `http-proxy` and `socks5` features through the kubeconfig `proxy-url`.

pub mod cluster;
pub mod discovery;

use std::path::Path;

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// A connected client plus the API server it talks to
#[derive(Clone)]
pub struct Connection {
    pub client: Client,
    /// API server URL, used to key the discovery cache
    pub cluster_url: String,
}

/// Create a client
///
/// With an explicit `kubeconfig` path that file is used. Otherwise the
/// default loading strategy applies:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
///
/// `context` selects a kubeconfig context other than the current one.
pub async fn create_client(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Connection> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match (kubeconfig, context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context("Failed to load kubeconfig")?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .context("Failed to load kubeconfig context")?,
        (None, None) => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    let cluster_url = config.cluster_url.to_string();
    tracing::debug!("Connecting to {}", cluster_url);

    let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
    Ok(Connection {
        client,
        cluster_url,
    })
}
