//! Kubernetes client module
//!
//! Handles connection to the Kubernetes API server and provides a configured
//! client for the watchers.
//!
//! A `proxy-url` set in the kubeconfig is honoured through kube's
//! `http-proxy` feature.

use anyhow::{Context, Result};
use kube::{Client, Config};

/// Initialize and return a Kubernetes client
///
/// Uses the default kubeconfig loading strategy:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
pub async fn create_client() -> Result<Client> {
    let config = Config::infer()
        .await
        .context("Failed to infer Kubernetes configuration")?;

    tracing::info!(
        "Connecting to {} (default namespace {})",
        config.cluster_url,
        config.default_namespace
    );

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Namespace from `--namespace`, falling back to the configured one
pub fn resolve_namespace(flag: Option<&str>, configured: &str) -> String {
    match flag {
        Some(ns) if !ns.is_empty() => ns.to_string(),
        _ => configured.to_string(),
    }
}
