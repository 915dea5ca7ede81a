//! # Launch plan: the configuration file handed to the tunnel core.
//!
//! Field names follow the tunnel core's JSON configuration keys. The plan is
//! rebuilt and rewritten on every launch so a rotated credential takes effect.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::TunnelConfig;
use crate::error::LaunchError;

/// Fixed sponsor id.
pub const SPONSOR_ID: &str = "00000000000000FF";
/// Fixed propagation channel id.
pub const PROPAGATION_CHANNEL_ID: &str = "00000000000000FF";

/// Tunnel core configuration for one endpoint launch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchPlan {
    #[serde(rename = "MigrateDataStoreDirectory")]
    pub data_store_directory: PathBuf,
    /// Present whenever an upstream proxy port is configured.
    #[serde(rename = "UpstreamProxyURL", skip_serializing_if = "Option::is_none")]
    pub upstream_proxy_url: Option<String>,
    #[serde(rename = "LocalSocksProxyPort")]
    pub local_socks_proxy_port: u16,
    #[serde(rename = "SponsorId")]
    pub sponsor_id: String,
    #[serde(rename = "PropagationChannelId")]
    pub propagation_channel_id: String,
    #[serde(rename = "EmitBytesTransferred")]
    pub emit_bytes_transferred: bool,
    #[serde(rename = "EmitDiagnosticNotices")]
    pub emit_diagnostic_notices: bool,
    #[serde(rename = "DisableLocalHTTPProxy")]
    pub disable_local_http_proxy: bool,
    #[serde(rename = "EgressRegion")]
    pub egress_region: String,
    #[serde(rename = "TunnelPoolSize")]
    pub tunnel_pool_size: usize,
    #[serde(rename = "ConnectionWorkerPoolSize")]
    pub connection_worker_pool_size: usize,
    #[serde(rename = "LimitTunnelProtocols")]
    pub limit_tunnel_protocols: Vec<String>,
    #[serde(rename = "Authorizations")]
    pub authorizations: Vec<String>,
}

impl LaunchPlan {
    /// Builds the plan for one launch of the endpoint at `port`.
    pub fn new(
        port: u16,
        endpoint_dir: &Path,
        tunnel: &TunnelConfig,
        upstream_proxy_port: Option<u16>,
        authorizations: Vec<String>,
    ) -> Self {
        Self {
            data_store_directory: endpoint_dir.to_path_buf(),
            upstream_proxy_url: upstream_proxy_port.map(|p| format!("http://127.0.0.1:{p}")),
            local_socks_proxy_port: port,
            sponsor_id: SPONSOR_ID.to_string(),
            propagation_channel_id: PROPAGATION_CHANNEL_ID.to_string(),
            emit_bytes_transferred: true,
            emit_diagnostic_notices: true,
            disable_local_http_proxy: true,
            egress_region: tunnel.region.to_uppercase(),
            tunnel_pool_size: tunnel.tunnel,
            connection_worker_pool_size: tunnel.tunnel_workers,
            limit_tunnel_protocols: tunnel.protocols.clone(),
            authorizations,
        }
    }

    /// Where the plan is written.
    pub fn config_path(&self) -> PathBuf {
        self.data_store_directory.join("config.json")
    }

    /// Writes the plan as JSON, creating the endpoint directory if needed.
    pub async fn write(&self) -> Result<PathBuf, LaunchError> {
        let path = self.config_path();
        let plan_err = |source: std::io::Error| LaunchError::Plan {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.data_store_directory)
            .await
            .map_err(plan_err)?;
        let body = serde_json::to_vec_pretty(self).map_err(|e| plan_err(e.into()))?;
        tokio::fs::write(&path, body).await.map_err(plan_err)?;
        Ok(path)
    }
}
