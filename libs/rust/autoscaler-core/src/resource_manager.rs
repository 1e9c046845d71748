//! Resource-manager gateway (spec.md §4.1): cluster-wide free CPU/memory and
//! per-agent task statistics. Grounded on `original_source/src/mesos.py`.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Raw per-executor counters as reported by an agent's statistics endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawStats {
    pub cpus_system_time_secs: f64,
    pub cpus_user_time_secs: f64,
    pub mem_rss_bytes: u64,
    pub mem_limit_bytes: u64,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[async_trait]
pub trait ResourceManagerGateway: Send + Sync {
    /// Cluster-wide `cpus_total - cpus_used`.
    async fn free_cpus(&self) -> Result<f64, GatewayError>;

    /// Cluster-wide `mem_total - mem_used`, in MiB.
    async fn free_mem_mb(&self) -> Result<f64, GatewayError>;

    /// Per-executor statistics for a single agent host.
    async fn agent_task_stats(&self, host: &str) -> Result<HashMap<String, RawStats>, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct MetricsSnapshot {
    #[serde(rename = "master/cpus_total", default)]
    cpus_total: f64,
    #[serde(rename = "master/cpus_used", default)]
    cpus_used: f64,
    #[serde(rename = "master/mem_total", default)]
    mem_total: f64,
    #[serde(rename = "master/mem_used", default)]
    mem_used: f64,
}

#[derive(Debug, Deserialize)]
struct AgentStatEntry {
    executor_id: String,
    statistics: RawStats,
}

/// Fixed port every agent exposes its local statistics endpoint on.
const AGENT_STATS_PORT: u16 = 5051;

pub struct MesosGateway {
    client: reqwest::Client,
    base_url: String,
    user: Option<String>,
    pass: Option<String>,
}

impl MesosGateway {
    pub fn new(base_url: impl Into<String>, user: Option<String>, pass: Option<String>, danger_accept_invalid_certs: bool) -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(danger_accept_invalid_certs)
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self { client, base_url: base_url.into(), user, pass }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user {
            Some(user) if !user.is_empty() => builder.basic_auth(user, self.pass.clone()),
            _ => builder,
        }
    }

    async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, GatewayError> {
        let url = format!("{}/metrics/snapshot", self.base_url);
        let req = self.authed(self.client.get(&url));
        let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
        resp.json::<MetricsSnapshot>()
            .await
            .map_err(|source| GatewayError::Decode { target: url, source })
    }
}

#[async_trait]
impl ResourceManagerGateway for MesosGateway {
    async fn free_cpus(&self) -> Result<f64, GatewayError> {
        let snap = self.metrics_snapshot().await?;
        Ok(snap.cpus_total - snap.cpus_used)
    }

    async fn free_mem_mb(&self) -> Result<f64, GatewayError> {
        let snap = self.metrics_snapshot().await?;
        Ok(snap.mem_total - snap.mem_used)
    }

    async fn agent_task_stats(&self, host: &str) -> Result<HashMap<String, RawStats>, GatewayError> {
        let url = format!("http://{host}:{AGENT_STATS_PORT}/monitor/statistics.json");
        let req = self.authed(self.client.get(&url));
        let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
        let entries: Vec<AgentStatEntry> = resp
            .json()
            .await
            .map_err(|source| GatewayError::Decode { target: url, source })?;
        Ok(entries.into_iter().map(|e| (e.executor_id, e.statistics)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_stats_tolerates_missing_timestamp() {
        // Pre-0.25 Mesos omits `timestamp` entirely; the sampler falls back
        // to the local wall clock for it (spec.md §4.1/§4.4). A missing key
        // must deserialize to `None`, not fail the whole payload.
        let json = r#"{"cpus_system_time_secs":1.0,"cpus_user_time_secs":2.0,"mem_rss_bytes":10,"mem_limit_bytes":20}"#;
        let stats: RawStats = serde_json::from_str(json).expect("missing timestamp must not fail decode");
        assert_eq!(stats.timestamp, None);
    }
}
