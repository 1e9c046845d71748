//! Orchestrator gateway (spec.md §4.2): app inventory and replica/memory
//! mutation. Grounded on `original_source/src/marathon.py`.

use crate::error::GatewayError;
use crate::types::{AppDefinition, AppId, TaskHost, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Interval the deployment-quiescence poll waits between checks (spec.md
/// §4.2).
const DEPLOYMENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[async_trait]
pub trait OrchestratorGateway: Send + Sync {
    async fn list_apps(&self) -> Result<Vec<AppId>, GatewayError>;
    async fn app_definition(&self, app: &AppId) -> Result<Option<AppDefinition>, GatewayError>;
    async fn set_replicas(&self, app: &AppId, instances: u32) -> Result<bool, GatewayError>;
    async fn set_memory(&self, app: &AppId, mem_mb: f64) -> Result<bool, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct AppsListResponse {
    apps: Vec<AppIdEntry>,
}

#[derive(Debug, Deserialize)]
struct AppIdEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AppDetailResponse {
    app: AppDetail,
}

#[derive(Debug, Deserialize)]
struct AppDetail {
    #[serde(default)]
    mem: f64,
    #[serde(default)]
    cpus: f64,
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    id: String,
    host: String,
}

#[derive(Debug, Serialize)]
struct InstancesBody {
    instances: u32,
}

#[derive(Debug, Serialize)]
struct MemBody {
    mem: f64,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(rename = "deploymentId")]
    deployment_id: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    id: String,
}

pub struct MarathonGateway {
    client: reqwest::Client,
    base_url: String,
    user: Option<String>,
    pass: Option<String>,
}

impl MarathonGateway {
    pub fn new(base_url: impl Into<String>, user: Option<String>, pass: Option<String>, danger_accept_invalid_certs: bool) -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(danger_accept_invalid_certs)
            .timeout(Duration::from_secs(5))
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

    /// Poll `/v2/deployments` until no entry with `deployment_id` remains
    /// (spec.md §9 re-specification of the original's early-exit wait loop).
    async fn wait_for_deployment(&self, deployment_id: &str) -> Result<(), GatewayError> {
        loop {
            let url = format!("{}/v2/deployments", self.base_url);
            let req = self.authed(self.client.get(&url));
            let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
            let deployments: Vec<DeploymentEntry> = resp
                .json()
                .await
                .map_err(|source| GatewayError::Decode { target: url, source })?;
            if !deployments.iter().any(|d| d.id == deployment_id) {
                return Ok(());
            }
            tokio::time::sleep(DEPLOYMENT_POLL_INTERVAL).await;
        }
    }

    async fn put_mutation<B: Serialize + Sync>(&self, app: &AppId, body: &B) -> Result<bool, GatewayError> {
        let url = format!("{}/v2/apps/{}", self.base_url, app.as_str());
        let req = self.authed(self.client.put(&url).header("Content-type", "application/json").json(body));
        let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
        let status = resp.status();
        if !status.is_success() {
            let err = GatewayError::MutationRejected { app: app.as_str().to_string(), status: status.as_u16() };
            tracing::error!(error = %err, "orchestrator rejected mutation");
            return Ok(false);
        }
        let mutation: MutationResponse = resp
            .json()
            .await
            .map_err(|source| GatewayError::Decode { target: url, source })?;
        self.wait_for_deployment(&mutation.deployment_id).await?;
        Ok(true)
    }
}

#[async_trait]
impl OrchestratorGateway for MarathonGateway {
    async fn list_apps(&self) -> Result<Vec<AppId>, GatewayError> {
        let url = format!("{}/v2/apps", self.base_url);
        let req = self.authed(self.client.get(&url));
        let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
        let parsed: AppsListResponse = resp
            .json()
            .await
            .map_err(|source| GatewayError::Decode { target: url, source })?;
        Ok(parsed.apps.into_iter().map(|e| AppId::new(e.id)).collect())
    }

    async fn app_definition(&self, app: &AppId) -> Result<Option<AppDefinition>, GatewayError> {
        let url = format!("{}/v2/apps/{}", self.base_url, app.as_str());
        let req = self.authed(self.client.get(&url));
        let resp = req.send().await.map_err(|source| GatewayError::TransientFetch { target: url.clone(), source })?;
        let parsed: AppDetailResponse = resp
            .json()
            .await
            .map_err(|source| GatewayError::Decode { target: url, source })?;
        if parsed.app.tasks.is_empty() {
            return Ok(None);
        }
        let tasks: HashMap<TaskId, TaskHost> = parsed
            .app
            .tasks
            .into_iter()
            .map(|t| (TaskId(t.id), TaskHost { host: t.host }))
            .collect();
        Ok(Some(AppDefinition { cpus: parsed.app.cpus, mem_mb: parsed.app.mem, tasks }))
    }

    async fn set_replicas(&self, app: &AppId, instances: u32) -> Result<bool, GatewayError> {
        self.put_mutation(app, &InstancesBody { instances }).await
    }

    async fn set_memory(&self, app: &AppId, mem_mb: f64) -> Result<bool, GatewayError> {
        self.put_mutation(app, &MemBody { mem: mem_mb }).await
    }
}
