//! Orchestrator boundary: the `apps/v1` deployments scale subresource.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ScaleError, ScaleResult};

/// Identifies the workload whose replica count is managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRef {
    pub name: String,
    pub namespace: String,
}

impl WorkloadRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The orchestrator boundary.
///
/// The replica count lives in the orchestrator; callers read it fresh
/// before every write and nothing below this trait caches it.
#[async_trait]
pub trait ReplicaApi: Send + Sync {
    /// Read the workload's current replica count.
    async fn current_replicas(&self, workload: &WorkloadRef) -> ScaleResult<u32>;

    /// Set the workload's replica count.
    async fn set_replicas(&self, workload: &WorkloadRef, replicas: u32) -> ScaleResult<()>;
}

/// Scale subresource object, reduced to the field we touch.
#[derive(Debug, Default, Deserialize)]
struct ScaleObject {
    #[serde(default)]
    spec: ScaleSpec,
}

#[derive(Debug, Default, Deserialize)]
struct ScaleSpec {
    replicas: Option<u32>,
}

const SERVICEACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Talks to the Kubernetes API server:
///
/// ```text
/// GET   {base}/apis/apps/v1/namespaces/{ns}/deployments/{name}/scale
/// PATCH {base}/apis/apps/v1/namespaces/{ns}/deployments/{name}/scale
///       Content-Type: application/merge-patch+json
///       {"spec": {"replicas": N}}
/// ```
pub struct KubeScaleApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl KubeScaleApi {
    /// Build against an explicit API server base URL with no bearer token,
    /// e.g. a `kubectl proxy` endpoint for out-of-cluster runs.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> ScaleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Build from the in-cluster service account environment: API server
    /// address from `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT`,
    /// bearer token and cluster CA from the standard secret mount.
    pub fn from_cluster_env(request_timeout: Duration) -> ScaleResult<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| ScaleError::Credentials("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let port =
            std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        let token = std::fs::read_to_string(format!("{SERVICEACCOUNT_DIR}/token"))
            .map_err(|e| ScaleError::Credentials(format!("reading service account token: {e}")))?;
        let ca_pem = std::fs::read(format!("{SERVICEACCOUNT_DIR}/ca.crt"))
            .map_err(|e| ScaleError::Credentials(format!("reading cluster CA: {e}")))?;
        let ca = reqwest::Certificate::from_pem(&ca_pem)?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .add_root_certificate(ca)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("https://{host}:{port}"),
            bearer_token: Some(token.trim().to_string()),
        })
    }

    fn scale_url(&self, workload: &WorkloadRef) -> String {
        format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}/scale",
            self.base_url, workload.namespace, workload.name
        )
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ReplicaApi for KubeScaleApi {
    async fn current_replicas(&self, workload: &WorkloadRef) -> ScaleResult<u32> {
        let request = self.with_auth(self.client.get(self.scale_url(workload)));
        let scale: ScaleObject = request.send().await?.error_for_status()?.json().await?;

        scale
            .spec
            .replicas
            .ok_or_else(|| ScaleError::MissingReplicas(workload.to_string()))
    }

    async fn set_replicas(&self, workload: &WorkloadRef, replicas: u32) -> ScaleResult<()> {
        let body = json!({"spec": {"replicas": replicas}});
        let request = self
            .with_auth(self.client.patch(self.scale_url(workload)))
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .body(body.to_string());

        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_ref_displays_namespace_then_name() {
        let workload = WorkloadRef::new("worker", "jobs");
        assert_eq!(workload.to_string(), "jobs/worker");
    }

    #[test]
    fn scale_url_addresses_the_scale_subresource() {
        let api = KubeScaleApi::new("http://127.0.0.1:8001/", Duration::from_secs(5)).unwrap();
        let workload = WorkloadRef::new("worker", "jobs");

        assert_eq!(
            api.scale_url(&workload),
            "http://127.0.0.1:8001/apis/apps/v1/namespaces/jobs/deployments/worker/scale"
        );
    }

    #[test]
    fn deserializes_a_scale_object() {
        let body = r#"{
            "kind": "Scale",
            "apiVersion": "autoscaling/v1",
            "metadata": {"name": "worker", "namespace": "jobs"},
            "spec": {"replicas": 3},
            "status": {"replicas": 3, "selector": "app=worker"}
        }"#;

        let scale: ScaleObject = serde_json::from_str(body).unwrap();
        assert_eq!(scale.spec.replicas, Some(3));
    }

    #[test]
    fn tolerates_a_scale_object_without_spec() {
        let scale: ScaleObject = serde_json::from_str(r#"{"kind": "Scale"}"#).unwrap();
        assert_eq!(scale.spec.replicas, None);
    }

    #[test]
    fn merge_patch_body_sets_spec_replicas() {
        let body = json!({"spec": {"replicas": 4}});
        assert_eq!(body.to_string(), r#"{"spec":{"replicas":4}}"#);
    }
}
