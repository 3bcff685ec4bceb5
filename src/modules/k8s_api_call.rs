//! Perform custom Kubernetes API calls.
//!
//! Lets configuration-as-code send arbitrary HTTP requests to the API
//! server with the cluster credentials already applied, for operations no
//! dedicated module covers (Rancher's Helm-install action endpoints, for
//! instance). The response body is returned as data.
//!
//! This module always reports `changed`: it cannot know whether the call's
//! post-condition was already met, so callers short-circuit it themselves
//! with a `when:` clause.
//!
//! ## Parameters
//!
//! - `method`: The HTTP method to use (required)
//! - `uri`: The relative URI below the cluster entry point, typically
//!   starting with `/v1/` or `/apis/` (required)
//! - `body`: The request body, as a data structure serialized to JSON by
//!   the module
//! - `kubeconfig` / `context`: credentials, as for `k8s_exec`
//!
//! ## Example
//!
//! ```yaml
//! - name: Install a chart through Rancher
//!   k8s_api_call:
//!     method: POST
//!     uri: /v1/catalog.cattle.io.clusterrepos/some-repo?action=install
//!     body:
//!       namespace: some-namespace
//!       charts:
//!         - chartName: some-chart
//!           releaseName: some-chart
//!           version: 1.2.3
//! ```

use async_trait::async_trait;
use tracing::debug;

use crate::kubeconfig::Kubeconfig;
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};

/// Module that sends one raw HTTP request to the API server.
pub struct K8sApiCallModule;

#[async_trait]
impl Module for K8sApiCallModule {
    fn name(&self) -> &'static str {
        "k8s_api_call"
    }

    fn description(&self) -> &'static str {
        "Perform a custom Kubernetes API call"
    }

    fn required_params(&self) -> &[&'static str] {
        &["method", "uri"]
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let method = params.get_string_required("method")?.to_uppercase();
        let uri = params.get_string_required("uri")?;
        let body = params.get("body").filter(|value| !value.is_null());

        let body_bytes = match body {
            Some(value) => serde_json::to_vec(value).map_err(|e| {
                ModuleError::InvalidParameter(format!("body does not serialize: {}", e))
            })?,
            None => Vec::new(),
        };

        let request = http::Request::builder()
            .method(method.as_str())
            .uri(uri.as_str())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body_bytes)
            .map_err(|e| {
                ModuleError::InvalidParameter(format!("cannot build API request: {}", e))
            })?;

        let client = Kubeconfig::resolve(params, &context.vars)
            .api_client()
            .await?;

        debug!(method = %method, uri = %uri, "sending API call");
        // Non-2xx responses surface as API errors from the client.
        let response: serde_json::Value = client.request(request).await.map_err(|e| {
            ModuleError::ExecutionFailed(format!("API call {} {} failed: {}", method, uri, e))
        })?;

        Ok(ModuleOutput::changed(format!("{} {}", method, uri))
            .with_data("api_response", response))
    }
}
