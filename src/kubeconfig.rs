//! Kubernetes credential resolution.
//!
//! Modules and the CLI receive their credentials the way the task surface
//! hands them over: an inline kubeconfig document or file path in the task
//! arguments, the `ansible_k8s_kubeconfig` task variable, or the
//! `K8S_AUTH_KUBECONFIG` environment variable, in that order of precedence.
//! When none of those are present the client library's default loading
//! chain applies (`$KUBECONFIG`, `~/.kube/config`, in-cluster service
//! account). The resolved source is turned into an authenticated
//! [`kube::Client`]; nothing downstream ever touches raw credentials.

use std::collections::HashMap;
use std::path::PathBuf;

use kube::config::{KubeConfigOptions, Kubeconfig as KubeconfigFile};
use kube::{Client, Config};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Task variable holding a kubeconfig document or path.
pub const KUBECONFIG_VAR: &str = "ansible_k8s_kubeconfig";

/// Environment variable holding a kubeconfig path.
pub const KUBECONFIG_ENV: &str = "K8S_AUTH_KUBECONFIG";

/// Errors raised while resolving credentials or building a client.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The kubeconfig material does not parse or cannot be used.
    #[error("invalid kubeconfig: {0}")]
    Invalid(String),

    /// The kubeconfig source could not be read.
    #[error("failed to read kubeconfig: {0}")]
    Unreadable(String),

    /// The client could not be constructed from a valid config.
    #[error("failed to build Kubernetes client: {0}")]
    Client(String),
}

/// Where the credentials come from, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A deserialized kubeconfig document supplied inline.
    Inline(Value),
    /// A kubeconfig file on disk.
    Path(PathBuf),
    /// The client library's default loading chain.
    Default,
}

/// Resolved access to the cluster: a credential source plus an optional
/// context selection.
#[derive(Debug, Clone)]
pub struct Kubeconfig {
    source: CredentialSource,
    context: Option<String>,
}

impl Kubeconfig {
    /// Resolve credentials from task arguments and task variables.
    ///
    /// An explicit `kubeconfig` argument wins; the `ansible_k8s_kubeconfig`
    /// variable is consulted only when the argument is absent, and the
    /// `K8S_AUTH_KUBECONFIG` environment variable only after that. A string
    /// value is a file path; a mapping is an inline kubeconfig document.
    pub fn resolve(params: &HashMap<String, Value>, vars: &HashMap<String, Value>) -> Self {
        Self::resolve_with_env(params, vars, std::env::var(KUBECONFIG_ENV).ok())
    }

    fn resolve_with_env(
        params: &HashMap<String, Value>,
        vars: &HashMap<String, Value>,
        env_path: Option<String>,
    ) -> Self {
        let context = params
            .get("context")
            .and_then(Value::as_str)
            .map(str::to_string);

        let source = params
            .get("kubeconfig")
            .filter(|value| !value.is_null())
            .or_else(|| vars.get(KUBECONFIG_VAR).filter(|value| !value.is_null()))
            .map(Self::classify)
            .or_else(|| env_path.map(|path| CredentialSource::Path(PathBuf::from(path))))
            .unwrap_or(CredentialSource::Default);

        Self { source, context }
    }

    fn classify(value: &Value) -> CredentialSource {
        match value {
            Value::String(path) => CredentialSource::Path(PathBuf::from(path)),
            document => CredentialSource::Inline(document.clone()),
        }
    }

    /// Use a kubeconfig file at an explicit path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: CredentialSource::Path(path.into()),
            context: None,
        }
    }

    /// Use the client library's default loading chain.
    pub fn default_chain() -> Self {
        Self {
            source: CredentialSource::Default,
            context: None,
        }
    }

    /// Select a kubeconfig context instead of the current one.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Build an authenticated client from the resolved source.
    pub async fn api_client(&self) -> Result<Client, ConfigError> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            cluster: None,
            user: None,
        };

        let config = match &self.source {
            CredentialSource::Inline(document) => {
                let kubeconfig: KubeconfigFile = serde_json::from_value(document.clone())
                    .map_err(|e| {
                        ConfigError::Invalid(format!("inline kubeconfig does not parse: {}", e))
                    })?;
                debug!("using inline kubeconfig document");
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| {
                        ConfigError::Invalid(format!("inline kubeconfig is unusable: {}", e))
                    })?
            }
            CredentialSource::Path(path) => {
                let kubeconfig = KubeconfigFile::read_from(path).map_err(|e| {
                    ConfigError::Unreadable(format!("{}: {}", path.display(), e))
                })?;
                debug!(path = %path.display(), "using kubeconfig file");
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?
            }
            CredentialSource::Default => Config::infer().await.map_err(|e| {
                ConfigError::Unreadable(format!("default kubeconfig chain: {}", e))
            })?,
        };

        Client::try_from(config).map_err(|e| ConfigError::Client(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn params_with(key: &str, value: Value) -> HashMap<String, Value> {
        let mut params = HashMap::new();
        params.insert(key.to_string(), value);
        params
    }

    const MINIMAL_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: test
  cluster:
    server: https://127.0.0.1:6443
users:
- name: test
  user:
    token: sekret
contexts:
- name: test
  context:
    cluster: test
    user: test
current-context: test
"#;

    #[test]
    fn explicit_path_argument_wins() {
        let params = params_with("kubeconfig", json!("/etc/kube/admin.conf"));
        let mut vars = HashMap::new();
        vars.insert(KUBECONFIG_VAR.to_string(), json!("/var/ansible.conf"));

        let resolved =
            Kubeconfig::resolve_with_env(&params, &vars, Some("/env/config".to_string()));

        assert_eq!(
            *resolved.source(),
            CredentialSource::Path(PathBuf::from("/etc/kube/admin.conf"))
        );
    }

    #[test]
    fn inline_document_argument_is_recognized() {
        let document = json!({"apiVersion": "v1", "kind": "Config"});
        let params = params_with("kubeconfig", document.clone());

        let resolved = Kubeconfig::resolve_with_env(&params, &HashMap::new(), None);

        assert_eq!(*resolved.source(), CredentialSource::Inline(document));
    }

    #[test]
    fn task_variable_is_used_when_argument_absent() {
        let mut vars = HashMap::new();
        vars.insert(KUBECONFIG_VAR.to_string(), json!({"kind": "Config"}));

        let resolved = Kubeconfig::resolve_with_env(
            &HashMap::new(),
            &vars,
            Some("/env/config".to_string()),
        );

        assert_eq!(
            *resolved.source(),
            CredentialSource::Inline(json!({"kind": "Config"}))
        );
    }

    #[test]
    fn environment_is_the_last_explicit_source() {
        let resolved = Kubeconfig::resolve_with_env(
            &HashMap::new(),
            &HashMap::new(),
            Some("/env/config".to_string()),
        );

        assert_eq!(
            *resolved.source(),
            CredentialSource::Path(PathBuf::from("/env/config"))
        );
    }

    #[test]
    fn falls_back_to_default_chain() {
        let resolved = Kubeconfig::resolve_with_env(&HashMap::new(), &HashMap::new(), None);

        assert_eq!(*resolved.source(), CredentialSource::Default);
    }

    #[test]
    fn null_argument_is_tolerated() {
        let params = params_with("kubeconfig", Value::Null);

        let resolved = Kubeconfig::resolve_with_env(&params, &HashMap::new(), None);

        assert_eq!(*resolved.source(), CredentialSource::Default);
    }

    #[test]
    fn context_argument_is_captured() {
        let mut params = params_with("kubeconfig", json!("/etc/kube/admin.conf"));
        params.insert("context".to_string(), json!("staging"));

        let resolved = Kubeconfig::resolve_with_env(&params, &HashMap::new(), None);

        assert_eq!(resolved.context.as_deref(), Some("staging"));
    }

    #[tokio::test]
    async fn builds_client_from_kubeconfig_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL_KUBECONFIG.as_bytes()).unwrap();

        let client = Kubeconfig::from_path(file.path()).api_client().await;

        assert!(client.is_ok(), "client build failed: {:?}", client.err());
    }

    #[tokio::test]
    async fn rejects_missing_kubeconfig_file() {
        let result = Kubeconfig::from_path("/nonexistent/kubeconfig")
            .api_client()
            .await;

        assert!(matches!(result, Err(ConfigError::Unreadable(_))));
    }

    #[tokio::test]
    async fn rejects_malformed_inline_document() {
        let params = params_with("kubeconfig", json!({"clusters": "not-a-list"}));
        let resolved = Kubeconfig::resolve_with_env(&params, &HashMap::new(), None);

        let result = resolved.api_client().await;

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn selects_context_from_inline_document() {
        let document: Value =
            serde_yaml::from_str(MINIMAL_KUBECONFIG).expect("fixture parses");
        let params = params_with("kubeconfig", document);
        let resolved = Kubeconfig::resolve_with_env(&params, &HashMap::new(), None)
            .with_context("test");

        let client = resolved.api_client().await;

        assert!(client.is_ok(), "client build failed: {:?}", client.err());
    }
}
