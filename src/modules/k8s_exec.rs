//! Execute a command in a running container.
//!
//! Like `kubectl exec`, but over the API and with working stdin delivery:
//! the module can pass text to the remote command's standard input and
//! force-close it so POSIX filter pipelines terminate (see the exec engine
//! docs for the counting-pipeline workaround).
//!
//! A non-zero remote exit code is surfaced as `rc` data on a successful,
//! changed result; it is not a module failure. The module always reports
//! `changed`, because it cannot know what the remote command did.
//!
//! ## Parameters
//!
//! - `namespace`: Pod namespace (required)
//! - `pod`: Pod name (required)
//! - `container`: Container name (default: the pod's first container)
//! - `command`: The command to execute, as a list of strings (required)
//! - `stdin`: UTF-8 text to pass to the remote command's standard input
//! - `close_stdin`: Force-close stdin after writing it (default: true)
//! - `timeout`: Overall deadline in seconds
//! - `kubeconfig`: Kubeconfig path or inline document (default: the
//!   `ansible_k8s_kubeconfig` variable, then `K8S_AUTH_KUBECONFIG`, then
//!   the default loading chain)
//! - `context`: Kubeconfig context to use
//!
//! ## Example
//!
//! ```yaml
//! - name: Load a database dump
//!   k8s_exec:
//!     namespace: db
//!     pod: postgres-0
//!     command: [psql, -U, app]
//!     stdin: "{{ lookup('file', 'dump.sql') }}"
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::exec::{self, ExecOptions, ExecTarget, KubeTransport};
use crate::kubeconfig::Kubeconfig;
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};

/// Module that runs a command inside a running container.
pub struct K8sExecModule;

/// Parsed module parameters
#[derive(Debug, Clone)]
struct ExecConfig {
    namespace: String,
    pod: String,
    container: Option<String>,
    command: Vec<String>,
    stdin: Option<String>,
    close_stdin: bool,
    timeout: Option<u64>,
}

impl ExecConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let command = params
            .get_vec_string("command")?
            .ok_or_else(|| ModuleError::MissingParameter("command".to_string()))?;
        if command.is_empty() {
            return Err(ModuleError::InvalidParameter(
                "command must not be empty".to_string(),
            ));
        }

        Ok(Self {
            namespace: params.get_string_required("namespace")?,
            pod: params.get_string_required("pod")?,
            container: params.get_string("container")?,
            command,
            stdin: params.get_string("stdin")?,
            close_stdin: params.get_bool_or("close_stdin", true),
            timeout: params.get_u64("timeout")?,
        })
    }
}

#[async_trait]
impl Module for K8sExecModule {
    fn name(&self) -> &'static str {
        "k8s_exec"
    }

    fn description(&self) -> &'static str {
        "Execute a command inside a running container"
    }

    fn required_params(&self) -> &[&'static str] {
        &["namespace", "pod", "command"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        ExecConfig::from_params(params).map(|_| ())
    }

    // Runs in check mode too: the exec side effects are opaque, so there is
    // nothing meaningful to predict without running the command.
    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let config = ExecConfig::from_params(params)?;

        let client = Kubeconfig::resolve(params, &context.vars)
            .api_client()
            .await?;
        let transport = KubeTransport::new(client);

        let mut target = ExecTarget::new(&config.namespace, &config.pod, config.command.clone());
        if let Some(container) = &config.container {
            target = target.container(container);
        }

        let mut options = ExecOptions::new().close_stdin(config.close_stdin);
        if let Some(stdin) = &config.stdin {
            options = options.stdin(stdin.as_bytes().to_vec());
        }
        if let Some(secs) = config.timeout {
            options = options.timeout(Duration::from_secs(secs));
        }

        let result = exec::execute(&transport, &target, &options).await?;

        // Must assume a change: the remote command's effects are unknown.
        Ok(ModuleOutput::changed(format!(
            "command exited with rc {}",
            result.exit_code
        ))
        .with_command_output(
            Some(result.stdout_lossy()),
            Some(result.stderr_lossy()),
            Some(result.exit_code),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn valid_params() -> ModuleParams {
        let mut params = HashMap::new();
        params.insert("namespace".to_string(), json!("ns1"));
        params.insert("pod".to_string(), json!("p1"));
        params.insert("command".to_string(), json!(["cat"]));
        params
    }

    #[test]
    fn parses_minimal_params() {
        let config = ExecConfig::from_params(&valid_params()).unwrap();

        assert_eq!(config.namespace, "ns1");
        assert_eq!(config.pod, "p1");
        assert_eq!(config.container, None);
        assert_eq!(config.command, vec!["cat".to_string()]);
        assert!(config.close_stdin);
        assert_eq!(config.stdin, None);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn parses_full_params() {
        let mut params = valid_params();
        params.insert("container".to_string(), json!("app"));
        params.insert("stdin".to_string(), json!("hello"));
        params.insert("close_stdin".to_string(), json!(false));
        params.insert("timeout".to_string(), json!(30));

        let config = ExecConfig::from_params(&params).unwrap();

        assert_eq!(config.container.as_deref(), Some("app"));
        assert_eq!(config.stdin.as_deref(), Some("hello"));
        assert!(!config.close_stdin);
        assert_eq!(config.timeout, Some(30));
    }

    #[test]
    fn null_container_is_tolerated() {
        let mut params = valid_params();
        params.insert("container".to_string(), serde_json::Value::Null);

        let config = ExecConfig::from_params(&params).unwrap();

        assert_eq!(config.container, None);
    }

    #[test]
    fn rejects_missing_command() {
        let mut params = valid_params();
        params.remove("command");

        assert!(matches!(
            ExecConfig::from_params(&params),
            Err(ModuleError::MissingParameter(_))
        ));
    }

    #[test]
    fn rejects_empty_command() {
        let mut params = valid_params();
        params.insert("command".to_string(), json!([]));

        assert!(matches!(
            ExecConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rejects_command_given_as_string() {
        let mut params = valid_params();
        params.insert("command".to_string(), json!("ls -la"));

        assert!(matches!(
            ExecConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn module_metadata() {
        let module = K8sExecModule;

        assert_eq!(module.name(), "k8s_exec");
        assert_eq!(module.required_params(), &["namespace", "pod", "command"]);
        assert!(module.validate_params(&valid_params()).is_ok());
    }
}
