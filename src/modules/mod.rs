//! Ansible-style module layer.
//!
//! This module provides the traits, types, and registry for the kubexec
//! module system. Modules are the task-facing units of work: they take a
//! parameter map (as if from YAML, after templating), talk to the cluster,
//! and produce a structured result the hosting tool can report.

pub mod k8s_api_call;
pub mod k8s_exec;

pub use k8s_api_call::K8sApiCallModule;
pub use k8s_exec::K8sExecModule;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exec::ExecError;
use crate::kubeconfig::ConfigError;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Credential resolution failed: {0}")]
    Credentials(#[from] ConfigError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made (or may have made) changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed
    Failed,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a module execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything (or must assume it did)
    pub changed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    /// Status of the execution
    pub status: ModuleStatus,
    /// Additional data returned by the module
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
    /// Standard output (for command modules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Standard error (for command modules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Return code (for command modules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
}

impl ModuleOutput {
    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Ok,
            data: HashMap::new(),
            stdout: None,
            stderr: None,
            rc: None,
        }
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: msg.into(),
            status: ModuleStatus::Changed,
            data: HashMap::new(),
            stdout: None,
            stderr: None,
            rc: None,
        }
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status: ModuleStatus::Failed,
            data: HashMap::new(),
            stdout: None,
            stderr: None,
            rc: None,
        }
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Add stdout/stderr/rc for command outputs
    pub fn with_command_output(
        mut self,
        stdout: Option<String>,
        stderr: Option<String>,
        rc: Option<i32>,
    ) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self.rc = rc;
        self
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Task variables available to the module (credential forwarding reads
    /// `ansible_k8s_kubeconfig` from here)
    pub vars: HashMap<String, serde_json::Value>,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_vars(mut self, vars: HashMap<String, serde_json::Value>) -> Self {
        self.vars = vars;
        self
    }
}

/// Trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let _ = params;
        Ok(())
    }

    /// Execute the module with the given parameters
    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput>;
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_string_required(&self, key: &str) -> ModuleResult<String>;
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
    fn get_bool_or(&self, key: &str, default: bool) -> bool;
    fn get_u64(&self, key: &str) -> ModuleResult<Option<u64>>;
    fn get_vec_string(&self, key: &str) -> ModuleResult<Option<Vec<String>>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            // Tolerate `container: ~` and friends in YAML
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(v) => Ok(Some(v.to_string().trim_matches('"').to_string())),
        }
    }

    fn get_string_required(&self, key: &str) -> ModuleResult<String> {
        self.get_string(key)?
            .ok_or_else(|| ModuleError::MissingParameter(key.to_string()))
    }

    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        match self.get(key) {
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ModuleError::InvalidParameter(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).ok().flatten().unwrap_or(default)
    }

    fn get_u64(&self, key: &str) -> ModuleResult<Option<u64>> {
        match self.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("{} must be a positive integer", key))
            }),
            Some(serde_json::Value::String(s)) => s.parse().map(Some).map_err(|_| {
                ModuleError::InvalidParameter(format!("{} must be a positive integer", key))
            }),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a positive integer",
                key
            ))),
        }
    }

    fn get_vec_string(&self, key: &str) -> ModuleResult<Option<Vec<String>>> {
        match self.get(key) {
            Some(serde_json::Value::Array(arr)) => {
                let mut result = Vec::new();
                for item in arr {
                    match item {
                        serde_json::Value::String(s) => result.push(s.clone()),
                        v => result.push(v.to_string().trim_matches('"').to_string()),
                    }
                }
                Ok(Some(result))
            }
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be an array",
                key
            ))),
        }
    }
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(k8s_exec::K8sExecModule));
        registry.register(Arc::new(k8s_api_call::K8sApiCallModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a module by name
    pub async fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        module.validate_params(params)?;

        for param in module.required_params() {
            if !params.contains_key(*param) {
                return Err(ModuleError::MissingParameter((*param).to_string()));
            }
        }

        module.execute(params, context).await
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
