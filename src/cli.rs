//! Command-line interface for kubexec.
//!
//! Thin wrapper over the module layer: each subcommand is translated into a
//! module parameter map and dispatched through the registry, and the module
//! result is printed as JSON. Failures are printed as a structured failure
//! message on stderr by `main`.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use kubexec::modules::{ModuleContext, ModuleRegistry};

/// kubexec - run commands inside Kubernetes containers over the API
#[derive(Parser, Debug, Clone)]
#[command(name = "kubexec")]
#[command(author = "Kubexec Contributors")]
#[command(version)]
#[command(about = "Run commands inside Kubernetes containers over the API", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a kubeconfig file
    #[arg(long, global = true, env = "K8S_AUTH_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Execute a command inside a running container
    Exec(ExecArgs),
    /// Perform a raw API call against the cluster
    ApiCall(ApiCallArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Target namespace
    #[arg(short = 'n', long)]
    pub namespace: String,

    /// Target pod
    #[arg(short = 'p', long)]
    pub pod: String,

    /// Target container (defaults to the pod's first container)
    #[arg(short = 'c', long)]
    pub container: Option<String>,

    /// Text to pass to the remote command's standard input
    /// ('-' reads the local standard input)
    #[arg(long)]
    pub stdin: Option<String>,

    /// Send the command verbatim instead of forcing stdin closed through
    /// the counting pipeline
    #[arg(long = "no-close-stdin", action = clap::ArgAction::SetFalse)]
    pub close_stdin: bool,

    /// Overall deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// The command to execute, as discrete arguments
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ApiCallArgs {
    /// HTTP method to use
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Relative URI below the cluster entry point (e.g. /version)
    #[arg(long)]
    pub uri: String,

    /// Request body, as a JSON document
    #[arg(long)]
    pub body: Option<String>,
}

/// Dispatch the parsed CLI through the module registry and print the
/// result. Returns the process exit code.
pub async fn run(cli: Cli) -> kubexec::Result<i32> {
    let registry = ModuleRegistry::with_builtins();
    let context = ModuleContext::new();

    let (module, params) = match &cli.command {
        Commands::Exec(args) => ("k8s_exec", exec_params(args, &cli)?),
        Commands::ApiCall(args) => ("k8s_api_call", api_call_params(args, &cli)?),
    };

    let output = registry.execute(module, &params, &context).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

fn exec_params(args: &ExecArgs, cli: &Cli) -> kubexec::Result<HashMap<String, Value>> {
    let mut params = common_params(cli);
    params.insert("namespace".to_string(), json!(args.namespace));
    params.insert("pod".to_string(), json!(args.pod));
    params.insert("command".to_string(), json!(args.command));
    params.insert("close_stdin".to_string(), json!(args.close_stdin));
    if let Some(container) = &args.container {
        params.insert("container".to_string(), json!(container));
    }
    if let Some(stdin) = &args.stdin {
        let stdin = if stdin == "-" {
            std::io::read_to_string(std::io::stdin())?
        } else {
            stdin.clone()
        };
        params.insert("stdin".to_string(), json!(stdin));
    }
    if let Some(timeout) = args.timeout {
        params.insert("timeout".to_string(), json!(timeout));
    }
    Ok(params)
}

fn api_call_params(args: &ApiCallArgs, cli: &Cli) -> kubexec::Result<HashMap<String, Value>> {
    let mut params = common_params(cli);
    params.insert("method".to_string(), json!(args.method));
    params.insert("uri".to_string(), json!(args.uri));
    if let Some(body) = &args.body {
        let body: Value = serde_json::from_str(body)?;
        params.insert("body".to_string(), body);
    }
    Ok(params)
}

fn common_params(cli: &Cli) -> HashMap<String, Value> {
    let mut params = HashMap::new();
    if let Some(kubeconfig) = &cli.kubeconfig {
        params.insert(
            "kubeconfig".to_string(),
            json!(kubeconfig.display().to_string()),
        );
    }
    if let Some(context) = &cli.context {
        params.insert("context".to_string(), json!(context));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).expect("argv parses")
    }

    #[test]
    fn exec_subcommand_parses() {
        let cli = parse(&[
            "kubexec", "exec", "-n", "ns1", "-p", "p1", "--stdin", "hello", "--", "cat",
        ]);

        match &cli.command {
            Commands::Exec(args) => {
                assert_eq!(args.namespace, "ns1");
                assert_eq!(args.pod, "p1");
                assert_eq!(args.stdin.as_deref(), Some("hello"));
                assert!(args.close_stdin);
                assert_eq!(args.command, vec!["cat".to_string()]);
            }
            other => panic!("expected exec, got {:?}", other),
        }
    }

    #[test]
    fn no_close_stdin_flag_flips_default() {
        let cli = parse(&[
            "kubexec",
            "exec",
            "-n",
            "ns1",
            "-p",
            "p1",
            "--no-close-stdin",
            "--",
            "cat",
        ]);

        match &cli.command {
            Commands::Exec(args) => assert!(!args.close_stdin),
            other => panic!("expected exec, got {:?}", other),
        }
    }

    #[test]
    fn exec_requires_a_command() {
        let result = Cli::try_parse_from(["kubexec", "exec", "-n", "ns1", "-p", "p1"]);

        assert!(result.is_err());
    }

    #[test]
    fn exec_param_translation() {
        let cli = parse(&[
            "kubexec",
            "--kubeconfig",
            "/etc/kube/admin.conf",
            "--context",
            "staging",
            "exec",
            "-n",
            "ns1",
            "-p",
            "p1",
            "-c",
            "app",
            "--timeout",
            "30",
            "--",
            "ls",
            "-la",
        ]);

        let Commands::Exec(args) = &cli.command else {
            panic!("expected exec");
        };
        let params = exec_params(args, &cli).unwrap();

        assert_eq!(params["namespace"], json!("ns1"));
        assert_eq!(params["container"], json!("app"));
        assert_eq!(params["command"], json!(["ls", "-la"]));
        assert_eq!(params["close_stdin"], json!(true));
        assert_eq!(params["timeout"], json!(30));
        assert_eq!(params["kubeconfig"], json!("/etc/kube/admin.conf"));
        assert_eq!(params["context"], json!("staging"));
    }

    #[test]
    fn api_call_param_translation() {
        let cli = parse(&[
            "kubexec",
            "api-call",
            "-X",
            "POST",
            "--uri",
            "/v1/things",
            "--body",
            r#"{"key": "value"}"#,
        ]);

        let Commands::ApiCall(args) = &cli.command else {
            panic!("expected api-call");
        };
        let params = api_call_params(args, &cli).unwrap();

        assert_eq!(params["method"], json!("POST"));
        assert_eq!(params["uri"], json!("/v1/things"));
        assert_eq!(params["body"], json!({"key": "value"}));
    }

    #[test]
    fn api_call_rejects_malformed_body() {
        let cli = parse(&[
            "kubexec",
            "api-call",
            "--uri",
            "/v1/things",
            "--body",
            "{not json",
        ]);

        let Commands::ApiCall(args) = &cli.command else {
            panic!("expected api-call");
        };

        assert!(api_call_params(args, &cli).is_err());
    }
}
