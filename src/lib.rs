//! # kubexec - run commands inside Kubernetes containers, over the API
//!
//! kubexec executes commands in running containers through the Kubernetes
//! API's exec sub-protocol, without shelling out to `kubectl`. It collects
//! stdout, stderr, and the exit code of the remote process, and it works
//! around the protocol's one sharp edge: there is no way to half-close the
//! duplex stream, so remote commands that read stdin to end-of-input would
//! hang forever. kubexec substitutes a counting shell pipeline that lets
//! the remote reader observe end-of-input after exactly the right number of
//! bytes, while preserving the command's exit code (POSIX pipelines exit
//! with their last stage).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  CLI / module surface                    │
//! │        (k8s_exec, k8s_api_call, clap-based CLI)          │
//! └─────────────────────────────────────────────────────────┘
//!                │                          │
//!                ▼                          ▼
//! ┌──────────────────────────┐   ┌─────────────────────────┐
//! │    Credential Resolver    │   │      Exec Engine        │
//! │  (kubeconfig args/vars/   │   │  (command synthesis,    │
//! │   env -> kube::Client)    │   │   demux loop, status    │
//! │                           │   │   decoding)             │
//! └──────────────────────────┘   └─────────────────────────┘
//!                │                          │
//!                └────────────┬─────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              Transport (kube websocket exec)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use kubexec::exec::{execute, ExecOptions, ExecTarget, KubeTransport};
//! use kubexec::kubeconfig::Kubeconfig;
//!
//! #[tokio::main]
//! async fn main() -> kubexec::Result<()> {
//!     let client = Kubeconfig::default_chain().api_client().await?;
//!     let transport = KubeTransport::new(client);
//!
//!     let target = ExecTarget::new("default", "my-pod", vec!["wc".into(), "-c".into()]);
//!     let options = ExecOptions::new().stdin("hello");
//!
//!     let result = execute(&transport, &target, &options).await?;
//!     println!("rc={} stdout={}", result.exit_code, result.stdout_lossy());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod exec;
pub mod kubeconfig;
pub mod modules;

pub use error::{Error, Result};
pub use exec::{
    execute, ExecError, ExecOptions, ExecResult, ExecStream, ExecTarget, KubeTransport,
    StatusPayload, Transport, TransportError,
};
pub use kubeconfig::{ConfigError, CredentialSource, Kubeconfig};
pub use modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
};
