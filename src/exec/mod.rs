//! Remote command execution over the Kubernetes exec sub-protocol.
//!
//! This is the core of the crate: open a multiplexed exec stream to a
//! container, feed it standard input, demultiplex stdout and stderr, and
//! decode the terminal status message into an exit code. The transport is
//! abstracted behind the [`Transport`] and [`ExecStream`] traits so the
//! engine can be driven against a scripted stream in tests; the production
//! implementation ([`KubeTransport`]) sits on top of the `kube` crate's
//! websocket support.
//!
//! A non-zero exit code of the remote command is a normal, successful
//! [`ExecResult`]. [`ExecError`] is reserved for the cases where the exec
//! request itself went wrong: the transport broke, the platform reported a
//! `Failure` status, the status payload was malformed, or no container could
//! be resolved.
//!
//! # Example
//!
//! ```rust,ignore
//! use kubexec::exec::{execute, ExecOptions, ExecTarget, KubeTransport};
//!
//! let transport = KubeTransport::new(client);
//! let target = ExecTarget::new("default", "my-pod", vec!["cat".into()]);
//! let options = ExecOptions::new().stdin("hello");
//! let result = execute(&transport, &target, &options).await?;
//! assert_eq!(result.exit_code, 0);
//! ```

mod command;
pub mod status;
pub mod stream;
pub mod transport;

pub use status::{StatusCause, StatusDetails, StatusPayload};
pub use stream::ExecStream;
pub use transport::{KubeTransport, Transport, TransportError};

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Errors surfaced by [`execute`].
///
/// `exit_code != 0` is not represented here: a remote command that ran and
/// returned non-zero is a successful [`ExecResult`].
#[derive(Error, Debug)]
pub enum ExecError {
    /// The underlying connection could not be opened or broke mid-stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The platform reported a `Failure` status for the exec request itself
    /// (container not found, RBAC denial, ...).
    #[error("exec request failed: {0}")]
    Failed(String),

    /// The status payload did not match the protocol's expected shape.
    #[error("malformed exec status payload: {0}")]
    Decode(String),

    /// No container name was given and none could be selected from the pod.
    #[error("cannot resolve a container for pod '{namespace}/{pod}': {message}")]
    ContainerResolution {
        /// Target namespace
        namespace: String,
        /// Target pod
        pod: String,
        /// What went wrong while reading the pod
        message: String,
    },

    /// The overall deadline expired before the remote stream closed.
    #[error("exec timed out after {0} seconds")]
    Timeout(u64),

    /// The caller's cancellation token fired.
    #[error("exec cancelled")]
    Cancelled,
}

/// Coordinates of one remote execution: which container runs what.
///
/// Immutable for the duration of a call. A missing `container` is resolved
/// by [`execute`] to the first container declared on the pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    /// Target namespace
    pub namespace: String,
    /// Target pod name
    pub pod: String,
    /// Target container (None selects the pod's first container)
    pub container: Option<String>,
    /// The command to execute, as discrete arguments
    pub command: Vec<String>,
}

impl ExecTarget {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: None,
            command,
        }
    }

    /// Pin the execution to a named container.
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

/// Per-call configuration for [`execute`].
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Bytes to pass to the remote process's standard input.
    pub stdin: Option<Vec<u8>>,
    /// Substitute a stdin-closing shell pipeline for the literal command,
    /// so remote readers observe end-of-input. Only meaningful when
    /// `stdin` is set. Defaults to true.
    pub close_stdin: bool,
    /// Allocate a pseudo-terminal. Always false for batch execution; kept
    /// for transports that also serve interactive sessions.
    pub tty: bool,
    /// Capture the stdout channel. Defaults to true.
    pub capture_stdout: bool,
    /// Capture the stderr channel. Defaults to true.
    pub capture_stderr: bool,
    /// Overall deadline for the call; on expiry the stream is closed and
    /// [`ExecError::Timeout`] is returned.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation signal, checked once per poll cycle.
    pub cancel: Option<CancellationToken>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            stdin: None,
            close_stdin: true,
            tty: false,
            capture_stdout: true,
            capture_stderr: true,
            timeout: None,
            cancel: None,
        }
    }
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn close_stdin(mut self, close_stdin: bool) -> Self {
        self.close_stdin = close_stdin;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// The outcome of one remote execution. Produced exactly once per call,
/// never partially: on any failure an [`ExecError`] is returned instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Everything the remote process wrote to stdout, in channel order.
    pub stdout: Vec<u8>,
    /// Everything the remote process wrote to stderr, in channel order.
    pub stderr: Vec<u8>,
    /// The remote process's exit code.
    pub exit_code: i32,
}

impl ExecResult {
    /// Stdout as a string, with invalid UTF-8 replaced.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as a string, with invalid UTF-8 replaced.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Convenience flag: true if the remote command exited 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `target.command` in the target container and collect its output.
///
/// Steps: resolve the container if unset (first container declared on the
/// pod, never a silent fallback); build the effective command, substituting
/// the stdin-closing pipeline when requested; open the exec stream; write
/// stdin; drain stdout/stderr to completion; decode the terminal status.
///
/// The stream is closed on every exit path. The operation is not idempotent
/// and the engine cannot know whether the remote command mutated anything;
/// callers must guard repeated invocation themselves.
pub async fn execute(
    transport: &dyn Transport,
    target: &ExecTarget,
    options: &ExecOptions,
) -> Result<ExecResult, ExecError> {
    let container = match &target.container {
        Some(name) => name.clone(),
        None => first_container(transport, target).await?,
    };

    let command = command::effective_command(&target.command, options);
    debug!(
        namespace = %target.namespace,
        pod = %target.pod,
        container = %container,
        command = ?command,
        "opening exec stream"
    );

    let mut stream = transport.open(target, &container, &command, options).await?;

    let outcome = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, drive(stream.as_mut(), options)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExecError::Timeout(limit.as_secs())),
        },
        None => drive(stream.as_mut(), options).await,
    };

    // Close before inspecting the outcome so the connection is released on
    // the error paths as well.
    let closed = stream.close().await;
    let (stdout, stderr, payload) = outcome?;
    closed?;

    let exit_code = status::decode_exit_code(&payload)?;
    debug!(
        exit_code = exit_code,
        stdout_len = stdout.len(),
        stderr_len = stderr.len(),
        "exec completed"
    );

    Ok(ExecResult {
        stdout,
        stderr,
        exit_code,
    })
}

/// Inject stdin, drain the multiplexed stream, read the terminal status.
async fn drive(
    stream: &mut dyn ExecStream,
    options: &ExecOptions,
) -> Result<(Vec<u8>, Vec<u8>, StatusPayload), ExecError> {
    if let Some(stdin) = options.stdin.as_deref() {
        if !stdin.is_empty() {
            trace!(bytes = stdin.len(), "writing stdin");
            stream.write_stdin(stdin).await?;
        }
    }

    let output = stream::drain(stream, options.cancel.as_ref()).await?;
    let payload = stream.read_status().await?;
    Ok((output.stdout, output.stderr, payload))
}

async fn first_container(
    transport: &dyn Transport,
    target: &ExecTarget,
) -> Result<String, ExecError> {
    let containers = transport
        .pod_containers(&target.namespace, &target.pod)
        .await
        .map_err(|e| ExecError::ContainerResolution {
            namespace: target.namespace.clone(),
            pod: target.pod.clone(),
            message: e.to_string(),
        })?;

    containers
        .into_iter()
        .next()
        .ok_or_else(|| ExecError::ContainerResolution {
            namespace: target.namespace.clone(),
            pod: target.pod.clone(),
            message: "pod declares no containers".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_builder_chain() {
        let target = ExecTarget::new("ns1", "p1", vec!["ls".to_string()]).container("app");

        assert_eq!(target.namespace, "ns1");
        assert_eq!(target.pod, "p1");
        assert_eq!(target.container, Some("app".to_string()));
        assert_eq!(target.command, vec!["ls".to_string()]);
    }

    #[test]
    fn options_defaults() {
        let options = ExecOptions::new();

        assert!(options.stdin.is_none());
        assert!(options.close_stdin);
        assert!(!options.tty);
        assert!(options.capture_stdout);
        assert!(options.capture_stderr);
        assert!(options.timeout.is_none());
        assert!(options.cancel.is_none());
    }

    #[test]
    fn result_lossy_accessors() {
        let result = ExecResult {
            stdout: b"out".to_vec(),
            stderr: vec![0xff, 0xfe],
            exit_code: 0,
        };

        assert!(result.success());
        assert_eq!(result.stdout_lossy(), "out");
        // Invalid UTF-8 is replaced, not dropped.
        assert_eq!(result.stderr_lossy().chars().count(), 2);
    }
}
