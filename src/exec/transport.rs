//! Transport seam and its production implementation over the `kube` crate.
//!
//! [`Transport`] is what the engine needs from the outside world: open one
//! exec stream, and read a pod's declared containers for auto-selection.
//! [`KubeTransport`] implements it with `kube`'s websocket support; the
//! attached process already demultiplexes the channel-tagged frames into
//! per-channel pipes, and [`KubeExecStream`] adapts those onto the
//! [`ExecStream`] read primitives.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, AttachedProcess};
use kube::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::status::{StatusCause, StatusDetails, StatusPayload};
use super::stream::ExecStream;
use super::{ExecOptions, ExecTarget};

/// Errors raised by the transport layer. Never retried here; retry policy
/// belongs to the caller.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The Kubernetes API rejected a request (exec open, pod read).
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The stream broke while reading or writing.
    #[error("exec stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stdin was written but the stream was opened without a stdin channel.
    #[error("stdin channel is not open")]
    StdinUnavailable,

    /// The connection closed before the status channel delivered a payload.
    #[error("exec stream closed before reporting a status")]
    MissingStatus,
}

/// What the engine needs from a Kubernetes client. One implementation per
/// transport; connections are never shared across calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a multiplexed exec stream to one container of the target pod.
    /// `command` is the effective command (possibly the synthesized
    /// stdin-closing pipeline), not necessarily the caller's literal argv.
    async fn open(
        &self,
        target: &ExecTarget,
        container: &str,
        command: &[String],
        options: &ExecOptions,
    ) -> Result<Box<dyn ExecStream>, TransportError>;

    /// Container names declared on a pod, in declaration order. Used only
    /// for container auto-selection.
    async fn pod_containers(
        &self,
        namespace: &str,
        pod: &str,
    ) -> Result<Vec<String>, TransportError>;
}

/// Production transport backed by an authenticated [`kube::Client`].
#[derive(Clone)]
pub struct KubeTransport {
    client: Client,
}

impl KubeTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Transport for KubeTransport {
    async fn open(
        &self,
        target: &ExecTarget,
        container: &str,
        command: &[String],
        options: &ExecOptions,
    ) -> Result<Box<dyn ExecStream>, TransportError> {
        let params = AttachParams::default()
            .container(container)
            .stdin(options.stdin.is_some())
            .stdout(options.capture_stdout)
            .stderr(options.capture_stderr)
            .tty(options.tty);

        let attached = self
            .pods(&target.namespace)
            .exec(&target.pod, command.to_vec(), &params)
            .await?;

        debug!(
            namespace = %target.namespace,
            pod = %target.pod,
            container = %container,
            "exec stream opened"
        );

        Ok(Box::new(KubeExecStream::new(attached)))
    }

    async fn pod_containers(
        &self,
        namespace: &str,
        pod: &str,
    ) -> Result<Vec<String>, TransportError> {
        let pod = self.pods(namespace).get(pod).await?;

        Ok(pod
            .spec
            .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
            .unwrap_or_default())
    }
}

/// [`ExecStream`] adapter over an attached process.
///
/// The attached process exposes stdout and stderr as byte pipes fed by the
/// websocket task, and the status channel as a one-shot future. Channels
/// the caller did not request are modeled as already-exhausted readers.
pub struct KubeExecStream {
    process: Option<AttachedProcess>,
    stdin: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    stdout: Box<dyn AsyncRead + Send + Unpin>,
    stderr: Box<dyn AsyncRead + Send + Unpin>,
    status: Option<BoxFuture<'static, Option<Status>>>,
    stdout_buf: Vec<u8>,
    stderr_buf: Vec<u8>,
    stdout_eof: bool,
    stderr_eof: bool,
}

impl KubeExecStream {
    fn new(mut attached: AttachedProcess) -> Self {
        let stdin = attached
            .stdin()
            .map(|writer| Box::new(writer) as Box<dyn AsyncWrite + Send + Unpin>);
        let (stdout, stdout_eof) = match attached.stdout() {
            Some(reader) => (Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>, false),
            None => (
                Box::new(tokio::io::empty()) as Box<dyn AsyncRead + Send + Unpin>,
                true,
            ),
        };
        let (stderr, stderr_eof) = match attached.stderr() {
            Some(reader) => (Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>, false),
            None => (
                Box::new(tokio::io::empty()) as Box<dyn AsyncRead + Send + Unpin>,
                true,
            ),
        };
        let status = attached.take_status().map(|fut| fut.boxed());

        Self {
            process: Some(attached),
            stdin,
            stdout,
            stderr,
            status,
            stdout_buf: Vec::new(),
            stderr_buf: Vec::new(),
            stdout_eof,
            stderr_eof,
        }
    }
}

#[async_trait]
impl ExecStream for KubeExecStream {
    fn is_open(&self) -> bool {
        !(self.stdout_eof && self.stderr_eof)
    }

    async fn poll(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.stdout_eof && self.stderr_eof {
            return Ok(());
        }

        let mut stdout_chunk = [0u8; 4096];
        let mut stderr_chunk = [0u8; 4096];
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                read = self.stdout.read(&mut stdout_chunk), if !self.stdout_eof => {
                    match read? {
                        0 => self.stdout_eof = true,
                        n => self.stdout_buf.extend_from_slice(&stdout_chunk[..n]),
                    }
                }
                read = self.stderr.read(&mut stderr_chunk), if !self.stderr_eof => {
                    match read? {
                        0 => self.stderr_eof = true,
                        n => self.stderr_buf.extend_from_slice(&stderr_chunk[..n]),
                    }
                }
                _ = &mut deadline => return Ok(()),
            }

            if self.stdout_eof && self.stderr_eof {
                return Ok(());
            }
        }
    }

    fn read_stdout(&mut self) -> Option<Vec<u8>> {
        if self.stdout_buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.stdout_buf))
        }
    }

    fn read_stderr(&mut self) -> Option<Vec<u8>> {
        if self.stderr_buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.stderr_buf))
        }
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let writer = self.stdin.as_mut().ok_or(TransportError::StdinUnavailable)?;
        writer.write_all(data).await?;
        writer.flush().await?;
        trace!(bytes = data.len(), "stdin written");
        Ok(())
    }

    async fn read_status(&mut self) -> Result<StatusPayload, TransportError> {
        let status = match self.status.take() {
            Some(fut) => fut.await,
            None => None,
        };

        status
            .map(StatusPayload::from)
            .ok_or(TransportError::MissingStatus)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut writer) = self.stdin.take() {
            // Half-close so a remote reader still blocked on stdin sees EOF.
            let _ = writer.shutdown().await;
        }
        self.status = None;
        // Dropping the attached process tears down the websocket task and
        // with it the connection.
        self.process = None;
        Ok(())
    }
}

impl From<Status> for StatusPayload {
    fn from(status: Status) -> Self {
        StatusPayload {
            status: status.status,
            message: status.message,
            details: status.details.map(|details| StatusDetails {
                causes: details
                    .causes
                    .unwrap_or_default()
                    .into_iter()
                    .map(|cause| StatusCause {
                        message: cause.message,
                    })
                    .collect(),
            }),
        }
    }
}
