//! The multiplexed exec stream seam and its demultiplexing loop.
//!
//! [`ExecStream`] is the narrow interface the engine needs from a transport:
//! per-channel read primitives over the channel-tagged byte stream (stdout =
//! channel 1, stderr = channel 2, status = channel 3) plus a bounded poll.
//! [`drain`] pulls it to completion with an explicit state machine, so the
//! accumulators never outlive a call and no partial output is exposed.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::status::StatusPayload;
use super::transport::TransportError;
use super::ExecError;

/// Bounded wait for one poll cycle; keeps the loop responsive to
/// cancellation without busy-waiting.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One open multiplexed exec connection.
///
/// Within a channel, byte order is preserved exactly as received. No
/// ordering is guaranteed between stdout and stderr; the underlying
/// transport does not sequence across channels.
#[async_trait]
pub trait ExecStream: Send {
    /// True until the remote side has closed every output channel.
    fn is_open(&self) -> bool;

    /// Pump the connection for at most `timeout`, buffering whatever frames
    /// arrive. Returning with nothing buffered is normal.
    async fn poll(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Take the stdout bytes buffered since the last read, if any.
    fn read_stdout(&mut self) -> Option<Vec<u8>>;

    /// Take the stderr bytes buffered since the last read, if any.
    fn read_stderr(&mut self) -> Option<Vec<u8>>;

    /// Write bytes to the remote process's standard input.
    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// The terminal status message from channel 3. Valid once the stream
    /// has closed; fails if the connection broke before a status arrived.
    async fn read_status(&mut self) -> Result<StatusPayload, TransportError>;

    /// Release the connection. Idempotent; called on every exit path.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// The remote side may still produce frames.
    Open,
    /// The transport closed; one final read empties the channel buffers.
    Draining,
    Closed,
}

/// Accumulated per-channel output of one drained stream.
pub(crate) struct StreamOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Poll the stream until the remote side closes it, accumulating stdout and
/// stderr. Each cycle checks the cancellation token before touching the
/// transport; transport errors propagate without local retries.
pub(crate) async fn drain(
    stream: &mut dyn ExecStream,
    cancel: Option<&CancellationToken>,
) -> Result<StreamOutput, ExecError> {
    let mut output = StreamOutput {
        stdout: Vec::new(),
        stderr: Vec::new(),
    };
    let mut state = StreamState::Open;

    while state != StreamState::Closed {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(ExecError::Cancelled);
            }
        }

        if state == StreamState::Open {
            stream.poll(POLL_INTERVAL).await?;
        }

        if let Some(chunk) = stream.read_stdout() {
            trace!(bytes = chunk.len(), "stdout frame");
            output.stdout.extend_from_slice(&chunk);
        }
        if let Some(chunk) = stream.read_stderr() {
            trace!(bytes = chunk.len(), "stderr frame");
            output.stderr.extend_from_slice(&chunk);
        }

        state = match state {
            StreamState::Open if stream.is_open() => StreamState::Open,
            StreamState::Open => StreamState::Draining,
            _ => StreamState::Closed,
        };
    }

    Ok(output)
}
