//! Decoding of the exec protocol's terminal status message.
//!
//! The status channel (channel 3) carries one small structured document
//! describing how the exec call ended. `Success` and `Failure` are the
//! documented values; any other status means the remote command exited
//! non-zero, and the exit code travels as a stringified integer in
//! `details.causes[0].message`. That last convention is undocumented but
//! stable, and this decoder matches it exactly rather than guessing.

use serde::{Deserialize, Serialize};

use super::ExecError;

/// The terminal message read from the status channel.
///
/// Deserializable from the raw YAML/JSON payload; transports that already
/// decode the platform's status object convert into this shape instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    /// "Success", "Failure", or an undocumented third state carrying an
    /// exit code in the first cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Human-readable description, set on failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

/// The `details` block of a status payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub causes: Vec<StatusCause>,
}

/// One entry of `details.causes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCause {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusPayload {
    /// Parse a raw status channel payload (YAML or JSON).
    pub fn parse(raw: &[u8]) -> Result<Self, ExecError> {
        serde_yaml::from_slice(raw)
            .map_err(|e| ExecError::Decode(format!("unparseable status payload: {}", e)))
    }
}

/// Turn a status payload into the remote command's exit code.
///
/// `Failure` means the exec request itself failed and becomes
/// [`ExecError::Failed`]; `Success` is exit code 0 regardless of `details`;
/// anything else must carry an integer-parseable `causes[0].message`, and a
/// payload that does not is a protocol-contract violation surfaced as
/// [`ExecError::Decode`].
pub(crate) fn decode_exit_code(payload: &StatusPayload) -> Result<i32, ExecError> {
    match payload.status.as_deref() {
        Some("Failure") => Err(ExecError::Failed(
            payload
                .message
                .clone()
                .unwrap_or_else(|| "exec request failed without a message".to_string()),
        )),
        Some("Success") => Ok(0),
        _ => {
            let cause = payload
                .details
                .as_ref()
                .and_then(|details| details.causes.first())
                .ok_or_else(|| {
                    ExecError::Decode("non-success status carries no causes".to_string())
                })?;
            let message = cause.message.as_deref().ok_or_else(|| {
                ExecError::Decode("first status cause has no message".to_string())
            })?;
            message.trim().parse::<i32>().map_err(|_| {
                ExecError::Decode(format!("exit code is not an integer: {:?}", message))
            })
        }
    }
}
