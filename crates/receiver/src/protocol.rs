//! Receiver stdio wire protocol.
//!
//! Each message is a 4-byte big-endian length prefix followed by a
//! JSON object. A `submit_payload` request frame is followed by
//! exactly `payload_size` raw payload bytes.

use crate::error::{ReceiverError, ReceiverResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sluice_core::RepositoryTag;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single JSON frame. Payload bytes travel outside
/// the frame and are not subject to this limit.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// A request to the receiver.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Liveness and protocol handshake.
    Echo,
    /// Unpack a payload under the leased path. The frame is followed
    /// by `payload_size` raw bytes.
    SubmitPayload {
        lease_path: String,
        digest: String,
        header_size: u32,
        payload_size: u64,
    },
    /// Advance the repository root hash.
    Commit {
        lease_path: String,
        old_root_hash: String,
        new_root_hash: String,
        tag: RepositoryTag,
    },
    /// Orderly shutdown.
    Quit,
}

/// A reply from the receiver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Reply {
    /// Whether the receiver accepted the request.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Convert a non-ok reply into the corresponding error.
    pub fn into_result(self) -> ReceiverResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ReceiverError::Rejected(
                self.reason.unwrap_or(self.status),
            ))
        }
    }
}

/// Write one length-prefixed JSON message.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> ReceiverResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len())
        .map_err(|_| ReceiverError::Protocol("frame too large".to_string()))?;
    if len > MAX_FRAME_SIZE {
        return Err(ReceiverError::Protocol(format!(
            "frame of {len} bytes exceeds maximum {MAX_FRAME_SIZE}"
        )));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed JSON message.
pub async fn read_message<R, T>(reader: &mut R) -> ReceiverResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ReceiverError::Protocol("receiver closed the stream".to_string())
        } else {
            ReceiverError::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(ReceiverError::Protocol(format!(
            "frame of {len} bytes exceeds maximum {MAX_FRAME_SIZE}"
        )));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body).map_err(Into::into)
}
