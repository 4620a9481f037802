//! Child-process receiver adapter.

use crate::error::{ReceiverError, ReceiverResult};
use crate::protocol::{read_message, write_message, Reply, Request};
use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::RepositoryTag;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// One receiver servicing one task.
///
/// Implementations are spawned per task and terminated on completion;
/// a crashing receiver kills one task, not the pool.
#[async_trait]
pub trait Receiver: Send {
    /// Stream a payload to the receiver for unpacking.
    async fn submit_payload(
        &mut self,
        lease_path: &str,
        payload: Bytes,
        digest: &str,
        header_size: u32,
    ) -> ReceiverResult<()>;

    /// Ask the receiver to advance the repository root hash.
    async fn commit(
        &mut self,
        lease_path: &str,
        old_root_hash: &str,
        new_root_hash: &str,
        tag: &RepositoryTag,
    ) -> ReceiverResult<()>;

    /// Orderly shutdown.
    async fn quit(&mut self) -> ReceiverResult<()>;
}

/// A receiver backed by a child process speaking the stdio protocol.
pub struct ReceiverProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ReceiverProcess {
    /// Spawn the receiver executable and handshake with `echo`.
    pub async fn spawn(exec: &Path) -> ReceiverResult<Self> {
        let mut child = Command::new(exec)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ReceiverError::Spawn)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ReceiverError::Protocol("receiver stdin not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ReceiverError::Protocol("receiver stdout not captured".to_string())
        })?;

        let mut receiver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        // A receiver that cannot echo is not speaking our protocol;
        // fail the task before any real work reaches it.
        receiver.roundtrip(&Request::Echo).await?.into_result()?;
        Ok(receiver)
    }

    async fn roundtrip(&mut self, request: &Request) -> ReceiverResult<Reply> {
        write_message(&mut self.stdin, request).await?;
        read_message(&mut self.stdout).await
    }
}

#[async_trait]
impl Receiver for ReceiverProcess {
    async fn submit_payload(
        &mut self,
        lease_path: &str,
        payload: Bytes,
        digest: &str,
        header_size: u32,
    ) -> ReceiverResult<()> {
        let request = Request::SubmitPayload {
            lease_path: lease_path.to_string(),
            digest: digest.to_string(),
            header_size,
            payload_size: payload.len() as u64,
        };
        write_message(&mut self.stdin, &request).await?;
        self.stdin.write_all(&payload).await?;
        self.stdin.flush().await?;

        let reply: Reply = read_message(&mut self.stdout).await?;
        reply.into_result()
    }

    async fn commit(
        &mut self,
        lease_path: &str,
        old_root_hash: &str,
        new_root_hash: &str,
        tag: &RepositoryTag,
    ) -> ReceiverResult<()> {
        let request = Request::Commit {
            lease_path: lease_path.to_string(),
            old_root_hash: old_root_hash.to_string(),
            new_root_hash: new_root_hash.to_string(),
            tag: tag.clone(),
        };
        self.roundtrip(&request).await?.into_result()
    }

    async fn quit(&mut self) -> ReceiverResult<()> {
        self.roundtrip(&Request::Quit).await?.into_result()?;

        let status = self.child.wait().await?;
        if !status.success() {
            return Err(ReceiverError::Exit(status));
        }
        Ok(())
    }
}
