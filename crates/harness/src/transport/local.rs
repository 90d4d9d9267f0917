//! Local shell transport.
//!
//! Runs commands through `sh -c` on the machine the harness itself runs
//! on. Used for a localhost role and throughout the integration tests,
//! where it stands in for the SSH backend.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use testbed_common::{CommandOutput, Error, Result};

use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn exec(&self, command: &str, hard_timeout: Duration) -> Result<CommandOutput> {
        trace!("[local] exec: {}", command);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(hard_timeout, cmd.output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(Error::Transport(format!(
                    "local command exceeded the {:?} deadline",
                    hard_timeout
                )))
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        tokio::fs::copy(local, remote)
            .await
            .map_err(|e| Error::Transfer(format!("copy {} -> {}: {}", local.display(), remote, e)))?;
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        tokio::fs::copy(remote, local)
            .await
            .map_err(|e| Error::Transfer(format!("copy {} -> {}: {}", remote, local.display(), e)))?;
        Ok(())
    }

    // The local backend can stat directly instead of spawning a shell.
    async fn probe_path(&self, path: &str) -> Result<Option<bool>> {
        Ok(Some(tokio::fs::try_exists(path).await?))
    }

    fn describe(&self) -> String {
        "local shell".to_string()
    }
}
