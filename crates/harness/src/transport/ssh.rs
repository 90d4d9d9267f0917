//! OpenSSH CLI transport.
//!
//! Shells out to `ssh`/`scp` in batch mode, authenticated by key from the
//! user's SSH configuration. OpenSSH reserves exit code 255 for its own
//! failures (unreachable host, rejected key), which is what lets us tell
//! "could not reach host" apart from "command ran and failed".

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use testbed_common::{CommandOutput, Error, Result};

use crate::config::SshConfig;
use crate::transport::Transport;

/// Exit code OpenSSH uses for its own errors
const SSH_TRANSPORT_FAILURE: i32 = 255;

pub struct SshTransport {
    address: String,
    user: String,
    port: u16,
    identity: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshTransport {
    pub fn new(address: impl Into<String>, config: &SshConfig) -> Self {
        Self {
            address: address.into(),
            user: config.user.clone(),
            port: config.port,
            identity: config.identity.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    fn common_args(&self, cmd: &mut Command) {
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs()));
        if let Some(identity) = &self.identity {
            cmd.arg("-i").arg(identity);
        }
    }

    async fn run_captured(
        &self,
        mut cmd: Command,
        hard_timeout: Duration,
        what: &str,
    ) -> Result<std::process::Output> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(hard_timeout, cmd.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(Error::Transport(format!(
                "{} against {} exceeded the {:?} deadline",
                what,
                self.address,
                hard_timeout
            ))),
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &str, hard_timeout: Duration) -> Result<CommandOutput> {
        trace!("[{}] exec: {}", self.address, command);

        let mut cmd = Command::new("ssh");
        self.common_args(&mut cmd);
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg(self.destination())
            .arg("--")
            .arg(command);

        let output = self.run_captured(cmd, hard_timeout, "ssh").await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code == SSH_TRANSPORT_FAILURE {
            return Err(Error::Transport(format!(
                "ssh to {} failed: {}",
                self.address,
                stderr.trim()
            )));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        debug!("[{}] upload {} -> {}", self.address, local.display(), remote);

        let mut cmd = Command::new("scp");
        self.common_args(&mut cmd);
        cmd.arg("-P")
            .arg(self.port.to_string())
            .arg(local)
            .arg(format!("{}:{}", self.destination(), remote));

        let output = self
            .run_captured(cmd, Duration::from_secs(600), "scp upload")
            .await?;
        if !output.status.success() {
            return Err(Error::Transfer(format!(
                "scp {} -> {}:{} failed: {}",
                local.display(),
                self.address,
                remote,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        debug!(
            "[{}] download {} -> {}",
            self.address,
            remote,
            local.display()
        );

        let mut cmd = Command::new("scp");
        self.common_args(&mut cmd);
        cmd.arg("-P")
            .arg(self.port.to_string())
            .arg(format!("{}:{}", self.destination(), remote))
            .arg(local);

        let output = self
            .run_captured(cmd, Duration::from_secs(600), "scp download")
            .await?;
        if !output.status.success() {
            return Err(Error::Transfer(format!(
                "scp {}:{} -> {} failed: {}",
                self.address,
                remote,
                local.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ssh {}:{}", self.destination(), self.port)
    }
}
