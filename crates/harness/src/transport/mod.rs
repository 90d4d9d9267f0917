//! Transport seam: command execution and file movement against one host.
//!
//! Hosts talk to a `Transport` and never to a concrete backend, so tests
//! can swap the SSH CLI for a local shell. The transport enforces its own
//! hard deadline on every command; a call that neither completes nor times
//! out must never stall the caller.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use testbed_common::{CommandOutput, Result};

pub mod local;
pub mod ssh;

pub use local::LocalTransport;
pub use ssh::SshTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a shell command on the host, capturing stdout/stderr/exit code.
    ///
    /// Transport-level failures (unreachable, authentication rejected,
    /// deadline exceeded) surface as `Error::Transport`; a command that ran
    /// and exited non-zero is a normal `CommandOutput`.
    async fn exec(&self, command: &str, hard_timeout: Duration) -> Result<CommandOutput>;

    /// Copy a local file onto the host
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    /// Copy a file off the host
    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    /// Backend-native existence check. `None` means the backend has no
    /// native check and the caller should fall back to a shell `test`.
    async fn probe_path(&self, _path: &str) -> Result<Option<bool>> {
        Ok(None)
    }

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}
