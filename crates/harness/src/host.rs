//! A resolved test host and the operations the framework drives it with.
//!
//! One `Host` hides the difference between a bare machine and an
//! indirection host that runs the application inside a managed container:
//! guest-context commands are rewritten through the platform CLI, file
//! transfers stage through a neutral path on the host, and everything else
//! looks the same to the caller.

use std::path::Path;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use testbed_common::{CommandOutput, Error, OsRelease, Result};

use crate::config::HarnessConfig;
use crate::poll::{self, Poller};
use crate::quote::{sh_quote, ShellLine};
use crate::transport::Transport;

/// Path prefix the indirection CLI uses to address the guest filesystem
const GUEST_PREFIX: &str = "app:";

/// Interval between attempts when re-running a remote command
const RUN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline for the short commands issued during resolution
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for a single reachability probe
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(8);

/// Options for one `run` call
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Execute inside the guest context when the host has indirection.
    /// No-op on bare hosts.
    pub guest: bool,

    /// Fail with `Error::Execution` on an unacceptable exit code
    pub check_errors: bool,

    /// Per-command deadline; the host's configured default when unset
    pub timeout: Option<Duration>,

    /// Exit codes that do not count as failure
    pub acceptable_exit_codes: Vec<i32>,

    /// Log the command and its output at info level
    pub verbose: bool,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            guest: true,
            check_errors: true,
            timeout: None,
            acceptable_exit_codes: vec![0],
            verbose: false,
        }
    }
}

impl RunOpts {
    /// Run on the bare host even when indirection is available
    pub fn host_context() -> Self {
        Self {
            guest: false,
            ..Self::default()
        }
    }

    /// Do not turn a non-zero exit code into an error
    pub fn unchecked() -> Self {
        Self {
            check_errors: false,
            ..Self::default()
        }
    }
}

/// One host of the test topology, resolved and ready for execution.
///
/// Identity (hostname, FQDN, OS) is probed once during `resolve` and never
/// mutated afterwards; refreshing a host means resolving a new one.
pub struct Host {
    role: String,
    address: String,
    hostname: String,
    fqdn: String,
    os: OsRelease,
    guest_os: Option<OsRelease>,
    container_cli: Option<String>,
    staging_dir: String,
    command_timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl Host {
    /// Resolve a role into a usable host.
    ///
    /// Probes for the indirection CLI, determines the canonical hostname
    /// and FQDN (from the guest context when indirection applies, since
    /// that is the identity the application answers to), and records the
    /// OS of the host and, separately, of the guest context.
    pub async fn resolve(
        role: &str,
        config: &HarnessConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let address = config.address_for(role)?;
        debug!("Resolving host '{}' at {} via {}", role, address, transport.describe());

        let cli_probe = transport
            .exec(
                &format!("command -v {}", sh_quote(&config.container.cli)),
                RESOLVE_TIMEOUT,
            )
            .await?;
        let container_cli = cli_probe
            .is_success()
            .then(|| config.container.cli.clone());

        let mut host = Self {
            role: role.to_string(),
            address: address.clone(),
            hostname: String::new(),
            fqdn: String::new(),
            os: OsRelease::parse(""),
            guest_os: None,
            container_cli,
            staging_dir: config.container.staging_dir.clone(),
            command_timeout: config.ssh.command_timeout(),
            transport,
        };

        let probe_opts = RunOpts {
            check_errors: false,
            timeout: Some(RESOLVE_TIMEOUT),
            ..RunOpts::default()
        };

        let hostname = host.run("hostname", probe_opts.clone()).await?;
        host.hostname = match hostname.stdout_trimmed() {
            "" => address.clone(),
            name => name.to_string(),
        };
        let fqdn = host.run("hostname -f", probe_opts.clone()).await?;
        host.fqdn = match fqdn.stdout_trimmed() {
            "" => host.hostname.clone(),
            name => name.to_string(),
        };

        let os_release = host
            .run(
                "cat /etc/os-release",
                RunOpts {
                    guest: false,
                    ..probe_opts.clone()
                },
            )
            .await?;
        host.os = OsRelease::parse(&os_release.stdout);

        if host.container_cli.is_some() {
            let guest_release = host.run("cat /etc/os-release", probe_opts).await?;
            host.guest_os = Some(OsRelease::parse(&guest_release.stdout));
        }

        info!(
            "Resolved '{}': {} ({}), os {} {}{}",
            host.role,
            host.fqdn,
            host.address,
            host.os.family,
            host.os.version,
            if host.container_cli.is_some() {
                ", guest context available"
            } else {
                ""
            }
        );
        Ok(host)
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn os(&self) -> &OsRelease {
        &self.os
    }

    /// OS of the guest context, when indirection is available
    pub fn guest_os(&self) -> Option<&OsRelease> {
        self.guest_os.as_ref()
    }

    pub fn has_indirection(&self) -> bool {
        self.container_cli.is_some()
    }

    /// Rewrite a command into the indirection-exec invocation. Identity on
    /// bare hosts.
    fn wrap_guest(&self, command: &str) -> String {
        match &self.container_cli {
            Some(cli) => ShellLine::new(cli)
                .arg("exec")
                .arg("--")
                .args(["sh", "-c"])
                .arg(command)
                .render(),
            None => command.to_string(),
        }
    }

    /// Run a command on this host.
    pub async fn run(&self, command: &str, opts: RunOpts) -> Result<CommandOutput> {
        let dispatched = if opts.guest {
            self.wrap_guest(command)
        } else {
            command.to_string()
        };

        if opts.verbose {
            info!("[{}] running: {}", self.role, command);
        } else {
            debug!("[{}] running: {}", self.role, command);
        }

        let timeout = opts.timeout.unwrap_or(self.command_timeout);
        let output = self.transport.exec(&dispatched, timeout).await?;

        if opts.verbose {
            info!(
                "[{}] exit {}\n{}",
                self.role, output.exit_code, output.stdout
            );
        }

        if opts.check_errors && !opts.acceptable_exit_codes.contains(&output.exit_code) {
            return Err(Error::Execution {
                command: command.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// `run` with default options
    pub async fn run_ok(&self, command: &str) -> Result<CommandOutput> {
        self.run(command, RunOpts::default()).await
    }

    /// Re-run a command until it exits zero or the timeout elapses.
    ///
    /// Error checking is disabled for the individual attempts; a transport
    /// failure counts as "not yet" since the host may be mid-reboot.
    pub async fn run_until_ok(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let opts = RunOpts::unchecked();
        let opts = &opts;
        Poller::new()
            .timeout(timeout)
            .interval(RUN_RETRY_INTERVAL)
            .message(format!("`{}` did not succeed on {}", command, self.role))
            .run(move || async move {
                match self.run(command, opts.clone()).await {
                    Ok(out) if out.is_success() => Ok(Poll::Ready(out)),
                    Ok(_) => Ok(Poll::Pending),
                    Err(e) if e.is_transport() => Ok(Poll::Pending),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// Re-run a command until it stops exiting zero or the timeout elapses.
    pub async fn run_until_fails(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let opts = RunOpts::unchecked();
        let opts = &opts;
        Poller::new()
            .timeout(timeout)
            .interval(RUN_RETRY_INTERVAL)
            .message(format!("`{}` kept succeeding on {}", command, self.role))
            .run(move || async move {
                match self.run(command, opts.clone()).await {
                    Ok(out) if !out.is_success() => Ok(Poll::Ready(out)),
                    Ok(_) => Ok(Poll::Pending),
                    Err(e) if e.is_transport() => Ok(Poll::Pending),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    fn staging_path(&self, name: &Path) -> String {
        let file_name = name
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        format!("{}/staging-{}-{}", self.staging_dir, Uuid::new_v4(), file_name)
    }

    /// Copy a local file onto this host, into the guest context when
    /// indirection is available.
    pub async fn transfer_in(&self, local: &Path, remote: &str) -> Result<()> {
        let Some(cli) = &self.container_cli else {
            return self.transport.upload(local, remote).await;
        };

        let staging = self.staging_path(local);
        self.transport.upload(local, &staging).await?;

        let copy = ShellLine::new(cli)
            .arg("cp")
            .arg(&staging)
            .arg(format!("{}{}", GUEST_PREFIX, remote))
            .render();
        let result = self.run(&copy, RunOpts::host_context()).await;
        self.remove_staging(&staging).await;

        result.map(|_| ()).map_err(Self::as_transfer_error)
    }

    /// Copy a file from this host (guest context when available) to a
    /// local path.
    pub async fn transfer_out(&self, remote: &str, local: &Path) -> Result<()> {
        let Some(cli) = &self.container_cli else {
            return self.transport.download(remote, local).await;
        };

        let staging = self.staging_path(Path::new(remote));
        let copy = ShellLine::new(cli)
            .arg("cp")
            .arg(format!("{}{}", GUEST_PREFIX, remote))
            .arg(&staging)
            .render();
        if let Err(e) = self.run(&copy, RunOpts::host_context()).await {
            return Err(Self::as_transfer_error(e));
        }

        let result = self.transport.download(&staging, local).await;
        self.remove_staging(&staging).await;
        result
    }

    async fn remove_staging(&self, staging: &str) {
        let cleanup = format!("rm -f {}", sh_quote(staging));
        if let Err(e) = self
            .run(&cleanup, RunOpts {
                check_errors: false,
                ..RunOpts::host_context()
            })
            .await
        {
            debug!("[{}] staging cleanup failed: {}", self.role, e);
        }
    }

    fn as_transfer_error(e: Error) -> Error {
        match e {
            Error::Execution { stderr, stdout, .. } => Error::Transfer(format!(
                "indirection copy failed: {}",
                if stderr.is_empty() { stdout } else { stderr }
            )),
            other => other,
        }
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        self.path_exists(path, "-f").await
    }

    pub async fn dir_exists(&self, path: &str) -> Result<bool> {
        self.path_exists(path, "-d").await
    }

    async fn path_exists(&self, path: &str, test_flag: &str) -> Result<bool> {
        // The native probe only sees the host filesystem and cannot tell
        // files from directories; a negative answer is still conclusive.
        if self.container_cli.is_none() {
            if let Some(false) = self.transport.probe_path(path).await? {
                return Ok(false);
            }
        }

        let test = format!("test {} {}", test_flag, sh_quote(path));
        let out = self.run(&test, RunOpts::unchecked()).await?;
        Ok(out.is_success())
    }

    pub async fn remove_file(&self, path: &str) -> Result<()> {
        self.run(&format!("rm -f {}", sh_quote(path)), RunOpts::default())
            .await?;
        Ok(())
    }

    pub async fn remove_dir(&self, path: &str) -> Result<()> {
        self.run(&format!("rm -rf {}", sh_quote(path)), RunOpts::default())
            .await?;
        Ok(())
    }

    /// Wait until the host stops answering a trivial echo, i.e. the start
    /// of a reboot cycle.
    pub async fn wait_until_offline(&self) -> Result<()> {
        let opts = RunOpts {
            guest: false,
            check_errors: false,
            timeout: Some(REACHABILITY_TIMEOUT),
            ..RunOpts::default()
        };
        let opts = &opts;
        Poller::new()
            .timeout(poll::DEFAULT_TIMEOUT)
            .interval(RUN_RETRY_INTERVAL)
            .message(format!("{} never went offline", self.role))
            .run(move || async move {
                match self.run("echo alive", opts.clone()).await {
                    Ok(_) => Ok(Poll::Pending),
                    Err(e) if e.is_transport() => Ok(Poll::Ready(())),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// Wait until the host answers a trivial echo again.
    pub async fn wait_until_online(&self, timeout: Duration) -> Result<()> {
        let opts = RunOpts {
            guest: false,
            check_errors: false,
            timeout: Some(REACHABILITY_TIMEOUT),
            ..RunOpts::default()
        };
        let opts = &opts;
        Poller::new()
            .timeout(timeout)
            .interval(RUN_RETRY_INTERVAL)
            .message(format!("{} did not come back online", self.role))
            .run(move || async move {
                match self.run("echo alive", opts.clone()).await {
                    Ok(out) if out.is_success() => Ok(Poll::Ready(())),
                    Ok(_) => Ok(Poll::Pending),
                    Err(e) if e.is_transport() => Ok(Poll::Pending),
                    Err(e) => Err(e),
                }
            })
            .await
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("fqdn", &self.fqdn)
            .field("indirection", &self.container_cli)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalTransport;

    fn bare_host(cli: Option<&str>) -> Host {
        Host {
            role: "server".to_string(),
            address: "server.lab.local".to_string(),
            hostname: "server".to_string(),
            fqdn: "server.lab.local".to_string(),
            os: OsRelease::parse("ID=sles\nVERSION_ID=\"15.6\"\n"),
            guest_os: None,
            container_cli: cli.map(str::to_string),
            staging_dir: "/tmp".to_string(),
            command_timeout: Duration::from_secs(300),
            transport: Arc::new(LocalTransport::new()),
        }
    }

    #[test]
    fn test_wrap_guest_is_identity_without_indirection() {
        let host = bare_host(None);
        assert_eq!(host.wrap_guest("id"), "id");
    }

    #[test]
    fn test_wrap_guest_rewrites_through_the_cli() {
        let host = bare_host(Some("appctl"));
        assert_eq!(host.wrap_guest("id"), "appctl exec -- sh -c id");
        assert_eq!(
            host.wrap_guest("echo 'hi'"),
            r"appctl exec -- sh -c 'echo '\''hi'\'''"
        );
    }

    #[test]
    fn test_staging_paths_are_unique() {
        let host = bare_host(Some("appctl"));
        let a = host.staging_path(Path::new("/etc/motd"));
        let b = host.staging_path(Path::new("/etc/motd"));
        assert_ne!(a, b);
        assert!(a.starts_with("/tmp/staging-"));
        assert!(a.ends_with("-motd"));
    }
}
