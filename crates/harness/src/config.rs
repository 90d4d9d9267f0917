//! Harness configuration
//!
//! Role-to-address mapping plus transport, container-indirection, and
//! management-API settings. Addresses come from the process environment,
//! one variable per role (`TESTBED_SERVER`, `TESTBED_PROXY`, ...), read
//! once when the configuration is loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use testbed_common::{Error, Result};

/// Environment prefix for role addresses
const ENV_PREFIX: &str = "TESTBED_";

/// Prefixes under `TESTBED_` that are settings, not roles
const RESERVED: &[&str] = &["SSH_", "API_", "CONTAINER_"];

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Role name -> host address
    pub roles: HashMap<String, String>,

    /// SSH transport settings
    pub ssh: SshConfig,

    /// Container-indirection settings
    pub container: ContainerConfig,

    /// Management-API settings
    pub api: ApiConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            roles: HashMap::new(),
            ssh: SshConfig::default(),
            container: ContainerConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// SSH transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,

    /// Identity file; falls back to the user's default keys when unset
    pub identity: Option<PathBuf>,

    /// Hard per-command deadline enforced by the transport itself
    pub command_timeout_secs: u64,

    /// TCP connect timeout passed to the SSH client
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            identity: None,
            command_timeout_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

impl SshConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Container-indirection settings.
///
/// A host that runs the application inside a managed container exposes a
/// local CLI with `exec` and `cp` subcommands. Guest-context commands and
/// transfers are rewritten through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// The indirection CLI, probed for on each host during resolution
    pub cli: String,

    /// Neutral staging directory on the indirection host for transfers
    pub staging_dir: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            cli: "appctl".to_string(),
            staging_dir: "/tmp".to_string(),
        }
    }
}

/// Management-API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Path under the server FQDN where the API lives
    pub base_path: String,

    /// The single shared administrative credential
    pub admin_user: String,
    pub admin_password: String,

    /// Accept the platform's self-signed certificate when false
    pub verify_tls: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/manager/api".to_string(),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
            verify_tls: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from the process environment.
    ///
    /// Every `TESTBED_<ROLE>` variable that is not a reserved setting maps
    /// the lowercased role name to an address.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        for (key, value) in std::env::vars() {
            let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if RESERVED.iter().any(|r| suffix.starts_with(r)) {
                continue;
            }
            if !value.is_empty() {
                config
                    .roles
                    .insert(suffix.to_lowercase().replace('_', "-"), value);
            }
        }

        if let Ok(user) = std::env::var("TESTBED_SSH_USER") {
            config.ssh.user = user;
        }
        if let Ok(identity) = std::env::var("TESTBED_SSH_IDENTITY") {
            config.ssh.identity = Some(PathBuf::from(identity));
        }
        if let Ok(user) = std::env::var("TESTBED_API_USER") {
            config.api.admin_user = user;
        }
        if let Ok(password) = std::env::var("TESTBED_API_PASSWORD") {
            config.api.admin_password = password;
        }
        if let Ok(cli) = std::env::var("TESTBED_CONTAINER_CLI") {
            config.container.cli = cli;
        }

        config
    }

    /// Builder-style role entry, used by tests and programmatic setups
    pub fn with_role(mut self, role: impl Into<String>, address: impl Into<String>) -> Self {
        self.roles.insert(role.into(), address.into());
        self
    }

    /// Address for a role. Fails without performing any I/O when the role
    /// has no configured address.
    pub fn address_for(&self, role: &str) -> Result<String> {
        self.roles.get(role).cloned().ok_or_else(|| {
            Error::Configuration(format!(
                "no address configured for role '{}' (set {}{})",
                role,
                ENV_PREFIX,
                role.to_uppercase().replace('-', "_")
            ))
        })
    }

    pub fn is_role_configured(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_role_is_a_configuration_error() {
        let config = HarnessConfig::default();
        let err = config.address_for("server").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("TESTBED_SERVER"));
    }

    #[test]
    fn test_with_role() {
        let config = HarnessConfig::default().with_role("proxy", "proxy.lab.local");
        assert!(config.is_role_configured("proxy"));
        assert_eq!(config.address_for("proxy").unwrap(), "proxy.lab.local");
        assert!(!config.is_role_configured("minion"));
    }
}
