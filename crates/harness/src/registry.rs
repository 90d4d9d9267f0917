//! Role-to-host registry.
//!
//! Step definitions address hosts by symbolic role ("server", "proxy",
//! "minion"). The registry resolves each role once, hands out shared
//! handles, and re-resolves a single entry on demand after a
//! reprovisioning step.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use testbed_common::Result;

use crate::config::{HarnessConfig, SshConfig};
use crate::host::Host;
use crate::transport::{SshTransport, Transport};

/// Builds the transport for a resolved address; swapped out in tests
pub type TransportFactory = dyn Fn(&str, &SshConfig) -> Arc<dyn Transport> + Send + Sync;

pub struct HostRegistry {
    config: HarnessConfig,
    hosts: Mutex<HashMap<String, Arc<Host>>>,
    transport_factory: Box<TransportFactory>,
}

impl HostRegistry {
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_transport_factory(
            config,
            Box::new(|address, ssh| Arc::new(SshTransport::new(address, ssh)) as Arc<dyn Transport>),
        )
    }

    pub fn with_transport_factory(config: HarnessConfig, factory: Box<TransportFactory>) -> Self {
        Self {
            config,
            hosts: Mutex::new(HashMap::new()),
            transport_factory: factory,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// True when the role has a configured address; performs no I/O and
    /// never triggers resolution.
    pub fn is_role_configured(&self, role: &str) -> bool {
        self.config.is_role_configured(role)
    }

    /// Fetch the host for a role, resolving it on first use.
    ///
    /// The cache lock is held across resolution so concurrent callers of
    /// the same role resolve it exactly once.
    pub async fn get(&self, role: &str) -> Result<Arc<Host>> {
        let mut hosts = self.hosts.lock().await;
        if let Some(host) = hosts.get(role) {
            return Ok(Arc::clone(host));
        }

        let host = self.resolve(role).await?;
        hosts.insert(role.to_string(), Arc::clone(&host));
        Ok(host)
    }

    /// Discard the cached entry for one role and resolve it again. Other
    /// entries are untouched.
    pub async fn get_refreshed(&self, role: &str) -> Result<Arc<Host>> {
        let mut hosts = self.hosts.lock().await;
        if hosts.remove(role).is_some() {
            info!("Discarding cached host for role '{}'", role);
        }

        let host = self.resolve(role).await?;
        hosts.insert(role.to_string(), Arc::clone(&host));
        Ok(host)
    }

    async fn resolve(&self, role: &str) -> Result<Arc<Host>> {
        let address = self.config.address_for(role)?;
        let transport = (self.transport_factory)(&address, &self.config.ssh);
        let host = Host::resolve(role, &self.config, transport).await?;
        Ok(Arc::new(host))
    }
}
