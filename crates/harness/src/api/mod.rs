//! Management-API session with credential and concurrency guards.
//!
//! One `ApiSession` performs one authenticated call at a time: login,
//! invoke, logout, every time. The token is call-scoped, never long-lived.
//! Calls on the same instance are serialized by a per-instance mutex;
//! privileged calls — the ones that need the single shared administrative
//! credential — are additionally serialized process-wide through an
//! injected `AdminGate`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use testbed_common::{Error, Result};

use crate::config::ApiConfig;

pub mod classify;

pub use classify::{classify, CredentialKind, HttpVerb, MethodClass};

/// Serializes privileged calls across every session that shares it.
///
/// An explicit object handed to each session, not a process-global: the
/// guarantee holds under real multi-threading and tests can scope gates as
/// they like.
#[derive(Clone)]
pub struct AdminGate {
    semaphore: Arc<Semaphore>,
}

impl AdminGate {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| Error::Configuration("admin gate was closed".to_string()))
    }
}

impl Default for AdminGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    password: String,
}

/// Response envelope the API wraps every result in
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    message: Option<String>,
}

/// A client for the management API of one server.
pub struct ApiSession {
    base_url: String,
    client: reqwest::Client,
    caller: Credentials,
    admin: Credentials,
    gate: AdminGate,
    busy: Mutex<()>,
}

impl ApiSession {
    /// Session against `https://<fqdn><base_path>`.
    pub fn for_host(fqdn: &str, config: &ApiConfig, gate: AdminGate) -> Result<Self> {
        Self::new(format!("https://{}{}", fqdn, config.base_path), config, gate)
    }

    /// Session against an explicit base URL.
    pub fn new(base_url: impl Into<String>, config: &ApiConfig, gate: AdminGate) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(transport_err)?;

        let admin = Credentials {
            user: config.admin_user.clone(),
            password: config.admin_password.clone(),
        };
        Ok(Self {
            base_url: base_url.into(),
            client,
            caller: admin.clone(),
            admin,
            gate,
            busy: Mutex::new(()),
        })
    }

    /// Use a dedicated credential for non-privileged calls instead of the
    /// administrative one.
    pub fn with_caller(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.caller = Credentials {
            user: user.into(),
            password: password.into(),
        };
        self
    }

    /// Perform one API call: classify, guard, login, invoke, logout.
    ///
    /// Logout is best-effort; its failures are logged and never mask the
    /// call's own result or error.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let _busy = self.busy.lock().await;

        let class = classify(method);
        let _permit = match class.credential {
            CredentialKind::Admin => Some(self.gate.acquire().await?),
            CredentialKind::Caller => None,
        };

        let credentials = match class.credential {
            CredentialKind::Admin => &self.admin,
            CredentialKind::Caller => &self.caller,
        };

        self.login(credentials).await?;
        let result = self.invoke(method, class.verb, params).await;
        self.logout().await;
        result
    }

    /// Drop the session and release the underlying HTTP client.
    pub fn close(self) {}

    /// Authenticate; the opaque session token travels back as a cookie and
    /// is attached to the requests that follow.
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let url = format!("{}/auth/login", self.base_url);
        debug!("API login as {} at {}", credentials.user, url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "login": credentials.user,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "login as {} returned HTTP {}",
                credentials.user,
                response.status()
            )));
        }
        let envelope: ApiEnvelope = response.json().await.map_err(transport_err)?;
        if !envelope.success {
            return Err(Error::Authentication(
                envelope
                    .message
                    .unwrap_or_else(|| format!("login as {} rejected", credentials.user)),
            ));
        }
        Ok(())
    }

    async fn invoke(&self, method: &str, verb: HttpVerb, params: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method.replace('.', "/"));
        debug!("API {:?} {}", verb, url);

        let request = match verb {
            HttpVerb::Get => self.client.get(&url).query(&query_pairs(method, &params)?),
            HttpVerb::Post => self.client.post(&url).json(&params),
        };

        let response = request.send().await.map_err(transport_err)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ApiCall {
                method: method.to_string(),
                message: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        let envelope: ApiEnvelope = response.json().await.map_err(transport_err)?;
        if !envelope.success {
            return Err(Error::ApiCall {
                method: method.to_string(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "unspecified failure".to_string()),
            });
        }
        Ok(envelope.result)
    }

    async fn logout(&self) {
        let url = format!("{}/auth/logout", self.base_url);
        match self.client.post(&url).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!("API logout returned HTTP {}", response.status()),
            Err(e) => warn!("API logout failed: {}", e),
        }
    }
}

/// Flatten a JSON object into query pairs for a GET invocation.
fn query_pairs(method: &str, params: &Value) -> Result<Vec<(String, String)>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()),
        _ => Err(Error::ApiCall {
            method: method.to_string(),
            message: "GET parameters must be a JSON object".to_string(),
        }),
    }
}

fn transport_err(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_render_scalars() {
        let pairs = query_pairs(
            "user.listUsers",
            &serde_json::json!({"name": "alice", "active": true, "page": 2}),
        )
        .unwrap();
        assert!(pairs.contains(&("name".to_string(), "alice".to_string())));
        assert!(pairs.contains(&("active".to_string(), "true".to_string())));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
    }

    #[test]
    fn test_query_pairs_reject_non_objects() {
        let err = query_pairs("user.listUsers", &serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::ApiCall { .. }));
    }
}
