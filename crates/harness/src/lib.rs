//! Testbed Harness Runtime
//!
//! The runtime layer every step definition of the e2e suite depends on:
//! uniform remote command execution across heterogeneous hosts, bounded
//! polling for asynchronous state changes, and a guarded client for the
//! platform's management API.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    step definitions                       │
//! ├───────────────────────────────────────────────────────────┤
//! │  HostRegistry                                             │
//! │    └── get(role) -> Arc<Host>         (resolve + cache)   │
//! │  Host                                                     │
//! │    ├── run / run_until_ok / run_until_fails               │
//! │    ├── transfer_in / transfer_out     (staged via host)   │
//! │    └── wait_until_offline / wait_until_online             │
//! │  Poller                                                   │
//! │    └── run(probe) until Ready or budget exhausted         │
//! │  ApiSession                                               │
//! │    └── call(method, params)   login -> invoke -> logout   │
//! │        privileged methods serialized through AdminGate    │
//! ├───────────────────────────────────────────────────────────┤
//! │  Transport (SSH CLI | local shell)                        │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod host;
pub mod poll;
pub mod quote;
pub mod registry;
pub mod transport;

pub use api::{AdminGate, ApiSession};
pub use config::HarnessConfig;
pub use host::{Host, RunOpts};
pub use poll::Poller;
pub use registry::HostRegistry;
pub use testbed_common::{CommandOutput, Error, OsFamily, OsRelease, Result};
