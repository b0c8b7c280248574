//! daemon-link - Real-time connection client for the agent daemon.
//!
//! Keeps a WebSocket link to the daemon alive and turns its traffic into
//! typed events for the rest of the application.
//!
//! # Architecture
//!
//! One tokio task, the connection manager, owns the transport and all client
//! state. [`runtime::Client`] is a cloneable handle that sends commands to it
//! and reads health, stats and state snapshots from watch channels.
//!
//! - **`runtime::Broadcaster`** - Typed publish/subscribe with panic isolation
//! - **`runtime::MessageDeduplicator`** - Sliding-window duplicate suppression
//! - **`runtime::MessageQueue`** - Bounded offline buffer for outbound sends
//! - **`runtime::LatencyMonitor`** - Ping/pong EMA and health classification
//! - **`runtime::Backoff`** - Exponential reconnect delays with a retry budget
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Events, health and statistics types
//! - [`error`] - Error types for the crate
//! - [`protocol`] - Wire frames and inbound event decoding
//! - [`transport`] - Transport trait and the WebSocket implementation
//! - [`runtime`] - Connection manager and client handle
//! - [`cli`] - Operator command-line interface
//!
//! # Example
//!
//! ```no_run
//! use daemon_link::config::Config;
//! use daemon_link::domain::SessionUpdated;
//! use daemon_link::runtime::Client;
//! use daemon_link::transport::WebSocketTransport;
//!
//! # async fn run() -> daemon_link::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let client = Client::spawn(
//!     WebSocketTransport::new(config.server.url.clone()),
//!     config.client_config(),
//! )?;
//! client.on_event::<SessionUpdated, _>(|update| println!("{}", update.0));
//! client.connect().await?;
//! client.subscribe_to_session("session-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod transport;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
