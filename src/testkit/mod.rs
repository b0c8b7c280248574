//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] - [`ChannelTransport`](transport::ChannelTransport), an
//!   in-memory [`Transport`](crate::transport::Transport) with a control handle.
//! - [`domain`] - Wire frame builders and an event recorder.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod domain;
pub mod transport;
