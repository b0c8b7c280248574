//! In-memory [`Transport`] double.
//!
//! [`ChannelTransport`] is driven from a [`ChannelTransportHandle`]: tests
//! script connect results, inject inbound frames, drop the connection and
//! inspect what the client wrote. No real network I/O.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{names, Frame};
use crate::transport::{Transport, TransportEvent};

#[derive(Default)]
struct Shared {
    connected: bool,
    stall_connects: bool,
    connect_results: VecDeque<Result<()>>,
    connect_count: u32,
    /// Successful sends left before the next send fails.
    sends_before_failure: Option<usize>,
    sent: Vec<Frame>,
}

/// Mock transport whose inbound side is fed through a channel.
///
/// `connect()` pops the next scripted result (`Ok(())` once the script is
/// exhausted). `next_event()` stays pending while disconnected, so events
/// injected between connections are delivered after the next connect.
pub struct ChannelTransport {
    shared: Arc<Mutex<Shared>>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Control handle for a [`ChannelTransport`]. Cheap to clone.
#[derive(Clone)]
pub struct ChannelTransportHandle {
    shared: Arc<Mutex<Shared>>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

/// Create a [`ChannelTransport`] and its control handle.
pub fn channel_transport() -> (ChannelTransport, ChannelTransportHandle) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            shared: Arc::clone(&shared),
            inbound: rx,
        },
        ChannelTransportHandle {
            shared,
            inbound: tx,
        },
    )
}

impl ChannelTransportHandle {
    /// Queue results for upcoming `connect()` calls.
    pub fn script_connect_results(&self, results: Vec<Result<()>>) {
        self.shared.lock().connect_results.extend(results);
    }

    /// Make every following `connect()` fail with a connection error.
    pub fn refuse_connections(&self, count: usize) {
        let mut shared = self.shared.lock();
        for _ in 0..count {
            shared
                .connect_results
                .push_back(Err(Error::Connection("connection refused".into())));
        }
    }

    /// Make `connect()` hang until the caller's timeout fires.
    pub fn stall_connects(&self, stall: bool) {
        self.shared.lock().stall_connects = stall;
    }

    /// Let `n` more sends succeed, then fail the next one and mark the
    /// connection as broken.
    pub fn fail_sends_after(&self, n: usize) {
        self.shared.lock().sends_before_failure = Some(n);
    }

    /// Deliver an inbound frame.
    pub fn push_frame(&self, frame: Frame) {
        let _ = self.inbound.send(TransportEvent::Frame(frame));
    }

    /// Simulate the server closing the connection.
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.inbound.send(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    /// How many times `connect()` was called.
    pub fn connect_count(&self) -> u32 {
        self.shared.lock().connect_count
    }

    /// Every frame successfully written, pings included.
    pub fn sent(&self) -> Vec<Frame> {
        self.shared.lock().sent.clone()
    }

    /// Frames written under a given event name.
    pub fn sent_named(&self, event: &str) -> Vec<Frame> {
        self.shared
            .lock()
            .sent
            .iter()
            .filter(|frame| frame.event == event)
            .cloned()
            .collect()
    }

    /// Timestamps of the pings written so far.
    pub fn pings(&self) -> Vec<i64> {
        self.sent_named(names::PING)
            .iter()
            .filter_map(|frame| frame.data.as_i64())
            .collect()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        let stall = {
            let mut shared = self.shared.lock();
            shared.connect_count += 1;
            shared.connected = false;
            shared.stall_connects
        };
        if stall {
            return std::future::pending().await;
        }

        let mut shared = self.shared.lock();
        let result = shared.connect_results.pop_front().unwrap_or(Ok(()));
        shared.connected = result.is_ok();
        result
    }

    async fn send(&mut self, frame: &Frame) -> Result<()> {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if !shared.connected {
            return Err(Error::Connection("Not connected".into()));
        }
        match shared.sends_before_failure {
            Some(0) => {
                shared.sends_before_failure = None;
                shared.connected = false;
                Err(Error::Connection("send failed".into()))
            }
            Some(left) => {
                shared.sends_before_failure = Some(left - 1);
                shared.sent.push(frame.clone());
                Ok(())
            }
            None => {
                shared.sent.push(frame.clone());
                Ok(())
            }
        }
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if !self.shared.lock().connected {
            return std::future::pending().await;
        }
        let event = self.inbound.recv().await?;
        if matches!(event, TransportEvent::Closed { .. }) {
            self.shared.lock().connected = false;
        }
        Some(event)
    }

    async fn close(&mut self) {
        self.shared.lock().connected = false;
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
