//! Connection manager: the task that owns the socket and all client state.
//!
//! Every mutation happens on this one task. Callers reach it through
//! [`Command`]s sent by the [`Client`](super::Client) handle, and observe it
//! through the watch channels in [`Snapshots`]. Timers are plain `Option`
//! slots polled by the main `select!`, so at most one reconnect delay and one
//! ping interval can exist at any moment. A connection attempt keeps reading
//! commands while it is in flight; `disconnect` and `shutdown` abort it.

use std::future::pending;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, trace, warn};

use crate::config::ClientConfig;
use crate::domain::{
    ClientEvent, Connected, ConnectionHealth, ConnectionState, Disconnected, HealthStatus, Pong,
    ReconnectError, ReconnectFailed, Reconnected, WebSocketStats,
};
use crate::error::{Error, Result};
use crate::protocol::{decode_event, Frame};
use crate::transport::{Transport, TransportEvent};

use super::backoff::Backoff;
use super::broadcaster::Broadcaster;
use super::clock::Clock;
use super::dedup::MessageDeduplicator;
use super::latency::LatencyMonitor;
use super::queue::{MessageQueue, QueuedMessage};

/// Reason attached to the `disconnect` event for a caller-initiated close.
pub const CLIENT_DISCONNECT_REASON: &str = "client disconnect";

/// What happened to a message handed to `emit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Written to the open connection.
    Sent,
    /// Buffered until the next successful connect.
    Queued,
    /// Discarded because the offline queue was full.
    Dropped,
}

/// Requests from client handles to the manager task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<ConnectionState>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Emit {
        event: String,
        payload: Value,
        reply: oneshot::Sender<EmitOutcome>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Senders for the state the manager publishes to handles.
pub(crate) struct Snapshots {
    pub health: watch::Sender<ConnectionHealth>,
    pub stats: watch::Sender<WebSocketStats>,
    pub state: watch::Sender<ConnectionState>,
}

impl Snapshots {
    fn publish(&self, health: &ConnectionHealth, stats: &WebSocketStats, state: ConnectionState) {
        self.health.send_replace(health.clone());
        self.stats.send_replace(stats.clone());
        self.state.send_replace(state);
    }
}

/// How an in-flight connection attempt ended.
enum AttemptEnd {
    Finished(Result<()>),
    TimedOut,
    Cancelled(Cancel),
}

/// Command that aborted a connection attempt.
enum Cancel {
    Disconnect(oneshot::Sender<()>),
    /// `None` when every handle was dropped.
    Shutdown(Option<oneshot::Sender<()>>),
}

pub(crate) struct ConnectionManager<T: Transport> {
    transport: T,
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    stopping: bool,
    state: ConnectionState,
    health: ConnectionHealth,
    stats: WebSocketStats,
    backoff: Backoff,
    dedup: MessageDeduplicator,
    queue: MessageQueue,
    latency: LatencyMonitor,
    broadcaster: Broadcaster,
    clock: Clock,
    snapshots: Snapshots,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    /// Retry number the pending reconnect timer belongs to.
    pending_attempt: u32,
    ping_timer: Option<Interval>,
}

impl<T: Transport> ConnectionManager<T> {
    pub(crate) fn new(
        transport: T,
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        broadcaster: Broadcaster,
        snapshots: Snapshots,
    ) -> Self {
        Self {
            backoff: Backoff::new(config.reconnection.clone()),
            dedup: MessageDeduplicator::new(&config.dedup),
            queue: MessageQueue::new(config.queue.capacity),
            latency: LatencyMonitor::new(config.latency.clone()),
            transport,
            config,
            commands,
            stopping: false,
            state: ConnectionState::Disconnected,
            health: ConnectionHealth::default(),
            stats: WebSocketStats::default(),
            broadcaster,
            clock: Clock::new(),
            snapshots,
            reconnect_timer: None,
            pending_attempt: 0,
            ping_timer: None,
        }
    }

    /// Drive the manager until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(transport = self.transport.name(), "Connection manager started");

        while !self.stopping {
            let connected = self.state.is_connected();
            tokio::select! {
                command = self.commands.recv() => self.handle_command(command).await,
                () = wait_for(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    let attempt = self.pending_attempt;
                    self.attempt_connect(attempt).await;
                }
                () = tick(&mut self.ping_timer) => self.send_ping().await,
                event = self.transport.next_event(), if connected => {
                    self.handle_transport_event(event).await;
                }
            }
        }

        info!("Connection manager stopped");
    }

    async fn handle_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::Connect { reply }) => {
                let state = self.connect().await;
                let _ = reply.send(state);
            }
            Some(Command::Disconnect { reply }) => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Some(Command::Emit {
                event,
                payload,
                reply,
            }) => {
                let outcome = self.emit(event, payload).await;
                let _ = reply.send(outcome);
            }
            Some(Command::Shutdown { reply }) => {
                self.disconnect().await;
                self.stopping = true;
                let _ = reply.send(());
            }
            None => {
                debug!("All client handles dropped");
                self.disconnect().await;
                self.stopping = true;
            }
        }
    }

    async fn connect(&mut self) -> ConnectionState {
        match self.state {
            ConnectionState::Connected => {
                debug!("Already connected");
            }
            ConnectionState::Reconnecting => {
                // Run the scheduled retry now instead of waiting for its timer.
                self.reconnect_timer = None;
                let attempt = self.pending_attempt;
                info!(attempt, "Connecting immediately, cancelling pending retry");
                self.attempt_connect(attempt).await;
            }
            ConnectionState::Disconnected
            | ConnectionState::Exhausted
            | ConnectionState::Connecting => {
                self.backoff.reset();
                self.set_state(ConnectionState::Connecting);
                self.publish_snapshots();
                self.attempt_connect(0).await;
            }
        }
        self.state
    }

    /// Run one connection attempt while still serving commands.
    ///
    /// `emit` is queued, `connect` waits for the outcome, and `disconnect` or
    /// `shutdown` drop the attempt on the spot.
    async fn attempt_connect(&mut self, attempt: u32) {
        let limit = self.config.connect_timeout;
        debug!(attempt, timeout_ms = limit.as_millis() as u64, "Opening connection");

        let mut waiters = Vec::new();
        let end = {
            let connecting = timeout(limit, self.transport.connect());
            tokio::pin!(connecting);
            loop {
                tokio::select! {
                    result = &mut connecting => break match result {
                        Ok(result) => AttemptEnd::Finished(result),
                        Err(_) => AttemptEnd::TimedOut,
                    },
                    command = self.commands.recv() => match command {
                        Some(Command::Connect { reply }) => waiters.push(reply),
                        Some(Command::Emit { event, payload, reply }) => {
                            let outcome = queue_offline(
                                &mut self.queue,
                                &mut self.stats,
                                &mut self.health,
                                event,
                                payload,
                            );
                            self.snapshots.publish(&self.health, &self.stats, self.state);
                            let _ = reply.send(outcome);
                        }
                        Some(Command::Disconnect { reply }) => {
                            break AttemptEnd::Cancelled(Cancel::Disconnect(reply));
                        }
                        Some(Command::Shutdown { reply }) => {
                            break AttemptEnd::Cancelled(Cancel::Shutdown(Some(reply)));
                        }
                        None => break AttemptEnd::Cancelled(Cancel::Shutdown(None)),
                    },
                }
            }
        };

        match end {
            AttemptEnd::Finished(Ok(())) => self.on_connected(attempt).await,
            AttemptEnd::Finished(Err(err)) => self.on_connect_failed(attempt, &err),
            AttemptEnd::TimedOut => {
                self.transport.close().await;
                self.on_connect_failed(attempt, &Error::Timeout(limit.as_millis() as u64));
            }
            AttemptEnd::Cancelled(cancel) => {
                info!(attempt, "Connection attempt cancelled");
                self.disconnect().await;
                match cancel {
                    Cancel::Disconnect(reply) => {
                        let _ = reply.send(());
                    }
                    Cancel::Shutdown(reply) => {
                        self.stopping = true;
                        if let Some(reply) = reply {
                            let _ = reply.send(());
                        }
                    }
                }
            }
        }

        for waiter in waiters {
            let _ = waiter.send(self.state);
        }
    }

    async fn on_connected(&mut self, attempt: u32) {
        let was_reconnecting = self.state == ConnectionState::Reconnecting;
        self.set_state(ConnectionState::Connected);
        self.backoff.reset();
        self.health.consecutive_failures = 0;
        self.health.status = HealthStatus::Healthy;
        self.start_latency();

        if was_reconnecting {
            self.stats.reconnect_count += 1;
            self.health.reconnect_count += 1;
            info!(attempt, total = self.stats.reconnect_count, "Reconnected");
        } else {
            info!("Connected");
        }
        self.publish_snapshots();

        self.broadcaster.publish(&Connected.into());
        if was_reconnecting {
            self.broadcaster.publish(&Reconnected { attempt }.into());
        }

        self.flush_queue().await;
    }

    fn on_connect_failed(&mut self, attempt: u32, err: &Error) {
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
        warn!(
            attempt,
            failures = self.health.consecutive_failures,
            error = %err,
            "Connection attempt failed"
        );
        self.broadcaster.publish(
            &ReconnectError {
                attempt,
                error: err.to_string(),
            }
            .into(),
        );
        self.schedule_retry();
    }

    /// Tear down a connection that was lost rather than closed by the caller.
    async fn on_connection_lost(&mut self, reason: String) {
        warn!(reason = %reason, "Connection lost, will reconnect");
        self.stop_latency();
        self.transport.close().await;
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
        self.broadcaster.publish(
            &Disconnected {
                reason: reason.clone(),
            }
            .into(),
        );
        self.broadcaster.publish(
            &ReconnectError {
                attempt: 0,
                error: reason,
            }
            .into(),
        );
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        match self.backoff.next_attempt() {
            Some((attempt, delay)) => {
                info!(
                    attempt,
                    max_attempts = self.backoff.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting after delay"
                );
                self.set_state(ConnectionState::Reconnecting);
                self.health.status = HealthStatus::Unhealthy;
                self.pending_attempt = attempt;
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
                self.publish_snapshots();
            }
            None => self.exhaust(),
        }
    }

    fn exhaust(&mut self) {
        let attempts = self.backoff.attempts();
        error!(attempts, "Reconnect attempts exhausted, giving up");
        self.reconnect_timer = None;
        self.stop_latency();
        self.set_state(ConnectionState::Exhausted);
        self.health.status = HealthStatus::Disconnected;
        self.publish_snapshots();
        self.broadcaster.publish(&ReconnectFailed { attempts }.into());
    }

    async fn disconnect(&mut self) {
        let was_connected = self.state.is_connected();
        if self.reconnect_timer.take().is_some() {
            debug!("Cancelled pending reconnect");
        }
        self.stop_latency();
        self.transport.close().await;
        self.backoff.reset();
        self.set_state(ConnectionState::Disconnected);
        self.health.status = HealthStatus::Disconnected;
        self.publish_snapshots();

        if was_connected {
            info!("Disconnected by client");
            self.broadcaster.publish(
                &Disconnected {
                    reason: CLIENT_DISCONNECT_REASON.to_string(),
                }
                .into(),
            );
        }
    }

    async fn emit(&mut self, event: String, payload: Value) -> EmitOutcome {
        if self.state.is_connected() {
            let frame = Frame::new(event, payload);
            return match self.transport.send(&frame).await {
                Ok(()) => {
                    self.stats.messages_sent += 1;
                    self.publish_snapshots();
                    EmitOutcome::Sent
                }
                Err(err) => {
                    self.queue.requeue_front(QueuedMessage {
                        event: frame.event,
                        payload: frame.data,
                    });
                    self.health.queue_size = self.queue.len();
                    self.on_connection_lost(format!("send failed: {err}")).await;
                    EmitOutcome::Queued
                }
            };
        }

        let outcome = queue_offline(
            &mut self.queue,
            &mut self.stats,
            &mut self.health,
            event,
            payload,
        );
        self.publish_snapshots();
        outcome
    }

    async fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let outcome = self.queue.flush_all(&mut self.transport).await;
        self.stats.messages_sent += outcome.sent as u64;
        self.health.queue_size = self.queue.len();
        info!(
            sent = outcome.sent,
            remaining = self.queue.len(),
            "Flushed offline queue"
        );
        self.publish_snapshots();

        if let Some(err) = outcome.error {
            self.on_connection_lost(format!("send failed: {err}")).await;
        }
    }

    async fn handle_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Frame(frame)) => self.handle_frame(frame),
            Some(TransportEvent::Closed { reason }) => self.on_connection_lost(reason).await,
            None => {
                self.on_connection_lost("transport stream ended".to_string())
                    .await;
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        let name = frame.event.clone();
        let inbound = match decode_event(frame) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => {
                debug!(event = %name, "Ignoring unhandled event");
                return;
            }
            Err(err) => {
                warn!(event = %name, error = %err, "Dropping malformed frame");
                return;
            }
        };

        self.stats.messages_received += 1;

        if let Some(key) = &inbound.dedup_key {
            let timestamp_ms = key.timestamp_ms.unwrap_or_else(|| self.clock.now_ms());
            if self
                .dedup
                .is_duplicate(&key.id, inbound.event.kind(), timestamp_ms)
            {
                self.stats.duplicates_filtered += 1;
                trace!(event = %name, id = %key.id, "Filtered duplicate");
                self.publish_snapshots();
                return;
            }
        }

        if let ClientEvent::Pong(Pong { timestamp }) = &inbound.event {
            self.record_pong(*timestamp);
        }

        self.publish_snapshots();
        self.broadcaster.publish(&inbound.event);
    }

    fn record_pong(&mut self, timestamp: i64) {
        self.stats.pongs_received += 1;
        let now = self.clock.now_ms();
        match self.latency.record_pong(timestamp, now) {
            Some(sample) => {
                trace!(rtt_ms = sample.rtt_ms, average_ms = sample.average_ms, "Pong");
                self.health.latency_ms = Some(sample.rtt_ms);
                self.health.last_ping_time = Some(now);
                self.health.status = sample.status;
                self.stats.average_latency_ms = Some(sample.average_ms);
            }
            None => debug!(timestamp, "Pong matched no outstanding ping"),
        }
    }

    async fn send_ping(&mut self) {
        if !self.state.is_connected() {
            self.ping_timer = None;
            return;
        }

        let timestamp = self.latency.on_ping(self.clock.now_ms());
        if self.latency.should_force_reconnect() {
            let missed = self.latency.missed_streak();
            self.on_connection_lost(format!("{missed} consecutive pongs missed"))
                .await;
            return;
        }

        match self.transport.send(&Frame::ping(timestamp)).await {
            Ok(()) => {
                self.stats.pings_sent += 1;
                self.publish_snapshots();
            }
            Err(err) => {
                self.on_connection_lost(format!("ping failed: {err}")).await;
            }
        }
    }

    fn start_latency(&mut self) {
        self.latency.start();
        let period = self.config.latency.ping_interval();
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ping_timer = Some(ping);
    }

    fn stop_latency(&mut self) {
        self.latency.stop();
        self.ping_timer = None;
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "State transition");
            self.state = state;
        }
    }

    fn publish_snapshots(&self) {
        self.snapshots.publish(&self.health, &self.stats, self.state);
    }
}

/// Buffer an outbound message while no connection is open.
fn queue_offline(
    queue: &mut MessageQueue,
    stats: &mut WebSocketStats,
    health: &mut ConnectionHealth,
    event: String,
    payload: Value,
) -> EmitOutcome {
    if queue.enqueue(event.as_str(), payload) {
        trace!(event = %event, queued = queue.len(), "Queued while offline");
        health.queue_size = queue.len();
        EmitOutcome::Queued
    } else {
        stats.messages_dropped += 1;
        warn!(
            event = %event,
            capacity = queue.capacity(),
            "Outbound queue full, dropping message"
        );
        EmitOutcome::Dropped
    }
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(delay) => delay.as_mut().await,
        None => pending().await,
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
