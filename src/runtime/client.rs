//! Cloneable handle to a running connection manager.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::ClientConfig;
use crate::domain::{ConnectionHealth, ConnectionState, EventKind, EventPayload, WebSocketStats};
use crate::error::{Error, Result};
use crate::protocol::names;
use crate::transport::Transport;

use super::broadcaster::{typed_listener, Broadcaster, Listener};
use super::manager::{Command, ConnectionManager, EmitOutcome, Snapshots};

/// Real-time client for the daemon's event channel.
///
/// Cloning is cheap; all clones drive the same connection. The connection
/// manager task stops when [`shutdown`](Self::shutdown) is called or the last
/// clone is dropped.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    broadcaster: Broadcaster,
    health: watch::Receiver<ConnectionHealth>,
    stats: watch::Receiver<WebSocketStats>,
    state: watch::Receiver<ConnectionState>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Client {
    /// Start a connection manager for `transport` on the current tokio runtime.
    ///
    /// The client starts disconnected; call [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `config` fails [`ClientConfig::validate`].
    #[allow(clippy::result_large_err)]
    pub fn spawn<T>(transport: T, config: ClientConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        config.validate()?;

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (health_tx, health) = watch::channel(ConnectionHealth::default());
        let (stats_tx, stats) = watch::channel(WebSocketStats::default());
        let (state_tx, state) = watch::channel(ConnectionState::default());
        let broadcaster = Broadcaster::new();

        let manager = ConnectionManager::new(
            transport,
            config,
            commands_rx,
            broadcaster.clone(),
            Snapshots {
                health: health_tx,
                stats: stats_tx,
                state: state_tx,
            },
        );
        let task = tokio::spawn(manager.run());

        Ok(Self {
            commands,
            broadcaster,
            health,
            stats,
            state,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    /// Open the connection, retrying in the background on failure.
    ///
    /// Resolves once the first attempt finishes and returns the resulting
    /// state: `Connected`, or `Reconnecting`/`Exhausted` if it failed, or
    /// `Disconnected` if [`disconnect`](Self::disconnect) cancelled it. While a
    /// retry is pending, the retry runs immediately instead of waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] once the client has been shut down.
    pub async fn connect(&self) -> Result<ConnectionState> {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// Close the connection and cancel pending retries. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] once the client has been shut down.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Disconnect and stop the manager task, waiting for it to exit.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "Connection manager task ended abnormally");
            }
        }
        Ok(())
    }

    /// Send an event to the daemon, or queue it while offline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] once the client has been shut down.
    pub async fn emit(&self, event: impl Into<String>, payload: Value) -> Result<EmitOutcome> {
        let event = event.into();
        self.request(|reply| Command::Emit {
            event,
            payload,
            reply,
        })
        .await
    }

    pub async fn join_coordination(&self, coordination_id: &str) -> Result<EmitOutcome> {
        self.emit(names::JOIN_COORDINATION, Value::from(coordination_id))
            .await
    }

    pub async fn leave_coordination(&self, coordination_id: &str) -> Result<EmitOutcome> {
        self.emit(names::LEAVE_COORDINATION, Value::from(coordination_id))
            .await
    }

    pub async fn subscribe_to_session(&self, session_id: &str) -> Result<EmitOutcome> {
        self.emit(names::SUBSCRIBE_SESSION, Value::from(session_id))
            .await
    }

    pub async fn unsubscribe_from_session(&self, session_id: &str) -> Result<EmitOutcome> {
        self.emit(names::UNSUBSCRIBE_SESSION, Value::from(session_id))
            .await
    }

    /// Register a listener. Returns `false` if it was already registered for `kind`.
    pub fn on(&self, kind: EventKind, listener: Listener) -> bool {
        self.broadcaster.subscribe(kind, listener)
    }

    /// Register a typed payload callback and return the listener for [`off`](Self::off).
    pub fn on_event<P, F>(&self, f: F) -> Listener
    where
        P: EventPayload,
        F: Fn(&P) + Send + Sync + 'static,
    {
        let listener = typed_listener::<P, F>(f);
        self.broadcaster.subscribe(P::KIND, Arc::clone(&listener));
        listener
    }

    /// Remove a listener. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.broadcaster.unsubscribe(kind, listener)
    }

    #[must_use]
    pub fn connection_health(&self) -> ConnectionHealth {
        self.health.borrow().clone()
    }

    #[must_use]
    pub fn stats(&self) -> WebSocketStats {
        self.stats.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every health change.
    #[must_use]
    pub fn watch_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.clone()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| Error::Shutdown)?;
        response.await.map_err(|_| Error::Shutdown)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
