//! Client runtime: the connection manager and the components it drives.

mod backoff;
mod broadcaster;
mod client;
mod clock;
mod dedup;
mod latency;
mod manager;
mod queue;

pub use backoff::Backoff;
pub use broadcaster::{listener, typed_listener, Broadcaster, Listener};
pub use client::Client;
pub use clock::Clock;
pub use dedup::MessageDeduplicator;
pub use latency::{LatencyMonitor, PongSample};
pub use manager::{EmitOutcome, CLIENT_DISCONNECT_REASON};
pub use queue::{FlushOutcome, MessageQueue, QueuedMessage};
