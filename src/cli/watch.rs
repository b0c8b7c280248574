//! `daemon-link watch`: connect, subscribe and stream events to the terminal.

use std::time::Duration;

use chrono::Local;
use tokio::signal;
use tracing::info;

use crate::cli::{output, WatchArgs};
use crate::config::Config;
use crate::domain::{ClientEvent, ConnectionState, EventKind};
use crate::error::Result;
use crate::runtime::{listener, Client, EmitOutcome};
use crate::transport::WebSocketTransport;

pub async fn execute(args: &WatchArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    config.init_logging();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("url", &config.server.url);

    let transport = WebSocketTransport::new(config.server.url.clone());
    let client = Client::spawn(transport, config.client_config())?;

    let printer = listener(print_event);
    for kind in EventKind::ALL {
        client.on(kind, printer.clone());
    }

    // Emitted before connecting so they are queued and flushed on connect.
    for id in &args.coordinations {
        report_emit("join_coordination", id, client.join_coordination(id).await?);
    }
    for id in &args.sessions {
        report_emit("subscribe_session", id, client.subscribe_to_session(id).await?);
    }

    let state = client.connect().await?;
    info!(state = %state, "Initial connect finished");

    output::section("Events");
    let mut state_rx = client.watch_state();
    let period = Duration::from_secs(args.health_interval.max(1));
    let mut health_tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = health_tick.tick() => {
                output::health(&now(), &client.connection_health());
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if *state_rx.borrow_and_update() == ConnectionState::Exhausted {
                    output::error("Reconnect attempts exhausted");
                    break;
                }
            }
        }
    }

    let stats = client.stats();
    client.shutdown().await?;

    output::section("Summary");
    output::field("received", stats.messages_received);
    output::field("sent", stats.messages_sent);
    output::field("duplicates", stats.duplicates_filtered);
    output::field("dropped", stats.messages_dropped);
    output::field("reconnects", stats.reconnect_count);
    if let Some(avg) = stats.average_latency_ms {
        output::field("avg latency", format!("{avg:.1}ms"));
    }
    Ok(())
}

fn print_event(event: &ClientEvent) {
    let name = event.kind().name();
    let message = match event {
        ClientEvent::Connect(_) => String::new(),
        ClientEvent::Disconnect(d) => d.reason.clone(),
        ClientEvent::Reconnect(r) => format!("after {} attempt(s)", r.attempt),
        ClientEvent::ReconnectError(e) => format!("attempt {}: {}", e.attempt, e.error),
        ClientEvent::ReconnectFailed(f) => format!("gave up after {} attempts", f.attempts),
        ClientEvent::Pong(_) => return,
        ClientEvent::Error(e) => match &e.code {
            Some(code) => format!("[{code}] {}", e.message),
            None => e.message.clone(),
        },
        other => other
            .domain_payload()
            .map(ToString::to_string)
            .unwrap_or_default(),
    };
    output::event(&now(), name, message);
}

fn report_emit(action: &str, id: &str, outcome: EmitOutcome) {
    match outcome {
        EmitOutcome::Sent | EmitOutcome::Queued => output::field(action, id),
        EmitOutcome::Dropped => output::warning(&format!("{action} {id} dropped: queue full")),
    }
}

fn now() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
