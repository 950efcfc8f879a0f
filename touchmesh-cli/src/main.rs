//! touchmesh CLI: a headless participant.
//!
//! Reads pointer and touch commands from stdin (see `help`), drives a sync
//! client against the relay at `TOUCHMESH_URL` (default
//! `ws://127.0.0.1:9090`), and logs connection status and remote activity.
//! Log verbosity follows `RUST_LOG`.

mod commands;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use touchmesh_sync::client::{ClientConfig, SyncClient};
use touchmesh_sync::identity::{short_id, Identity};
use touchmesh_sync::session::SyncEvent;

use commands::{parse_line, Command, HELP};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match std::env::var("TOUCHMESH_URL") {
        Ok(url) => ClientConfig::with_url(url),
        Err(_) => ClientConfig::default(),
    };
    let identity = Identity::generate();
    info!(
        "Starting touchmesh participant {} with color {}",
        identity.short_id(),
        identity.color()
    );

    let mut client = SyncClient::spawn(config, identity);
    if let Some(mut events) = client.take_event_rx() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                break;
            }
        };

        match parse_line(&line) {
            Ok(Some(Command::Input(event))) => {
                if client.send_input(event).await.is_err() {
                    warn!("Client stopped, exiting");
                    break;
                }
            }
            Ok(Some(Command::Status)) => {
                let status = client.snapshot().status;
                println!(
                    "{} | {} active | you are {}",
                    status.connection_label, status.active_participants, status.color_hex
                );
            }
            Ok(Some(Command::Help)) => println!("{HELP}"),
            Ok(Some(Command::Quit)) => break,
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
    }

    client.shutdown().await;
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::StatusChanged(state) => info!("Status: {state}"),
        SyncEvent::TransportError(e) => warn!("Transport: {e}"),
        SyncEvent::RemoteUpdated {
            participant_id,
            touches,
            color,
        } => info!(
            "User {} ({color}) touching at {touches} point(s)",
            short_id(participant_id)
        ),
        SyncEvent::RemoteCleared { participant_id, .. } => {
            info!("User {} lifted", short_id(participant_id))
        }
        SyncEvent::ActiveCountChanged(n) => info!("{n} active participant(s)"),
    }
}
