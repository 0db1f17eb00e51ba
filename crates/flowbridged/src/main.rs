//! flowbridged — loopback demonstration daemon for the flow bridge.
//!
//! Wires a server and a client facade over the in-memory fabric, drives an
//! echo exchange through the public surface, and shuts down on ctrl-c or
//! once the exchange completes.

use std::time::Duration;

use anyhow::Result;

use flowbridge::memory::MemoryFabric;
use flowbridge::{FlowBridge, Role};
use flowbridge_core::BridgeConfig;

const SERVER_NAME: &str = "flowbridged.echo";
const ROUNDS: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = BridgeConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = BridgeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BridgeConfig::default()
    });
    tracing::info!(
        queue_capacity = config.queue.capacity,
        max_unit_size = config.flow.max_unit_size,
        "flowbridged starting"
    );

    let fabric = MemoryFabric::new();

    let server = FlowBridge::init(
        Role::Server,
        SERVER_NAME,
        fabric.endpoint(),
        config.clone(),
    )
    .await?;
    let client = FlowBridge::init(
        Role::Client,
        "flowbridged.client",
        fabric.endpoint(),
        config,
    )
    .await?;

    // Server side: echo every unit back to its sender.
    let echo = {
        let server = server.clone();
        tokio::spawn(async move {
            let ready = server.poll_handle();
            while ready.readable().await {
                while let Some((payload, from)) = server.receive() {
                    tracing::debug!(from = %from, len = payload.len(), "echoing unit");
                    if let Err(e) = server.send(&payload, &from).await {
                        tracing::warn!(error = %e, "echo failed");
                    }
                }
            }
            tracing::info!("echo loop done");
        })
    };

    let peer = client.connect(SERVER_NAME).await?;
    tracing::info!(peer = %peer, flows = server.flow_count(), "connected");

    let ready = client.poll_handle();
    'rounds: for round in 0..ROUNDS {
        let msg = format!("ping {round}");
        client.send(msg.as_bytes(), &peer).await?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break 'rounds;
            }
            readable = ready.readable() => {
                if !readable {
                    break 'rounds;
                }
                if let Some((payload, from)) = client.receive() {
                    tracing::info!(
                        round,
                        from = %from,
                        reply = %String::from_utf8_lossy(&payload),
                        "round trip"
                    );
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                tracing::warn!(round, "no reply within 5s, giving up");
                break 'rounds;
            }
        }
    }

    client.shutdown().await;
    server.shutdown().await;
    echo.await.ok();

    tracing::info!("flowbridged done");
    Ok(())
}
