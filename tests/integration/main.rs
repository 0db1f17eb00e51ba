//! Flow bridge integration tests.
//!
//! Every test drives the public surface end to end over the in-memory
//! fabric; nothing here reaches into crate internals. Each test builds its
//! own fabric, so tests cannot interfere with each other.

mod delivery;
mod failures;
mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use flowbridge::memory::MemoryFabric;
use flowbridge::{FlowBridge, PeerAddress, Role};
use flowbridge_core::BridgeConfig;

pub const SERVER: &str = "bridge-test.server";

/// Server + client pair over a fresh fabric.
pub async fn pair(config: BridgeConfig) -> (Arc<FlowBridge>, Arc<FlowBridge>) {
    let fabric = MemoryFabric::new();
    let server = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config.clone())
        .await
        .expect("server init failed");
    let client = FlowBridge::init(Role::Client, "bridge-test.client", fabric.endpoint(), config)
        .await
        .expect("client init failed");
    (server, client)
}

/// Collect exactly `n` units from `bridge`, waiting on its poll handle.
pub async fn drain_n(bridge: &FlowBridge, n: usize) -> Vec<(Vec<u8>, PeerAddress)> {
    let ready = bridge.poll_handle();
    let mut out = Vec::with_capacity(n);
    tokio::time::timeout(Duration::from_secs(5), async {
        while out.len() < n {
            if !ready.readable().await {
                break;
            }
            while let Some((payload, from)) = bridge.receive() {
                out.push((payload.to_vec(), from));
                if out.len() == n {
                    break;
                }
            }
        }
    })
    .await
    .expect("timed out draining units");
    out
}
