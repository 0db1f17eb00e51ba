//! Lifecycle: dispatcher resilience, shutdown, and role behavior.

use std::time::Duration;

use flowbridge::memory::MemoryFabric;
use flowbridge::{BridgeError, FlowBridge, Role};
use flowbridge_core::{BridgeConfig, ControlEvent, ControlPlane};

use crate::{drain_n, pair, SERVER};

/// An event type the bridge does not recognize must be skipped, not kill
/// the dispatch loop.
#[tokio::test]
async fn dispatcher_survives_unknown_control_event() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();

    let server_endpoint = fabric.endpoint();
    let server = FlowBridge::init(Role::Server, SERVER, server_endpoint.clone(), config.clone())
        .await
        .expect("server init failed");

    server_endpoint.inject(ControlEvent::Other {
        kind: "vendor-extension".to_string(),
    });

    // The dispatcher must still be accepting flows afterwards.
    let client = FlowBridge::init(Role::Client, "bridge-test.client", fabric.endpoint(), config)
        .await
        .expect("client init failed");
    let peer = client
        .connect(SERVER)
        .await
        .expect("connect after unknown event failed");
    client.send(b"still alive", &peer).await.expect("send failed");

    let units = drain_n(&server, 1).await;
    assert_eq!(units[0].0, b"still alive");

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_registration_and_stops_delivery() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();

    let server = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config.clone())
        .await
        .expect("server init failed");
    let client = FlowBridge::init(
        Role::Client,
        "bridge-test.client",
        fabric.endpoint(),
        config.clone(),
    )
    .await
    .expect("client init failed");

    let peer = client.connect(SERVER).await.expect("connect failed");
    client.send(b"one", &peer).await.expect("send failed");
    let units = drain_n(&server, 1).await;
    assert_eq!(units[0].0, b"one");

    server.shutdown().await;
    assert!(server.receive().is_none());

    // The name is free again for a replacement server.
    let second = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config)
        .await
        .expect("name should be free after shutdown");

    // The client's reader observes the closed flow; sends start failing.
    let mut closed = false;
    for _ in 0..100 {
        if client.send(b"late", &peer).await.is_err() {
            closed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(closed, "send kept succeeding after server shutdown");

    second.shutdown().await;
    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (server, client) = pair(BridgeConfig::default()).await;

    client.shutdown().await;
    client.shutdown().await;

    let err = client
        .connect(SERVER)
        .await
        .expect_err("connect after shutdown should fail");
    assert!(matches!(err, BridgeError::ShutDown));
    assert!(client.receive().is_none());

    server.shutdown().await;
}

/// Client role only opens a control-plane session; it must not claim the
/// application name.
#[tokio::test]
async fn client_init_does_not_claim_name() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();

    let client = FlowBridge::init(Role::Client, "shared.name", fabric.endpoint(), config.clone())
        .await
        .expect("client init failed");

    let probe = fabric.endpoint();
    probe
        .register("shared.name")
        .await
        .expect("client role should not have claimed the name");

    client.shutdown().await;
}
