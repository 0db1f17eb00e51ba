//! Failure surfacing: every error in the taxonomy stays local to its
//! caller and never takes a task or the process down.

use std::time::{Duration, Instant};

use flowbridge::memory::MemoryFabric;
use flowbridge::{BridgeError, FlowBridge, FlowId, PeerAddress, Role};
use flowbridge_core::{BridgeConfig, ControlPlane, DEFAULT_MAX_UNIT_SIZE};

use crate::{pair, SERVER};

#[tokio::test]
async fn second_registration_of_name_fails() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();

    let first = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config.clone())
        .await
        .expect("first server init failed");

    let err = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config)
        .await
        .expect_err("second registration should fail");
    assert!(matches!(err, BridgeError::RegistrationFailed { .. }));

    first.shutdown().await;
}

/// A client-role endpoint that owns a published name refuses inbound
/// requests, and the requester sees the refusal, not a hang.
#[tokio::test]
async fn connect_to_client_endpoint_is_refused() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();

    let decoy_endpoint = fabric.endpoint();
    decoy_endpoint
        .register("decoy.app")
        .await
        .expect("register failed");
    let decoy = FlowBridge::init(
        Role::Client,
        "decoy.app",
        decoy_endpoint.clone(),
        config.clone(),
    )
    .await
    .expect("decoy init failed");

    let client = FlowBridge::init(Role::Client, "probe", fabric.endpoint(), config)
        .await
        .expect("client init failed");

    let err = client
        .connect("decoy.app")
        .await
        .expect_err("connect should be refused");
    assert!(matches!(err, BridgeError::AllocationRefused { .. }));

    client.shutdown().await;
    decoy.shutdown().await;
}

#[tokio::test]
async fn connect_times_out_when_nobody_answers() {
    let fabric = MemoryFabric::new();

    // A registered name whose event stream nobody drains: the request is
    // delivered but never answered.
    let silent = fabric.endpoint();
    silent
        .register("sleepy.server")
        .await
        .expect("register failed");

    let mut config = BridgeConfig::default();
    config.connect.response_timeout_ms = 200;
    let client = FlowBridge::init(Role::Client, "probe", fabric.endpoint(), config)
        .await
        .expect("client init failed");

    let started = Instant::now();
    let err = client
        .connect("sleepy.server")
        .await
        .expect_err("connect should time out");
    assert!(matches!(err, BridgeError::AllocationTimeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(200));

    client.shutdown().await;
}

#[tokio::test]
async fn connect_to_unknown_name_surfaces_control_error() {
    let (server, client) = pair(BridgeConfig::default()).await;

    let err = client
        .connect("nobody.home")
        .await
        .expect_err("connect should fail");
    assert!(matches!(err, BridgeError::ControlPlane(_)));

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn send_to_unknown_peer_reports_closed_flow() {
    let (server, client) = pair(BridgeConfig::default()).await;

    let ghost = PeerAddress::new(FlowId(0xdead), "ghost");
    let err = client
        .send(b"hello", &ghost)
        .await
        .expect_err("send should fail");
    assert!(matches!(err, BridgeError::FlowClosed(_)));

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn oversized_send_is_rejected_locally() {
    let (server, client) = pair(BridgeConfig::default()).await;

    let peer = client.connect(SERVER).await.expect("connect failed");
    let payload = vec![0u8; DEFAULT_MAX_UNIT_SIZE + 1];
    let err = client
        .send(&payload, &peer)
        .await
        .expect_err("oversized send should fail");
    assert!(matches!(err, BridgeError::OversizedUnit { .. }));

    client.shutdown().await;
    server.shutdown().await;
}
