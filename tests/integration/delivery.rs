//! End-to-end delivery: ordering, interleaving, oversize, closure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowbridge::memory::MemoryFabric;
use flowbridge::{BridgeError, FlowBridge, FlowId, PeerAddress, Role};
use flowbridge_core::BridgeConfig;

use crate::{drain_n, pair, SERVER};

#[tokio::test]
async fn echo_round_trip() {
    let (server, client) = pair(BridgeConfig::default()).await;

    let peer = client.connect(SERVER).await.expect("connect failed");
    client.send(b"ping", &peer).await.expect("send failed");

    let mut at_server = drain_n(&server, 1).await;
    let (payload, from) = at_server.pop().expect("missing unit");
    assert_eq!(payload, b"ping");

    server.send(b"pong", &from).await.expect("reply failed");
    let mut at_client = drain_n(&client, 1).await;
    let (payload, reply_from) = at_client.pop().expect("missing reply");
    assert_eq!(payload, b"pong");
    assert_eq!(reply_from, peer);

    client.shutdown().await;
    server.shutdown().await;
}

/// Two flows pushing 100 tagged units each: every unit arrives, each
/// flow's subsequence stays in its own send order, and the 201st receive
/// comes back empty.
#[tokio::test]
async fn interleaved_flows_preserve_per_flow_order() {
    let fabric = MemoryFabric::new();
    let config = BridgeConfig::default();
    let server = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), config.clone())
        .await
        .expect("server init failed");
    let client_a = FlowBridge::init(Role::Client, "client.a", fabric.endpoint(), config.clone())
        .await
        .expect("client.a init failed");
    let client_b = FlowBridge::init(Role::Client, "client.b", fabric.endpoint(), config)
        .await
        .expect("client.b init failed");

    let peer_a = client_a.connect(SERVER).await.expect("connect a failed");
    let peer_b = client_b.connect(SERVER).await.expect("connect b failed");

    async fn send_all(client: Arc<FlowBridge>, peer: PeerAddress, tag: &'static str) {
        for i in 0..100 {
            client
                .send(format!("{tag}:{i}").as_bytes(), &peer)
                .await
                .expect("send failed");
        }
    }
    let task_a = tokio::spawn(send_all(client_a.clone(), peer_a, "a"));
    let task_b = tokio::spawn(send_all(client_b.clone(), peer_b, "b"));
    task_a.await.expect("sender a panicked");
    task_b.await.expect("sender b panicked");

    let units = drain_n(&server, 200).await;
    assert_eq!(units.len(), 200);

    let mut next_seq: HashMap<FlowId, usize> = HashMap::new();
    let mut flow_of_tag: HashMap<String, FlowId> = HashMap::new();
    for (payload, from) in &units {
        let text = String::from_utf8(payload.clone()).expect("bad payload");
        let (tag, seq) = text.split_once(':').expect("bad tag");
        let seq: usize = seq.parse().expect("bad sequence");

        // All of one tag's units come from the same flow.
        let flow = *flow_of_tag.entry(tag.to_string()).or_insert(from.flow);
        assert_eq!(flow, from.flow, "tag {tag} switched flows");

        let expected = next_seq.entry(from.flow).or_insert(0);
        assert_eq!(seq, *expected, "flow {tag} out of order");
        *expected += 1;
    }
    assert_eq!(flow_of_tag.len(), 2);
    assert!(next_seq.values().all(|&n| n == 100));

    // Receive call 201 finds nothing.
    assert!(server.receive().is_none());

    client_a.shutdown().await;
    client_b.shutdown().await;
    server.shutdown().await;
}

/// A unit above the receiver's maximum never reaches the host, and the
/// flow keeps working afterwards.
#[tokio::test]
async fn oversized_units_are_dropped_at_receive() {
    let fabric = MemoryFabric::new();
    let mut strict = BridgeConfig::default();
    strict.flow.max_unit_size = 64;

    let server = FlowBridge::init(Role::Server, SERVER, fabric.endpoint(), strict)
        .await
        .expect("server init failed");
    let client = FlowBridge::init(
        Role::Client,
        "bridge-test.client",
        fabric.endpoint(),
        BridgeConfig::default(),
    )
    .await
    .expect("client init failed");

    let peer = client.connect(SERVER).await.expect("connect failed");
    client
        .send(&[0u8; 100], &peer)
        .await
        .expect("oversize send is legal under the sender's config");
    client.send(b"fits", &peer).await.expect("send failed");

    let units = drain_n(&server, 1).await;
    assert_eq!(units[0].0, b"fits");
    assert!(server.receive().is_none());

    client.shutdown().await;
    server.shutdown().await;
}

/// A flow closing with units in flight still delivers them, in order;
/// afterwards nothing more arrives from it and sends to it fail.
#[tokio::test]
async fn closed_flow_delivers_in_flight_units_first() {
    let (server, client) = pair(BridgeConfig::default()).await;

    let peer = client.connect(SERVER).await.expect("connect failed");
    for i in 0..3 {
        client
            .send(format!("u{i}").as_bytes(), &peer)
            .await
            .expect("send failed");
    }
    client.shutdown().await;

    let units = drain_n(&server, 3).await;
    for (i, (payload, _)) in units.iter().enumerate() {
        assert_eq!(payload, format!("u{i}").as_bytes());
    }
    assert!(server.receive().is_none());

    // The reader prunes the dead flow; replies then report closure.
    let mut tries = 0;
    while server.flow_count() != 0 && tries < 100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tries += 1;
    }
    assert_eq!(server.flow_count(), 0, "dead flow never pruned");

    let from = units[0].1.clone();
    let err = server
        .send(b"late", &from)
        .await
        .expect_err("send to closed flow should fail");
    assert!(matches!(err, BridgeError::FlowClosed(_)));

    server.shutdown().await;
}
