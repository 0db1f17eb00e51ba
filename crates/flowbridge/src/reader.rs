//! Per-flow reader — drains one flow link into the shared queue.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use flowbridge_core::{FlowLink, PeerAddress, ReadOutcome, Unit};

use crate::queue::PacketQueue;
use crate::table::{ActiveFlow, FlowTable};

/// Handles of spawned bridge tasks, joined at shutdown.
pub(crate) type TaskSet = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Record a new flow in the table and start its reader task.
///
/// Used by both sides: the dispatcher for accepted inbound flows and the
/// facade for granted outbound ones.
pub(crate) fn spawn_flow(
    link: Arc<dyn FlowLink>,
    peer_name: &str,
    flows: &FlowTable,
    queue: &Arc<PacketQueue>,
    max_unit_size: usize,
    shutdown: &broadcast::Sender<()>,
    tasks: &TaskSet,
) -> PeerAddress {
    let peer = PeerAddress::new(link.id(), peer_name);
    flows.insert(
        link.id(),
        ActiveFlow {
            link: link.clone(),
            peer: peer.clone(),
            established_at: Instant::now(),
        },
    );

    let handle = tokio::spawn(read_loop(
        link,
        peer.clone(),
        queue.clone(),
        max_unit_size,
        flows.clone(),
        shutdown.subscribe(),
    ));
    tasks.lock().push(handle);

    peer
}

/// Read units from `link` until closure, a fatal error, or shutdown.
///
/// Oversized units are dropped and logged; the loop keeps reading and the
/// queue is untouched. On exit the flow is pruned from the table so later
/// sends report closure. Nothing here affects other flows or the queue's
/// already-delivered contents.
async fn read_loop(
    link: Arc<dyn FlowLink>,
    from: PeerAddress,
    queue: Arc<PacketQueue>,
    max_unit_size: usize,
    flows: FlowTable,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let outcome = tokio::select! {
            _ = shutdown.recv() => break,
            outcome = link.read() => outcome,
        };

        match outcome {
            Ok(ReadOutcome::Data(payload)) => {
                if payload.len() > max_unit_size {
                    tracing::warn!(
                        from = %from,
                        len = payload.len(),
                        max = max_unit_size,
                        "oversized unit received, discarding"
                    );
                    continue;
                }
                let unit = Unit {
                    from: from.clone(),
                    payload,
                };
                // A full queue may park us; stay responsive to shutdown.
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = queue.push(unit) => {}
                }
            }
            Ok(ReadOutcome::Closed) => {
                tracing::debug!(from = %from, "flow closed by peer");
                break;
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(from = %from, error = %e, "transient read error, retrying");
            }
            Err(e) => {
                tracing::warn!(from = %from, error = %e, "read failed, terminating reader");
                break;
            }
        }
    }

    // Prune the dead flow so the facade reports closure on send.
    if flows.remove(&link.id()).is_some() {
        tracing::info!(flow = %link.id(), peer = %from.peer, "pruned dead flow from table");
    }
}
