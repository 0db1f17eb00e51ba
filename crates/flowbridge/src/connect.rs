//! Outbound flow allocation — request/response correlation.
//!
//! Every in-flight request is an entry in a token-keyed table with its own
//! completion channel, so a response wakes exactly its requester instead of
//! every waiter re-scanning a shared event stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use flowbridge_core::{FlowLink, RequestToken};

/// Outcome routed back from the dispatcher for one allocation request.
pub(crate) enum AllocationOutcome {
    Granted(Arc<dyn FlowLink>),
    Refused(String),
}

/// In-flight allocation requests keyed by token.
///
/// The dispatcher completes entries as responses arrive; requesters claim
/// their token and await the completion. A response that lands before its
/// requester has claimed the token is stashed and handed over on claim, so
/// the two sides cannot race.
#[derive(Clone, Default)]
pub(crate) struct PendingAllocations {
    inner: Arc<Mutex<Pending>>,
}

#[derive(Default)]
struct Pending {
    waiters: HashMap<RequestToken, oneshot::Sender<AllocationOutcome>>,
    early: HashMap<RequestToken, AllocationOutcome>,
}

impl PendingAllocations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim a token, returning the receiver its response will arrive on.
    pub(crate) fn claim(&self, token: RequestToken) -> oneshot::Receiver<AllocationOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.inner.lock();
        if let Some(outcome) = pending.early.remove(&token) {
            // The response beat us here; complete immediately.
            let _ = tx.send(outcome);
        } else {
            pending.waiters.insert(token, tx);
        }
        rx
    }

    /// Route a response to its waiter, or stash it for a late claimer.
    pub(crate) fn complete(&self, token: RequestToken, outcome: AllocationOutcome) {
        let mut pending = self.inner.lock();
        match pending.waiters.remove(&token) {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(%token, "allocation waiter gone, dropping response");
                }
            }
            None => {
                pending.early.insert(token, outcome);
            }
        }
    }

    /// Forget a claim that will never complete (timeout path).
    pub(crate) fn abandon(&self, token: RequestToken) {
        let mut pending = self.inner.lock();
        pending.waiters.remove(&token);
        pending.early.remove(&token);
    }
}

/// Distinct local endpoint identity for one allocation request.
///
/// Collision-resistant so concurrent connects from the same application
/// never alias each other at the control plane.
pub(crate) fn local_endpoint_id(local_name: &str) -> String {
    format!("{local_name}-{:08x}", rand::random::<u32>())
}
