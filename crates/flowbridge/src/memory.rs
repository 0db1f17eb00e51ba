//! In-memory transport fabric — a process-local control plane and flow
//! links for tests and demos.
//!
//! Every endpoint gets its own control-plane handle; flows are paired
//! in-memory channels. Acceptance and refusal travel back to the requester
//! as ordinary control events, the same shape a real transport gives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use flowbridge_core::{
    ControlError, ControlEvent, ControlPlane, FlowError, FlowId, FlowLink, ReadOutcome,
    RequestToken,
};

/// Process-local fabric connecting named endpoints.
pub struct MemoryFabric {
    apps: DashMap<String, mpsc::UnboundedSender<ControlEvent>>,
    pending: DashMap<FlowId, PendingFlow>,
    next_flow: AtomicU64,
    next_token: AtomicU64,
}

struct PendingFlow {
    token: RequestToken,
    requester: mpsc::UnboundedSender<ControlEvent>,
    requester_link: Arc<dyn FlowLink>,
}

impl MemoryFabric {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            apps: DashMap::new(),
            pending: DashMap::new(),
            next_flow: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
        })
    }

    /// Create a fresh endpoint handle on this fabric.
    pub fn endpoint(self: &Arc<Self>) -> Arc<MemoryEndpoint> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(MemoryEndpoint {
            fabric: self.clone(),
            events_tx,
            events: tokio::sync::Mutex::new(events_rx),
        })
    }

    fn fresh_token(&self) -> RequestToken {
        RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }
}

/// One endpoint's view of the fabric.
pub struct MemoryEndpoint {
    fabric: Arc<MemoryFabric>,
    events_tx: mpsc::UnboundedSender<ControlEvent>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<ControlEvent>>,
}

impl MemoryEndpoint {
    /// Deliver an arbitrary event to this endpoint's stream.
    ///
    /// Fault-injection hook for tests; the bridge never calls this.
    pub fn inject(&self, event: ControlEvent) {
        let _ = self.events_tx.send(event);
    }
}

#[async_trait]
impl ControlPlane for MemoryEndpoint {
    async fn register(&self, app_name: &str) -> Result<(), ControlError> {
        use dashmap::mapref::entry::Entry;

        match self.fabric.apps.entry(app_name.to_string()) {
            Entry::Occupied(_) => Err(ControlError::Refused(format!(
                "name {app_name} already registered"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(self.events_tx.clone());
                // The confirmation arrives as an event, like a real
                // control plane would deliver it.
                let token = self.fabric.fresh_token();
                let _ = self
                    .events_tx
                    .send(ControlEvent::RegistrationConfirmed { token });
                Ok(())
            }
        }
    }

    async fn unregister(&self, app_name: &str) -> Result<(), ControlError> {
        self.fabric.apps.remove(app_name);
        Ok(())
    }

    async fn request_flow(
        &self,
        local_id: &str,
        remote_name: &str,
    ) -> Result<RequestToken, ControlError> {
        let remote = match self.fabric.apps.get(remote_name) {
            Some(entry) => entry.value().clone(),
            None => {
                return Err(ControlError::Unreachable(format!(
                    "no application named {remote_name}"
                )))
            }
        };

        let id = FlowId(self.fabric.next_flow.fetch_add(1, Ordering::Relaxed));
        let token = self.fabric.fresh_token();
        let (near, far) = MemoryLink::pair(id);

        self.fabric.pending.insert(
            id,
            PendingFlow {
                token,
                requester: self.events_tx.clone(),
                requester_link: near,
            },
        );

        let requested = ControlEvent::FlowRequested {
            token,
            remote_name: local_id.to_string(),
            link: far,
        };
        if remote.send(requested).is_err() {
            self.fabric.pending.remove(&id);
            return Err(ControlError::Unreachable(format!("{remote_name} is gone")));
        }

        Ok(token)
    }

    async fn next_event(&self) -> Result<ControlEvent, ControlError> {
        match self.events.lock().await.recv().await {
            Some(event) => Ok(event),
            None => Err(ControlError::Closed),
        }
    }

    async fn accept_response(&self, flow: FlowId, accept: bool) -> Result<(), ControlError> {
        let (_, pending) = match self.fabric.pending.remove(&flow) {
            Some(entry) => entry,
            None => return Err(ControlError::Refused(format!("no pending flow {flow}"))),
        };

        let event = if accept {
            ControlEvent::FlowAllocated {
                token: pending.token,
                link: pending.requester_link,
            }
        } else {
            ControlEvent::FlowRefused {
                token: pending.token,
                reason: "refused by peer".to_string(),
            }
        };
        let _ = pending.requester.send(event);
        Ok(())
    }
}

/// One end of an in-memory flow.
///
/// `close` drops this end's sender; the far end then observes `Closed`
/// once it has drained everything already in flight. Writes after close
/// fail with `FlowError::Closed`.
pub struct MemoryLink {
    id: FlowId,
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl MemoryLink {
    /// Build both ends of a flow sharing one identifier.
    pub fn pair(id: FlowId) -> (Arc<dyn FlowLink>, Arc<dyn FlowLink>) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a: Arc<dyn FlowLink> = Arc::new(MemoryLink {
            id,
            tx: Mutex::new(Some(a_tx)),
            rx: tokio::sync::Mutex::new(a_rx),
        });
        let b: Arc<dyn FlowLink> = Arc::new(MemoryLink {
            id,
            tx: Mutex::new(Some(b_tx)),
            rx: tokio::sync::Mutex::new(b_rx),
        });
        (a, b)
    }
}

#[async_trait]
impl FlowLink for MemoryLink {
    fn id(&self) -> FlowId {
        self.id
    }

    async fn read(&self) -> Result<ReadOutcome, FlowError> {
        match self.rx.lock().await.recv().await {
            Some(payload) => Ok(ReadOutcome::Data(payload)),
            None => Ok(ReadOutcome::Closed),
        }
    }

    async fn write(&self, payload: &[u8]) -> Result<(), FlowError> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(Bytes::copy_from_slice(payload))
                .map_err(|_| FlowError::Closed),
            None => Err(FlowError::Closed),
        }
    }

    async fn close(&self) {
        self.tx.lock().take();
    }
}
