//! The public bridge surface consumed by the host application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use flowbridge_core::{BridgeConfig, BridgeError, ControlPlane, FlowError, FlowLink, PeerAddress};

use crate::connect::{self, AllocationOutcome, PendingAllocations};
use crate::dispatch::ControlDispatcher;
use crate::queue::PacketQueue;
use crate::reader::{self, TaskSet};
use crate::signal::PollHandle;
use crate::table::{new_flow_table, FlowTable};

/// Which side of the transport this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// One bridge instance: owns the receive queue, the wakeup signal, the
/// flow table, and every background task. The host application owns one of
/// these and shares it by `Arc`; there is no process-wide state.
pub struct FlowBridge {
    control: Arc<dyn ControlPlane>,
    config: BridgeConfig,
    role: Role,
    local_name: Arc<str>,
    flows: FlowTable,
    queue: Arc<PacketQueue>,
    pending: PendingAllocations,
    shutdown_tx: broadcast::Sender<()>,
    tasks: TaskSet,
    down: AtomicBool,
}

impl std::fmt::Debug for FlowBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowBridge")
            .field("role", &self.role)
            .field("local_name", &self.local_name)
            .field("down", &self.down)
            .finish_non_exhaustive()
    }
}

impl FlowBridge {
    /// Initialize the bridge and start its control dispatcher.
    ///
    /// Server role registers `local_name` with the control plane first and
    /// fails fatally if the name cannot be claimed; client role skips
    /// registration and only drains control events.
    pub async fn init(
        role: Role,
        local_name: impl Into<Arc<str>>,
        control: Arc<dyn ControlPlane>,
        config: BridgeConfig,
    ) -> Result<Arc<Self>, BridgeError> {
        let local_name = local_name.into();

        if role == Role::Server {
            control
                .register(&local_name)
                .await
                .map_err(|e| BridgeError::RegistrationFailed {
                    name: local_name.to_string(),
                    reason: e.to_string(),
                })?;
            tracing::info!(name = %local_name, "registered with control plane");
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let queue = Arc::new(PacketQueue::new(
            config.queue.capacity,
            config.queue.full_policy,
        ));

        let bridge = Arc::new(Self {
            control,
            config,
            role,
            local_name,
            flows: new_flow_table(),
            queue,
            pending: PendingAllocations::new(),
            shutdown_tx,
            tasks: TaskSet::default(),
            down: AtomicBool::new(false),
        });

        let dispatcher = ControlDispatcher::new(
            bridge.control.clone(),
            bridge.flows.clone(),
            bridge.queue.clone(),
            bridge.pending.clone(),
            role,
            bridge.config.flow.max_unit_size,
            bridge.shutdown_tx.clone(),
            bridge.tasks.clone(),
        );
        let handle = tokio::spawn(async move {
            if let Err(e) = dispatcher.run().await {
                tracing::error!(error = %e, "control dispatcher failed");
            }
        });
        bridge.tasks.lock().push(handle);

        Ok(bridge)
    }

    /// Allocate a flow to the application published as `peer_name`.
    ///
    /// Blocks until the control plane answers or the configured response
    /// timeout passes. On success the flow's reader task is already
    /// running; the returned address is valid for `send` until the flow
    /// closes.
    pub async fn connect(&self, peer_name: &str) -> Result<PeerAddress, BridgeError> {
        if self.is_down() {
            return Err(BridgeError::ShutDown);
        }

        let local_id = connect::local_endpoint_id(&self.local_name);
        let token = self.control.request_flow(&local_id, peer_name).await?;
        let response = self.pending.claim(token);
        tracing::debug!(%token, peer = %peer_name, "flow requested");

        let timeout = self.config.connect.response_timeout();
        let outcome = match tokio::time::timeout(timeout, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(BridgeError::ShutDown),
            Err(_) => {
                self.pending.abandon(token);
                return Err(BridgeError::AllocationTimeout {
                    peer: peer_name.to_string(),
                    after: timeout,
                });
            }
        };

        match outcome {
            AllocationOutcome::Granted(link) => {
                let peer = reader::spawn_flow(
                    link,
                    peer_name,
                    &self.flows,
                    &self.queue,
                    self.config.flow.max_unit_size,
                    &self.shutdown_tx,
                    &self.tasks,
                );
                tracing::info!(peer = %peer, "flow established");
                Ok(peer)
            }
            AllocationOutcome::Refused(reason) => Err(BridgeError::AllocationRefused {
                peer: peer_name.to_string(),
                reason,
            }),
        }
    }

    /// Write one unit to the flow associated with `to`.
    ///
    /// Failures are reported, not retried. A write to a closed or already
    /// pruned flow reports `FlowClosed`; re-establishing the peer is the
    /// host's decision.
    pub async fn send(&self, payload: &[u8], to: &PeerAddress) -> Result<(), BridgeError> {
        if self.is_down() {
            return Err(BridgeError::ShutDown);
        }

        let max = self.config.flow.max_unit_size;
        if payload.len() > max {
            return Err(BridgeError::OversizedUnit {
                len: payload.len(),
                max,
            });
        }

        let link = match self.flows.get(&to.flow) {
            Some(entry) => entry.link.clone(),
            None => return Err(BridgeError::FlowClosed(to.flow)),
        };

        if let Err(e) = link.write(payload).await {
            if matches!(e, FlowError::Closed) {
                self.flows.remove(&to.flow);
            }
            tracing::debug!(peer = %to, error = %e, "send failed");
            return Err(BridgeError::FlowClosed(to.flow));
        }
        Ok(())
    }

    /// Take the next queued unit, if any. Never blocks.
    pub fn receive(&self) -> Option<(Bytes, PeerAddress)> {
        if !self.queue.signal().try_consume() {
            return None;
        }
        // A consumed count guarantees an occupied slot.
        let unit = self.queue.pop()?;
        Some((unit.payload, unit.from))
    }

    /// Waitable handle on queue occupancy for the host's event loop.
    pub fn poll_handle(&self) -> PollHandle {
        self.queue.signal().poll_handle()
    }

    /// Number of currently established flows.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Tear down every flow and background task, then release the
    /// registered name (server role). Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(name = %self.local_name, "bridge shutting down");

        // Snapshot the links before the readers prune themselves out of
        // the table; they still need closing afterwards.
        let links: Vec<Arc<dyn FlowLink>> =
            self.flows.iter().map(|entry| entry.link.clone()).collect();

        let _ = self.shutdown_tx.send(());
        self.queue.signal().close();

        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "bridge task panicked during shutdown");
                }
            }
        }

        // Close links only after every reader is gone.
        for link in links {
            link.close().await;
        }
        self.flows.clear();

        if self.role == Role::Server {
            if let Err(e) = self.control.unregister(&self.local_name).await {
                tracing::warn!(error = %e, "failed to unregister");
            }
        }
    }

    fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }
}
