//! Control dispatcher — drains the control plane's event stream, accepts
//! inbound flows (server role), and routes allocation responses to their
//! waiting requesters.

use std::sync::Arc;

use tokio::sync::broadcast;

use flowbridge_core::{ControlError, ControlEvent, ControlPlane, FlowLink, RequestToken};

use crate::connect::{AllocationOutcome, PendingAllocations};
use crate::facade::Role;
use crate::queue::PacketQueue;
use crate::reader::{self, TaskSet};
use crate::table::FlowTable;

pub(crate) struct ControlDispatcher {
    control: Arc<dyn ControlPlane>,
    flows: FlowTable,
    queue: Arc<PacketQueue>,
    pending: PendingAllocations,
    role: Role,
    max_unit_size: usize,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    tasks: TaskSet,
}

impl ControlDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        control: Arc<dyn ControlPlane>,
        flows: FlowTable,
        queue: Arc<PacketQueue>,
        pending: PendingAllocations,
        role: Role,
        max_unit_size: usize,
        shutdown_tx: broadcast::Sender<()>,
        tasks: TaskSet,
    ) -> Self {
        // Subscribe here, not in run(): a shutdown broadcast between the
        // spawn and the task's first poll must not be missed.
        let shutdown_rx = shutdown_tx.subscribe();
        Self {
            control,
            flows,
            queue,
            pending,
            role,
            max_unit_size,
            shutdown_tx,
            shutdown_rx,
            tasks,
        }
    }

    pub(crate) async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("control dispatcher shutting down");
                    return Ok(());
                }
                event = self.control.next_event() => event,
            };

            match event {
                Ok(ControlEvent::RegistrationConfirmed { token }) => {
                    tracing::debug!(%token, "registration confirmed");
                }
                Ok(ControlEvent::FlowRequested {
                    token,
                    remote_name,
                    link,
                }) => {
                    self.handle_flow_requested(token, &remote_name, link).await;
                }
                Ok(ControlEvent::FlowAllocated { token, link }) => {
                    tracing::debug!(%token, flow = %link.id(), "flow allocated");
                    self.pending
                        .complete(token, AllocationOutcome::Granted(link));
                }
                Ok(ControlEvent::FlowRefused { token, reason }) => {
                    tracing::debug!(%token, reason = %reason, "flow refused");
                    self.pending
                        .complete(token, AllocationOutcome::Refused(reason));
                }
                Ok(ControlEvent::Other { kind }) => {
                    // Not ours to handle. Skipping keeps the dispatcher alive.
                    tracing::warn!(kind = %kind, "unrecognized control event, skipping");
                }
                Err(ControlError::Closed) => {
                    tracing::info!("control event stream closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "control event stream error");
                }
            }
        }
    }

    async fn handle_flow_requested(
        &self,
        token: RequestToken,
        remote_name: &str,
        link: Arc<dyn FlowLink>,
    ) {
        if self.role != Role::Server {
            tracing::warn!(
                %token,
                remote = %remote_name,
                "inbound flow request on client endpoint, refusing"
            );
            if let Err(e) = self.control.accept_response(link.id(), false).await {
                tracing::warn!(error = %e, "failed to refuse flow");
            }
            return;
        }

        if let Err(e) = self.control.accept_response(link.id(), true).await {
            tracing::warn!(error = %e, remote = %remote_name, "failed to accept flow");
            return;
        }

        let peer = reader::spawn_flow(
            link,
            remote_name,
            &self.flows,
            &self.queue,
            self.max_unit_size,
            &self.shutdown_tx,
            &self.tasks,
        );
        tracing::info!(peer = %peer, "accepted inbound flow");
    }
}
