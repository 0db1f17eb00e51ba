//! Collaborator boundary — the control plane and flow links the bridge
//! consumes. Real transports implement these traits; so does the in-memory
//! fabric used by tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ControlError, FlowError};
use crate::unit::FlowId;

/// Correlation token for one flow-allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Outcome of one blocking read on a flow.
#[derive(Debug)]
pub enum ReadOutcome {
    /// One complete unit.
    Data(Bytes),
    /// Orderly closure by the peer. No more units will arrive.
    Closed,
}

/// Events delivered by the control plane's event stream.
pub enum ControlEvent {
    /// The control plane confirmed an earlier registration.
    RegistrationConfirmed { token: RequestToken },
    /// A remote endpoint asked for a flow to this application.
    /// `remote_name` identifies the requester; answering with
    /// `accept_response(link.id(), true)` makes the link live.
    FlowRequested {
        token: RequestToken,
        remote_name: String,
        link: Arc<dyn FlowLink>,
    },
    /// A flow this endpoint requested has been granted.
    FlowAllocated {
        token: RequestToken,
        link: Arc<dyn FlowLink>,
    },
    /// A flow this endpoint requested was declined.
    FlowRefused { token: RequestToken, reason: String },
    /// Anything the bridge does not understand.
    Other { kind: String },
}

/// The transport's registration and flow-allocation surface.
///
/// `next_event` is a blocking event stream; exactly one task per endpoint
/// may drain it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Register `app_name` so peers can allocate flows to it. Server side,
    /// once at startup.
    async fn register(&self, app_name: &str) -> Result<(), ControlError>;

    /// Release a name claimed by `register`.
    async fn unregister(&self, app_name: &str) -> Result<(), ControlError>;

    /// Ask for a flow from `local_id` to the application published as
    /// `remote_name`. The answer arrives later as `FlowAllocated` or
    /// `FlowRefused` carrying the returned token.
    async fn request_flow(
        &self,
        local_id: &str,
        remote_name: &str,
    ) -> Result<RequestToken, ControlError>;

    /// Wait for the next control event.
    async fn next_event(&self) -> Result<ControlEvent, ControlError>;

    /// Answer an inbound `FlowRequested` event.
    async fn accept_response(&self, flow: FlowId, accept: bool) -> Result<(), ControlError>;
}

/// One established transport flow.
///
/// Exactly one reader task owns the read side; the facade writes
/// concurrently on the other direction. Writes after closure fail with
/// `FlowError::Closed` and never corrupt state.
#[async_trait]
pub trait FlowLink: Send + Sync {
    fn id(&self) -> FlowId;

    /// Read one unit, blocking until data arrives or the flow closes.
    async fn read(&self) -> Result<ReadOutcome, FlowError>;

    /// Write one unit.
    async fn write(&self, payload: &[u8]) -> Result<(), FlowError>;

    /// Release the flow. The far end observes closure on its next read.
    async fn close(&self);
}
