//! Datagram types shared across the bridge.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Default upper bound on a single unit's payload in bytes.
///
/// The maximum is a fixed constant shared by sender and receiver; units
/// above it are rejected at receive time and never reach the host.
pub const DEFAULT_MAX_UNIT_SIZE: usize = 16 * 1024;

/// Opaque identifier of one established transport flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Association between a logical peer name and the flow that reaches it.
///
/// Returned by `connect`, stamped on every received unit, and handed back
/// to `send`. Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub flow: FlowId,
    pub peer: Arc<str>,
}

impl PeerAddress {
    pub fn new(flow: FlowId, peer: impl Into<Arc<str>>) -> Self {
        Self {
            flow,
            peer: peer.into(),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.peer, self.flow)
    }
}

/// One received datagram. Immutable once enqueued.
#[derive(Debug, Clone)]
pub struct Unit {
    pub from: PeerAddress,
    pub payload: Bytes,
}
