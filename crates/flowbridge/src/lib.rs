//! flowbridge — turns a connection-oriented, multi-flow transport into a
//! single pollable datagram source.
//!
//! One reader task per established flow pushes received units into a
//! bounded ring; a counting wakeup signal mirrors queue occupancy so the
//! host's event loop can park on one handle next to its other event
//! sources. The consumer side never blocks.
//!
//! [`FlowBridge`] is the public surface: init, connect, send, receive,
//! poll_handle, shutdown. The transport itself stays behind the
//! [`ControlPlane`]/[`FlowLink`] traits; [`memory::MemoryFabric`] is an
//! in-process implementation for tests and demos.

pub mod memory;
pub mod queue;
pub mod signal;
pub mod table;

mod connect;
mod dispatch;
mod facade;
mod reader;

pub use facade::{FlowBridge, Role};
pub use signal::{PollHandle, WakeupSignal};

pub use flowbridge_core::{
    BridgeConfig, BridgeError, ControlPlane, FlowId, FlowLink, FullQueuePolicy, PeerAddress, Unit,
};
