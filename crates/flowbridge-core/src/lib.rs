//! flowbridge-core — shared types, collaborator traits, errors, and
//! configuration. All other flowbridge crates depend on this one.

pub mod config;
pub mod control;
pub mod error;
pub mod unit;

pub use config::{BridgeConfig, FullQueuePolicy};
pub use control::{ControlEvent, ControlPlane, FlowLink, ReadOutcome, RequestToken};
pub use error::{BridgeError, ControlError, FlowError};
pub use unit::{FlowId, PeerAddress, Unit, DEFAULT_MAX_UNIT_SIZE};
