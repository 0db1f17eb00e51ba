//! Error taxonomy for the bridge and its collaborators.
//!
//! All failures are local: nothing here should take the process down. The
//! host decides whether a failed connect or a closed flow is worth a retry.

use std::time::Duration;

use thiserror::Error;

use crate::unit::FlowId;

/// Failures of the control plane itself.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control plane refused the request: {0}")]
    Refused(String),
    #[error("control plane unreachable: {0}")]
    Unreachable(String),
    #[error("control plane closed")]
    Closed,
}

/// Per-flow I/O failures.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow is closed")]
    Closed,
    #[error("transient flow error: {0}")]
    Transient(String),
    #[error("fatal flow error: {0}")]
    Fatal(String),
}

impl FlowError {
    /// Transient errors are retried by the reader task; everything else
    /// terminates it.
    pub fn is_transient(&self) -> bool {
        matches!(self, FlowError::Transient(_))
    }
}

/// Failures surfaced by the bridge's public operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to register {name}: {reason}")]
    RegistrationFailed { name: String, reason: String },
    #[error("flow allocation to {peer} refused: {reason}")]
    AllocationRefused { peer: String, reason: String },
    #[error("flow allocation to {peer} timed out after {after:?}")]
    AllocationTimeout { peer: String, after: Duration },
    #[error("flow {0} is closed")]
    FlowClosed(FlowId),
    #[error("unit of {len} bytes exceeds the {max} byte maximum")]
    OversizedUnit { len: usize, max: usize },
    #[error("control plane error: {0}")]
    ControlPlane(#[from] ControlError),
    #[error("bridge is shut down")]
    ShutDown,
}
