//! Flow table — live flows keyed by flow identifier, shared across tasks.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use flowbridge_core::{FlowId, FlowLink, PeerAddress};

/// An established flow: the link the facade writes to, plus its peer
/// association. The read side belongs to the flow's reader task.
pub struct ActiveFlow {
    pub link: Arc<dyn FlowLink>,
    pub peer: PeerAddress,
    pub established_at: Instant,
}

/// The flow table — shared between the dispatcher, readers, and the facade.
pub type FlowTable = Arc<DashMap<FlowId, ActiveFlow>>;

/// Create a new empty flow table.
pub fn new_flow_table() -> FlowTable {
    Arc::new(DashMap::new())
}
