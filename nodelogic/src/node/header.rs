use std::sync::Arc;

use nodelogic_ids::NodeId;

/// Bookkeeping shared by every node kind: identity, display name, and the
/// dirty flag the dependency scheduler flips when an update pass should
/// revisit this node (see [`crate::graph::DependencyGraph`]).
#[derive(Clone, Debug)]
pub struct NodeHeader {
    id: NodeId,
    name: Arc<str>,
    dirty: bool,
}

impl NodeHeader {
    pub fn new(id: NodeId, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            dirty: true,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<Arc<str>>) {
        self.name = name.into();
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
