//! Gradient storage

use crate::graph::{Array, NodeId};
use std::collections::HashMap;

/// Gradients computed by a backward pass
///
/// Gradients are stored by node ID; contributions from several consumers
/// are already summed by the backward pass. Every stored gradient is itself
/// a graph node, so it can be differentiated again.
#[derive(Clone, Debug, Default)]
pub struct GradStore {
    grads: HashMap<NodeId, Array>,
}

impl GradStore {
    /// Create a new empty gradient store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the gradient for a node
    pub fn get(&self, id: NodeId) -> Option<&Array> {
        self.grads.get(&id)
    }

    /// Get the gradient of an array
    pub fn grad(&self, array: &Array) -> Option<&Array> {
        self.get(array.id())
    }

    /// Insert a gradient (overwrites if exists)
    pub fn insert(&mut self, id: NodeId, grad: Array) {
        self.grads.insert(id, grad);
    }

    /// Number of stored gradients
    pub fn len(&self) -> usize {
        self.grads.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }
}
