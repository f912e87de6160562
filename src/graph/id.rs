//! Graph and node identifiers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique graph IDs
static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a graph
///
/// IDs are unique within a process lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    /// Create a new unique graph ID
    #[inline]
    pub(crate) fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Index of a node in its graph's arena
///
/// Node IDs grow with construction order, so every operand of a node has a
/// smaller ID than the node itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_ids_are_unique() {
        let a = GraphId::next();
        let b = GraphId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(7).to_string(), "%7");
    }
}
