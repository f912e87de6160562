//! Graph nodes and their materialization state machine

use super::{ArrayShape, NodeId};
use crate::error::Error;
use crate::ops::OpHandle;
use crate::tensor::Tensor;
use parking_lot::Mutex;
use std::sync::Arc;

/// Operand edge of a node
#[derive(Clone, Debug)]
pub(crate) enum NodeOperand {
    /// Another node of the same graph
    Node(NodeId),
    /// Parameter-only pseudo-operand
    Shape(Arc<ArrayShape>),
}

/// Data state of a node
///
/// `ShapeOnly -> Materializing -> Materialized`, or `-> Poisoned` when the
/// kernel (or an operand) failed. A poisoned node keeps the failure and hands
/// it out on every later read.
pub(crate) enum NodeState {
    ShapeOnly,
    Materializing,
    Materialized(Arc<Tensor>),
    Poisoned(Error),
}

impl NodeState {
    pub(crate) fn status(&self) -> NodeStatus {
        match self {
            NodeState::ShapeOnly => NodeStatus::ShapeOnly,
            NodeState::Materializing => NodeStatus::Materializing,
            NodeState::Materialized(_) => NodeStatus::Materialized,
            NodeState::Poisoned(_) => NodeStatus::Poisoned,
        }
    }
}

/// Observable node status, without the data
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    /// Shape known, values pending
    ShapeOnly,
    /// Forward kernel running
    Materializing,
    /// Values computed
    Materialized,
    /// Materialization failed; reads re-raise the stored error
    Poisoned,
}

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) op: OpHandle,
    pub(crate) operands: Vec<NodeOperand>,
    pub(crate) shape: Arc<ArrayShape>,
    pub(crate) state: Mutex<NodeState>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        op: OpHandle,
        operands: Vec<NodeOperand>,
        shape: Arc<ArrayShape>,
        state: NodeState,
    ) -> Self {
        Self {
            id,
            op,
            operands,
            shape,
            state: Mutex::new(state),
        }
    }

    /// IDs of the node operands, in operand order
    pub(crate) fn operand_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.operands.iter().filter_map(|o| match o {
            NodeOperand::Node(id) => Some(*id),
            NodeOperand::Shape(_) => None,
        })
    }

    pub(crate) fn status(&self) -> NodeStatus {
        self.state.lock().status()
    }
}
