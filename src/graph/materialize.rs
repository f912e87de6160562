//! Depth-first materialization of graph nodes

use super::{Graph, Node, NodeId, NodeOperand, NodeState, NodeStatus, OperandData};
use crate::error::{Error, Result};
use crate::ops::ExecContext;
use crate::runtime::{Allocator, ensure_contiguous};
use crate::tensor::Tensor;
use log::{trace, warn};
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl Graph {
    /// Materialize `root` after all of its pending operands
    ///
    /// Iterative post-order walk, so deep chains do not grow the call stack.
    /// Nodes that are already materialized or poisoned are not revisited.
    pub(crate) fn materialize(&self, root: NodeId) -> Result<Arc<Tensor>> {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let node = self.node(id);
            if node.status() != NodeStatus::ShapeOnly {
                continue;
            }
            if expanded {
                self.execute(&node)?;
                continue;
            }
            stack.push((id, true));
            for operand in node.operand_ids() {
                if self.node(operand).status() == NodeStatus::ShapeOnly {
                    stack.push((operand, false));
                }
            }
        }
        self.read(root)
    }

    /// Stored result of a node that the walk has already visited
    fn read(&self, id: NodeId) -> Result<Arc<Tensor>> {
        let node = self.node(id);
        let state = node.state.lock();
        match &*state {
            NodeState::Materialized(t) => Ok(Arc::clone(t)),
            NodeState::Poisoned(e) => Err(e.clone()),
            NodeState::ShapeOnly | NodeState::Materializing => Err(Error::Internal(format!(
                "node {id} read before its forward kernel ran"
            ))),
        }
    }

    /// Run one node's forward kernel exactly once
    ///
    /// The node's lock is held for the whole execution. Operand locks are
    /// only taken briefly, and operands always have lower IDs, so concurrent
    /// materializations cannot deadlock.
    fn execute(&self, node: &Node) -> Result<Arc<Tensor>> {
        let mut state = node.state.lock();
        match &*state {
            NodeState::Materialized(t) => return Ok(Arc::clone(t)),
            NodeState::Poisoned(e) => return Err(e.clone()),
            NodeState::Materializing => {
                return Err(Error::Internal(format!(
                    "re-entrant materialization of node {}",
                    node.id
                )));
            }
            NodeState::ShapeOnly => {}
        }
        *state = NodeState::Materializing;

        match self.run_kernel(node) {
            Ok(tensor) => {
                let tensor = Arc::new(tensor);
                *state = NodeState::Materialized(Arc::clone(&tensor));
                Ok(tensor)
            }
            Err(e) => {
                warn!("node {} ('{}') poisoned: {}", node.id, node.op.name(), e);
                *state = NodeState::Poisoned(e.clone());
                Err(e)
            }
        }
    }

    fn run_kernel(&self, node: &Node) -> Result<Tensor> {
        let contiguous = node.op.requires_contiguous();
        let mut inputs: SmallVec<[Option<Arc<Tensor>>; 3]> = SmallVec::new();
        for operand in &node.operands {
            inputs.push(match operand {
                NodeOperand::Node(id) => {
                    let t = self.read(*id)?;
                    Some(if contiguous && !t.is_contiguous() {
                        Arc::new(ensure_contiguous(&t))
                    } else {
                        t
                    })
                }
                NodeOperand::Shape(_) => None,
            });
        }

        let mut data: SmallVec<[OperandData<'_>; 3]> = SmallVec::new();
        for (operand, input) in node.operands.iter().zip(&inputs) {
            data.push(match (operand, input) {
                (NodeOperand::Shape(s), _) => OperandData::Shape(s),
                (NodeOperand::Node(_), Some(t)) => OperandData::Tensor(t),
                (NodeOperand::Node(id), None) => {
                    return Err(Error::Internal(format!("operand {id} was not read")));
                }
            });
        }

        let shape = &node.shape;
        let mut out = self
            .inner
            .allocator
            .allocate(shape.layout(), shape.dtype(), shape.is_complex())?;
        let ctx = ExecContext::new(shape, self.config().parallel_min_len);

        trace!(
            "executing '{}' for node {} dims {:?}",
            node.op.name(),
            node.id,
            shape.dims()
        );
        node.op.forward(&ctx, &mut out, &data)?;
        self.inner.counters.executions.fetch_add(1, Ordering::Relaxed);
        Ok(out)
    }
}
