//! Backward pass implementation
//!
//! Implements reverse-mode automatic differentiation by walking the graph in
//! reverse topological order and accumulating gradients with `add`.

use super::forward::check_dims;
use super::{Grad, GradStore};
use crate::error::{Error, Result};
use crate::graph::{Array, Graph, NodeId, NodeOperand};
use log::trace;
use std::collections::HashMap;

/// Propagate `seed` (the gradient of `output`) back through the graph
///
/// Only nodes marked in `relevant` (indexed by node ID) receive gradients.
fn reverse(output: &Array, seed: Array, relevant: &[bool]) -> Result<HashMap<NodeId, Grad>> {
    let graph = output.graph();
    let mut grads: HashMap<NodeId, Grad> = HashMap::new();
    grads.insert(output.id(), Grad::Value(seed));

    for id in graph.topo_order(&[output.id()]).into_iter().rev() {
        let node = graph.node(id);
        if node.operands.is_empty() {
            continue;
        }
        let Some(Grad::Value(g)) = grads.get(&id).cloned() else {
            continue;
        };
        if !node.operand_ids().any(|o| relevant[o.index()]) {
            continue;
        }

        let out = Array::new(graph.clone(), id);
        let primals = out.operands();
        trace!("vjp through '{}' at {}", node.op.name(), id);
        let operand_grads = node.op.vjp(&primals, &g, &out)?;
        if operand_grads.len() != node.operands.len() {
            return Err(Error::Internal(format!(
                "vjp rule of '{}' returned {} gradients for {} operands",
                node.op.name(),
                operand_grads.len(),
                node.operands.len()
            )));
        }

        for ((edge, primal), grad) in node.operands.iter().zip(&primals).zip(operand_grads) {
            let NodeOperand::Node(oid) = edge else {
                continue;
            };
            if !relevant[oid.index()] {
                continue;
            }
            if let (Grad::Value(a), Some(p)) = (&grad, primal.as_array()) {
                check_dims(node.op.name(), "vjp", a, p)?;
            }
            let summed = match grads.remove(oid) {
                Some(existing) => existing.accumulate(grad)?,
                None => grad,
            };
            grads.insert(*oid, summed);
        }
    }
    Ok(grads)
}

/// Nodes of `graph` that depend on any of `sources`
fn dependents(graph: &Graph, output: &Array, sources: &[NodeId]) -> Vec<bool> {
    let mut relevant = vec![false; graph.len()];
    for id in sources {
        relevant[id.index()] = true;
    }
    for id in graph.topo_order(&[output.id()]) {
        if !relevant[id.index()] && graph.node(id).operand_ids().any(|o| relevant[o.index()]) {
            relevant[id.index()] = true;
        }
    }
    relevant
}

/// Gradients of `<grad_output, output>` with respect to each of `wrt`
///
/// `grad_output` must have the dims of `output`. Inputs that `output` does
/// not depend on get zero arrays.
///
/// # Example
///
/// ```
/// use ndgrad::autograd::vjp;
/// use ndgrad::graph::Graph;
///
/// let g = Graph::new();
/// let x = g.from_slice(&[0.0f64, 1.0], &[2]).unwrap();
/// let y = x.atan().unwrap();
/// let gy = g.from_slice(&[2.0f64, 2.0], &[2]).unwrap();
///
/// let gx = vjp(&y, &gy, &[x]).unwrap();
/// assert_eq!(gx[0].to_vec().unwrap(), vec![2.0, 1.0]);
/// ```
pub fn vjp(output: &Array, grad_output: &Array, wrt: &[Array]) -> Result<Vec<Array>> {
    if !grad_output.same_graph(output) || wrt.iter().any(|w| !w.same_graph(output)) {
        return Err(Error::GraphMismatch);
    }
    if grad_output.dims() != output.dims() {
        return Err(Error::shape_mismatch(
            "vjp",
            format!(
                "gradient dims {:?} differ from output dims {:?}",
                grad_output.dims(),
                output.dims()
            ),
        ));
    }
    let graph = output.graph();
    let ids: Vec<NodeId> = wrt.iter().map(Array::id).collect();
    let relevant = dependents(graph, output, &ids);
    let grads = reverse(output, grad_output.clone(), &relevant)?;

    wrt.iter()
        .map(|w| match grads.get(&w.id()) {
            Some(Grad::Value(a)) => Ok(a.clone()),
            _ => graph.zeros(&w.dims(), w.dtype()),
        })
        .collect()
}

/// Compute gradients of a single-element loss with respect to every node
///
/// The loss is seeded with ones. Every node the loss depends on gets an
/// entry, leaves and intermediates alike.
///
/// # Example
///
/// ```
/// use ndgrad::autograd::backward;
/// use ndgrad::graph::Graph;
///
/// let g = Graph::new();
/// let x = g.from_slice(&[2.0f64], &[1]).unwrap();
/// let y = g.from_slice(&[3.0f64], &[1]).unwrap();
///
/// // Forward: z = x * y
/// let z = x.mul(&y).unwrap();
///
/// // Backward
/// let grads = backward(&z).unwrap();
///
/// // dz/dx = y = 3.0
/// assert_eq!(grads.grad(&x).unwrap().to_vec().unwrap(), vec![3.0]);
/// ```
pub fn backward(loss: &Array) -> Result<GradStore> {
    if loss.numel() != 1 {
        return Err(Error::shape_mismatch(
            "backward",
            format!("loss must have a single element, got dims {:?}", loss.dims()),
        ));
    }
    let graph = loss.graph();
    let seed = graph.ones(&loss.dims(), loss.dtype())?;
    let relevant = vec![true; graph.len()];
    let grads = reverse(loss, seed, &relevant)?;

    let mut store = GradStore::new();
    for (id, grad) in grads {
        if let Grad::Value(a) = grad {
            store.insert(id, a);
        }
    }
    Ok(store)
}
