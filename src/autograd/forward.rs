//! Forward-mode automatic differentiation (Jacobian-vector products)
//!
//! Tangents are pushed through an existing graph in topological order. Each
//! node's tangent is built by its operation's `jvp` rule out of ordinary
//! graph operations, so the result is a lazy array like any other and can
//! itself be differentiated.
//!
//! # When to Use Forward vs Reverse Mode
//!
//! - **Forward mode** costs one pass per input direction: use it for
//!   directional derivatives and for functions with few inputs.
//! - **Reverse mode** ([`super::vjp`]) costs one pass per output direction:
//!   use it for gradients of scalar losses.

use super::Grad;
use crate::error::{Error, Result};
use crate::graph::{Array, NodeId, NodeOperand};
use log::trace;
use std::collections::HashMap;

/// Directional derivative of `output` along `tangents` at `primals`
///
/// `primals[i]` is treated as an independent input whose tangent is
/// `tangents[i]`; dims must match pairwise. Nodes whose operands all carry
/// `Zero`/`NoGradient` tangents propagate `Zero` without calling their rule.
/// If `output` does not depend on any primal the result is a zero array.
///
/// # Example
///
/// ```
/// use ndgrad::autograd::jvp;
/// use ndgrad::graph::Graph;
///
/// let g = Graph::new();
/// let x = g.from_slice(&[0.0f64, 1.0], &[2]).unwrap();
/// let y = x.atan().unwrap();
/// let v = g.from_slice(&[1.0f64, 1.0], &[2]).unwrap();
///
/// // d/dx atan(x) = 1 / (1 + x^2)
/// let dy = jvp(&y, &[x], &[v]).unwrap();
/// assert_eq!(dy.to_vec().unwrap(), vec![1.0, 0.5]);
/// ```
pub fn jvp(output: &Array, primals: &[Array], tangents: &[Array]) -> Result<Array> {
    if primals.len() != tangents.len() {
        return Err(Error::invalid_argument(
            "tangents",
            format!("{} primals but {} tangents", primals.len(), tangents.len()),
        ));
    }
    let graph = output.graph();
    let mut tangent_of: HashMap<NodeId, Grad> = HashMap::new();

    for (p, t) in primals.iter().zip(tangents) {
        if !p.same_graph(output) || !t.same_graph(output) {
            return Err(Error::GraphMismatch);
        }
        if p.dims() != t.dims() {
            return Err(Error::shape_mismatch(
                "jvp",
                format!("tangent dims {:?} differ from primal dims {:?}", t.dims(), p.dims()),
            ));
        }
        let seed = match tangent_of.remove(&p.id()) {
            Some(existing) => existing.accumulate(Grad::Value(t.clone()))?,
            None => Grad::Value(t.clone()),
        };
        tangent_of.insert(p.id(), seed);
    }

    for id in graph.topo_order(&[output.id()]) {
        if tangent_of.contains_key(&id) {
            continue;
        }
        let node = graph.node(id);
        let tangents: Vec<Grad> = node
            .operands
            .iter()
            .map(|o| match o {
                NodeOperand::Node(oid) => tangent_of.get(oid).cloned().unwrap_or(Grad::Zero),
                NodeOperand::Shape(_) => Grad::NoGradient,
            })
            .collect();
        if !tangents.iter().any(Grad::is_value) {
            continue;
        }

        let out = Array::new(graph.clone(), id);
        trace!("jvp through '{}' at {}", node.op.name(), id);
        let t = node.op.jvp(&out.operands(), &tangents, &out)?;
        if let Grad::Value(a) = &t {
            check_dims(node.op.name(), "jvp", a, &out)?;
        }
        tangent_of.insert(id, t);
    }

    match tangent_of.remove(&output.id()) {
        Some(Grad::Value(t)) => Ok(t),
        _ => graph.zeros(&output.dims(), output.dtype()),
    }
}

/// A rule result must have the dims of the array it stands for
pub(crate) fn check_dims(op: &'static str, rule: &str, got: &Array, expected: &Array) -> Result<()> {
    if got.dims() != expected.dims() {
        return Err(Error::Internal(format!(
            "{rule} rule of '{op}' returned dims {:?}, expected {:?}",
            got.dims(),
            expected.dims()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::graph::Graph;

    #[test]
    fn test_product_rule() {
        let g = Graph::new();
        let x = g.from_slice(&[2.0f64, 3.0], &[2]).unwrap();
        let y = x.mul(&x).unwrap().sin().unwrap();
        let v = g.ones(&[2], DType::F64).unwrap();
        let dy = jvp(&y, &[x.clone()], &[v]).unwrap().to_vec().unwrap();
        for (d, x) in dy.iter().zip([2.0f64, 3.0]) {
            assert!((d - 2.0 * x * (x * x).cos()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_independent_output_is_zero() {
        let g = Graph::new();
        let x = g.from_slice(&[1.0f64], &[1]).unwrap();
        let c = g.from_slice(&[5.0f64, 6.0], &[2]).unwrap();
        let y = c.exp().unwrap();
        let before = g.len();
        let dy = jvp(&y, &[x.clone()], &[x]).unwrap();
        assert_eq!(dy.to_vec().unwrap(), vec![0.0, 0.0]);
        // no rule ran: only the zero result was added
        assert_eq!(g.len(), before + 1);
    }

    #[test]
    fn test_tangent_dims_checked() {
        let g = Graph::new();
        let x = g.zeros(&[2], DType::F64).unwrap();
        let t = g.zeros(&[3], DType::F64).unwrap();
        let y = x.exp().unwrap();
        assert!(jvp(&y, &[x], &[t]).unwrap_err().is_shape_mismatch());
    }
}
