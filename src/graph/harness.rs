//! Op-application harness
//!
//! `apply` validates operands, runs (or reuses) shape inference and appends
//! the new node. No buffer is allocated here: under the lazy policy the node
//! stays `ShapeOnly` until read, under the eager policy it is materialized
//! before `apply` returns.

use super::{Array, ArrayShape, Graph, NodeOperand, NodeState, Operand, Param, ShapeKey};
use crate::config::ExecutionPolicy;
use crate::dtype::{DType, promote};
use crate::error::{Error, Result};
use crate::ops::{BuiltinOp, OpHandle};
use log::debug;
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl Graph {
    /// Apply `op` to `operands` with scalar `params`, returning the new node
    ///
    /// Construction is all-or-nothing: if any check or shape inference fails,
    /// no node is added and the error is returned unchanged.
    pub fn apply(&self, op: &OpHandle, operands: &[Operand], params: &[Param]) -> Result<Array> {
        let name = op.name();
        let mut edges = Vec::with_capacity(operands.len());
        let mut shapes: SmallVec<[(Arc<ArrayShape>, bool); 3]> = SmallVec::new();
        let mut dtype: Option<DType> = None;
        let mut complex = false;

        for operand in operands {
            match operand {
                Operand::Array(a) => {
                    if !a.graph().same_graph(self) {
                        return Err(Error::GraphMismatch);
                    }
                    let shape = a.shape();
                    dtype = Some(match dtype {
                        None => shape.dtype(),
                        Some(d) => promote(d, shape.dtype())?,
                    });
                    complex |= shape.is_complex();
                    edges.push(NodeOperand::Node(a.id()));
                    shapes.push((shape, false));
                }
                Operand::Shape(s) => {
                    let shape = Arc::new(s.clone());
                    edges.push(NodeOperand::Shape(Arc::clone(&shape)));
                    shapes.push((shape, true));
                }
            }
        }

        if complex && !op.supports_complex() {
            return Err(Error::unsupported_operand(name, "complex operand"));
        }

        let shape = self.infer_shape(op, &shapes, dtype.unwrap_or_default(), complex, params)?;
        let id = self.push_node(op.clone(), edges, shape, NodeState::ShapeOnly);
        debug!("apply '{}' -> node {}", name, id);

        if self.config().execution == ExecutionPolicy::Eager {
            self.materialize(id)?;
        }
        Ok(Array::new(self.clone(), id))
    }

    /// Apply a registered operation looked up by name
    ///
    /// The name is resolved once, here; execution goes through the handle.
    pub fn apply_named(&self, name: &str, operands: &[Operand], params: &[Param]) -> Result<Array> {
        let op = self.registry().lookup(name)?;
        self.apply(&op, operands, params)
    }

    pub(crate) fn apply_builtin(
        &self,
        op: BuiltinOp,
        operands: &[Operand],
        params: &[Param],
    ) -> Result<Array> {
        let op = self.registry().builtin(op).clone();
        self.apply(&op, operands, params)
    }

    fn infer_shape(
        &self,
        op: &OpHandle,
        shapes: &[(Arc<ArrayShape>, bool)],
        dtype: DType,
        complex: bool,
        params: &[Param],
    ) -> Result<Arc<ArrayShape>> {
        let run = || -> Result<Arc<ArrayShape>> {
            let mut out = ArrayShape::new(op.name(), dtype, complex, params);
            let refs: SmallVec<[&ArrayShape; 3]> = shapes.iter().map(|(s, _)| s.as_ref()).collect();
            op.infer_shape(&mut out, &refs)?;
            out.validate()?;
            Ok(Arc::new(out))
        };

        if !self.config().shape_cache {
            return run();
        }

        let key = ShapeKey {
            op: Arc::as_ptr(op) as *const () as usize,
            operands: shapes.iter().map(|(s, pseudo)| s.geometry(*pseudo)).collect(),
            params: params.iter().copied().collect(),
        };
        let counters = &self.inner.counters;
        if let Some(hit) = self.inner.shapes.lock().get(&key) {
            counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(hit));
        }
        counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        debug!("shape cache miss for '{}' with params {:?}", op.name(), params);

        let shape = run()?;
        self.inner.shapes.lock().insert(key, Arc::clone(&shape));
        Ok(shape)
    }
}
