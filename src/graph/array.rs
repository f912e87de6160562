//! Array: a cheap handle to one graph node

use super::{ArrayShape, Graph, NodeId, NodeOperand, NodeStatus, Operand};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};
use std::fmt;
use std::sync::Arc;

/// Handle to a node of a [`Graph`]
///
/// Cloning an `Array` clones the handle, not the data. Operation methods
/// (`atan`, `add`, `conv1d`, ...) build new nodes in the same graph.
#[derive(Clone)]
pub struct Array {
    graph: Graph,
    id: NodeId,
}

impl Array {
    pub(crate) fn new(graph: Graph, id: NodeId) -> Self {
        Self { graph, id }
    }

    /// Node ID within the graph
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Owning graph
    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Output shape computed by shape inference
    pub fn shape(&self) -> Arc<ArrayShape> {
        Arc::clone(&self.graph.node(self.id).shape)
    }

    /// Dimension sizes
    pub fn dims(&self) -> Shape {
        self.shape().dims().iter().copied().collect()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.shape().dtype()
    }

    /// True if the node carries an imaginary plane
    pub fn is_complex(&self) -> bool {
        self.shape().is_complex()
    }

    /// Name of the producing operation
    pub fn op_name(&self) -> &'static str {
        self.graph.node(self.id).op.name()
    }

    /// Current materialization status
    pub fn status(&self) -> NodeStatus {
        self.graph.node(self.id).status()
    }

    /// Operands the node was built from, in order
    pub fn operands(&self) -> Vec<Operand> {
        self.graph
            .node(self.id)
            .operands
            .iter()
            .map(|o| match o {
                NodeOperand::Node(id) => Operand::Array(Array::new(self.graph.clone(), *id)),
                NodeOperand::Shape(s) => Operand::Shape(ArrayShape::clone(s)),
            })
            .collect()
    }

    /// Compute the node's values (and its operands' first), once
    ///
    /// Later calls return the stored buffer; a node whose kernel failed
    /// returns the same error on every call.
    pub fn materialize(&self) -> Result<Arc<Tensor>> {
        self.graph.materialize(self.id)
    }

    /// Real parts as f64 in row-major order
    pub fn to_vec(&self) -> Result<Vec<f64>> {
        Ok(self.materialize()?.to_f64_vec())
    }

    /// Imaginary parts as f64 in row-major order (zeros for real arrays)
    pub fn imag_to_vec(&self) -> Result<Vec<f64>> {
        Ok(self.materialize()?.imag_to_f64_vec())
    }

    /// Value of a single-element array
    pub fn item(&self) -> Result<f64> {
        let values = self.to_vec()?;
        match values.as_slice() {
            [v] => Ok(*v),
            _ => Err(Error::invalid_argument(
                "array",
                format!("item() on {} elements", values.len()),
            )),
        }
    }

    pub(crate) fn same_graph(&self, other: &Array) -> bool {
        self.graph.same_graph(&other.graph)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.shape();
        f.debug_struct("Array")
            .field("id", &self.id)
            .field("op", &shape.op_name())
            .field("dims", &shape.dims())
            .field("dtype", &shape.dtype())
            .field("complex", &shape.is_complex())
            .finish()
    }
}
