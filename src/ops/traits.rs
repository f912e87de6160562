//! The operation protocol
//!
//! Every node of a graph points at one shared, stateless `Operation`. The
//! harness calls `infer_shape` once per distinct operand geometry, `forward`
//! once per node, and the autograd drivers call `jvp`/`vjp`.

use crate::autograd::{Grad, default_jvp, default_vjp};
use crate::error::Result;
use crate::graph::{Array, ArrayShape, Operand, OperandData};
use crate::tensor::Tensor;
use std::sync::Arc;

/// Shared handle to an operation
pub type OpHandle = Arc<dyn Operation>;

/// Per-execution information handed to `forward`
#[derive(Copy, Clone, Debug)]
pub struct ExecContext<'a> {
    shape: &'a ArrayShape,
    parallel_min_len: usize,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(shape: &'a ArrayShape, parallel_min_len: usize) -> Self {
        Self {
            shape,
            parallel_min_len,
        }
    }

    /// Output shape of the node being executed (params included)
    #[inline]
    pub fn shape(&self) -> &'a ArrayShape {
        self.shape
    }

    /// Buffers at least this long may be processed in parallel
    #[inline]
    pub fn parallel_min_len(&self) -> usize {
        self.parallel_min_len
    }
}

/// Four-part protocol implemented by every operation
///
/// # Shape inference
///
/// `infer_shape` receives an output handle whose `op_name`, `params`, `dtype`
/// and complex flag are already set and must fill dims and strides (via
/// `set_contiguous` or `set_strided`). It must be a pure function of the
/// operand shapes and params: results are memoized per graph.
///
/// # Forward
///
/// `forward` writes every element of `out`, which the harness allocated
/// zero-filled from the inferred shape. Operands are materialized and, unless
/// `requires_contiguous` returns false, row-major.
///
/// # Differentiation
///
/// `jvp` and `vjp` build their results from other operations, so derivatives
/// are graph nodes and can be differentiated again. `vjp` returns one entry
/// per operand position.
pub trait Operation: Send + Sync {
    /// Unique operation name
    fn name(&self) -> &'static str;

    /// Whether complex operands are accepted
    fn supports_complex(&self) -> bool {
        false
    }

    /// Whether operands must be made contiguous before `forward`
    fn requires_contiguous(&self) -> bool {
        true
    }

    /// Fill dims and strides of `out`, or fail with `ShapeMismatch`
    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()>;

    /// Compute the output values
    fn forward(&self, ctx: &ExecContext<'_>, out: &mut Tensor, operands: &[OperandData<'_>])
    -> Result<()>;

    /// Directional derivative of the output given operand tangents
    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        default_jvp(primals, tangents, output)
    }

    /// Gradient for each operand position given the output gradient
    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        default_vjp(primals, grad_output, output)
    }
}
