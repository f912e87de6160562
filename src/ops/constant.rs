//! Leaf nodes holding user data

use super::traits::{ExecContext, Operation};
use crate::error::{Error, Result};
use crate::graph::{ArrayShape, OperandData};
use crate::tensor::Tensor;

/// Operation tag of leaf nodes
///
/// Leaves are created materialized by `Graph::constant`, so neither protocol
/// method is ever reached through the harness. They have no operands, so the
/// default rules give a `Zero` tangent and no gradients.
pub struct Constant;

impl Operation for Constant {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, _out: &mut ArrayShape, _operands: &[&ArrayShape]) -> Result<()> {
        Err(Error::invalid_argument(
            "op",
            "constant nodes are created with Graph::constant",
        ))
    }

    fn forward(
        &self,
        _ctx: &ExecContext<'_>,
        _out: &mut Tensor,
        _operands: &[OperandData<'_>],
    ) -> Result<()> {
        Err(Error::execution("constant", "leaf nodes are never executed"))
    }
}
