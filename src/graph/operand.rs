//! Operands as seen by callers, by shape inference and by kernels

use super::{Array, ArrayShape};
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Operand passed to `Graph::apply` and handed to differentiation rules
#[derive(Clone, Debug)]
pub enum Operand {
    /// A graph node
    Array(Array),
    /// A parameter-only pseudo-operand (e.g. the target shape of a reshape)
    Shape(ArrayShape),
}

impl Operand {
    /// The array, if this operand is one
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Operand::Array(a) => Some(a),
            Operand::Shape(_) => None,
        }
    }

    /// The array, or an error naming `op`
    pub fn array(&self, op: &'static str) -> Result<&Array> {
        self.as_array().ok_or_else(|| {
            Error::unsupported_operand(op, "expected an array operand, got a shape")
        })
    }

    /// The pseudo-operand shape, or an error naming `op`
    pub fn shape(&self, op: &'static str) -> Result<&ArrayShape> {
        match self {
            Operand::Shape(s) => Ok(s),
            Operand::Array(_) => Err(Error::unsupported_operand(
                op,
                "expected a shape operand, got an array",
            )),
        }
    }
}

impl From<Array> for Operand {
    fn from(a: Array) -> Self {
        Operand::Array(a)
    }
}

impl From<&Array> for Operand {
    fn from(a: &Array) -> Self {
        Operand::Array(a.clone())
    }
}

impl From<ArrayShape> for Operand {
    fn from(s: ArrayShape) -> Self {
        Operand::Shape(s)
    }
}

/// Materialized operand handed to a forward kernel
#[derive(Copy, Clone, Debug)]
pub enum OperandData<'a> {
    /// Operand buffer (contiguous unless the op opted out)
    Tensor(&'a Tensor),
    /// Pseudo-operand shape
    Shape(&'a ArrayShape),
}

impl<'a> OperandData<'a> {
    /// The tensor, or an execution error naming `op`
    pub fn tensor(&self, op: &'static str) -> Result<&'a Tensor> {
        match *self {
            OperandData::Tensor(t) => Ok(t),
            OperandData::Shape(_) => Err(Error::execution(op, "expected a tensor operand")),
        }
    }

    /// The shape, or an execution error naming `op`
    pub fn shape(&self, op: &'static str) -> Result<&'a ArrayShape> {
        match *self {
            OperandData::Shape(s) => Ok(s),
            OperandData::Tensor(_) => Err(Error::execution(op, "expected a shape operand")),
        }
    }
}
