//! Elementwise operations with a real scalar parameter
//!
//! The scalar travels in the node params (`Param::Float`), so nodes that
//! differ only in the scalar still share cached shapes per value.

use super::registry::BuiltinOp;
use super::traits::{ExecContext, Operation};
use super::unary::CHUNK;
use crate::autograd::{Grad, tangent};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::graph::{Array, ArrayShape, Operand, OperandData, Param};
use crate::runtime::lanes::{Lanes, map_lanes};
use crate::runtime::parallel;
use crate::tensor::Tensor;

fn infer_same(name: &'static str, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
    let [x] = operands else {
        return Err(Error::shape_mismatch(
            name,
            format!("expected 1 operand, got {}", operands.len()),
        ));
    };
    out.param_float(0)
        .map_err(|_| Error::shape_mismatch(name, "missing scalar parameter"))?;
    out.set_contiguous(x.dims());
    Ok(())
}

/// Apply `f_re` to the real plane and `f_im` to the imaginary plane
fn run_planes<T: Element>(
    ctx: &ExecContext<'_>,
    out: &mut Tensor,
    x: &Tensor,
    f_re: impl Fn(Lanes<T>) -> Lanes<T> + Sync,
    f_im: impl Fn(Lanes<T>) -> Lanes<T> + Sync,
) -> Result<()> {
    let x_re = x.re::<T>()?;
    let x_im = x.im::<T>()?;
    let min_len = ctx.parallel_min_len();
    let (out_re, out_im) = out.planes_mut::<T>()?;
    parallel::for_each_chunk(out_re, CHUNK, min_len, |start, chunk| {
        map_lanes(&x_re[start..start + chunk.len()], chunk, &f_re);
    });
    if let (Some(out_im), Some(x_im)) = (out_im, x_im) {
        parallel::for_each_chunk(out_im, CHUNK, min_len, |start, chunk| {
            map_lanes(&x_im[start..start + chunk.len()], chunk, &f_im);
        });
    }
    Ok(())
}

fn operand<'a>(name: &'static str, operands: &[OperandData<'a>]) -> Result<&'a Tensor> {
    operands
        .first()
        .ok_or_else(|| Error::execution(name, "missing operand"))?
        .tensor(name)
}

/// `x + c`; the derivative is the identity, so the default rules apply
pub struct AddScalar;

impl Operation for AddScalar {
    fn name(&self) -> &'static str {
        "add_scalar"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        infer_same(self.name(), out, operands)
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let x = operand(self.name(), operands)?;
        let c = ctx.shape().param_float(0)?;
        crate::dispatch_dtype!(out.dtype(), T => {
            let c = Lanes::<T>::splat(T::from_f64(c));
            run_planes::<T>(ctx, out, x, |l| l + c, |l| l)
        })
    }
}

/// `x * c`
pub struct MulScalar;

impl Operation for MulScalar {
    fn name(&self) -> &'static str {
        "mul_scalar"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        infer_same(self.name(), out, operands)
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let x = operand(self.name(), operands)?;
        let c = ctx.shape().param_float(0)?;
        crate::dispatch_dtype!(out.dtype(), T => {
            let c = Lanes::<T>::splat(T::from_f64(c));
            run_planes::<T>(ctx, out, x, |l| l * c, |l| l * c)
        })
    }

    fn jvp(&self, _primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        match tangent(tangents, 0) {
            Some(t) => Ok(Grad::Value(t.mul_scalar(scalar_of(output)?)?)),
            None => Ok(Grad::Zero),
        }
    }

    fn vjp(&self, _primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        Ok(vec![Grad::Value(grad_output.mul_scalar(scalar_of(output)?)?)])
    }
}

fn scalar_of(output: &Array) -> Result<f64> {
    output.shape().param_float(0)
}

impl Array {
    /// Elementwise `x + c`
    pub fn add_scalar(&self, c: f64) -> Result<Array> {
        self.graph()
            .apply_builtin(BuiltinOp::AddScalar, &[self.into()], &[Param::Float(c)])
    }

    /// Elementwise `x * c`
    pub fn mul_scalar(&self, c: f64) -> Result<Array> {
        self.graph()
            .apply_builtin(BuiltinOp::MulScalar, &[self.into()], &[Param::Float(c)])
    }
}
