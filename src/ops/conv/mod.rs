//! Grouped 1-D convolution and its two gradient operations
//!
//! `conv1d`, `conv1d_input_grad` and `conv1d_weight_grad` are bilinear in
//! their two array operands, and the derivative of each one is built from
//! the other two. That closes the family under differentiation, so gradients
//! of gradients stay in the graph.
//!
//! All three read their operands in place through each buffer's own strides
//! and split the contiguous output into rows for the parallel-for.

mod kernel;
mod params;

pub use params::{Conv1dParams, ConvSettings, compute_output_size};

use super::registry::BuiltinOp;
use super::traits::{ExecContext, Operation};
use crate::autograd::{Grad, primal, tangent};
use crate::error::{Error, Result};
use crate::graph::{Array, ArrayShape, Operand, OperandData};
use crate::tensor::Tensor;
use kernel::View;

fn settings_of(op: &'static str, output: &Array) -> Result<ConvSettings> {
    ConvSettings::from_shape(op, &output.shape())
}

fn tensors<'a>(op: &'static str, operands: &[OperandData<'a>]) -> Result<(&'a Tensor, &'a Tensor)> {
    match operands {
        [a, b, ..] => Ok((a.tensor(op)?, b.tensor(op)?)),
        _ => Err(Error::execution(op, "expected two array operands")),
    }
}

fn target<'a>(op: &'static str, operands: &[&'a ArrayShape]) -> Result<&'a ArrayShape> {
    operands
        .get(2)
        .copied()
        .ok_or_else(|| Error::shape_mismatch(op, "missing target shape operand"))
}

/// `conv1d(input [N, C_in, L], weight [C_out, C_in/groups, K], bias? [C_out])`
///
/// Params: `[stride, padding, dilation, groups]`.
pub struct Conv1d;

impl Operation for Conv1d {
    fn name(&self) -> &'static str {
        "conv1d"
    }

    fn requires_contiguous(&self) -> bool {
        false
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let (input, weight, bias) = match operands {
            [x, w] => (x, w, None),
            [x, w, b] => (x, w, Some(b)),
            _ => {
                return Err(Error::shape_mismatch(
                    self.name(),
                    format!("expected 2 or 3 operands, got {}", operands.len()),
                ));
            }
        };
        let settings = ConvSettings::from_shape(self.name(), out)?;
        let p = Conv1dParams::new(self.name(), input.dims(), weight.dims(), settings)?;
        if let Some(b) = bias {
            if b.dims() != [p.c_out] {
                return Err(Error::shape_mismatch(
                    self.name(),
                    format!("bias must have shape [{}], got {:?}", p.c_out, b.dims()),
                ));
            }
        }
        out.set_contiguous(&p.output_dims());
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let (x, w) = tensors(self.name(), operands)?;
        let bias = operands.get(2).map(|b| b.tensor(self.name())).transpose()?;
        let settings = ConvSettings::from_shape(self.name(), ctx.shape())?;
        let p = Conv1dParams::new(self.name(), x.shape(), w.shape(), settings)?;
        crate::dispatch_dtype!(out.dtype(), T => {
            let bias = bias.map(View::<T>::new).transpose()?;
            let (re, _) = out.planes_mut::<T>()?;
            kernel::conv1d_forward(&p, View::new(x)?, View::new(w)?, bias, re, ctx.parallel_min_len());
            Ok(())
        })
    }

    // d conv(x, w) + b = conv(dx, w) + conv(x, dw) + db
    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let s = settings_of(self.name(), output)?;
        let x = primal(primals, 0, self.name())?;
        let w = primal(primals, 1, self.name())?;
        let mut acc = Grad::Zero;
        if let Some(tx) = tangent(tangents, 0) {
            acc = acc.accumulate(Grad::Value(tx.conv1d(w, None, s)?))?;
        }
        if let Some(tw) = tangent(tangents, 1) {
            acc = acc.accumulate(Grad::Value(x.conv1d(tw, None, s)?))?;
        }
        if let Some(tb) = tangent(tangents, 2) {
            let c_out = tb.numel();
            let db = tb.reshape(&[c_out, 1])?.broadcast_to(&output.dims())?;
            acc = acc.accumulate(Grad::Value(db))?;
        }
        Ok(acc)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let s = settings_of(self.name(), output)?;
        let x = primal(primals, 0, self.name())?;
        let w = primal(primals, 1, self.name())?;
        let mut grads = vec![
            Grad::Value(grad_output.conv1d_input_grad(w, &x.dims(), s)?),
            Grad::Value(x.conv1d_weight_grad(grad_output, &w.dims(), s)?),
        ];
        if primals.len() > 2 {
            let c_out = w.dims()[0];
            let db = grad_output.sum_to_shape(&[c_out, 1])?.reshape(&[c_out])?;
            grads.push(Grad::Value(db));
        }
        Ok(grads)
    }
}

/// `conv1d_input_grad(grad [N, C_out, L_out], weight, Shape [N, C_in, L])`
///
/// The adjoint of `conv1d` in its input. Params as for `conv1d`.
pub struct Conv1dInputGrad;

impl Operation for Conv1dInputGrad {
    fn name(&self) -> &'static str {
        "conv1d_input_grad"
    }

    fn requires_contiguous(&self) -> bool {
        false
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let input = target(self.name(), operands)?;
        let (grad, weight) = (operands[0], operands[1]);
        let settings = ConvSettings::from_shape(self.name(), out)?;
        let p = Conv1dParams::new(self.name(), input.dims(), weight.dims(), settings)?;
        p.expect_output(grad.dims(), self.name())?;
        out.set_contiguous(&p.input_dims());
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let (g, w) = tensors(self.name(), operands)?;
        let settings = ConvSettings::from_shape(self.name(), ctx.shape())?;
        let p = Conv1dParams::new(self.name(), ctx.shape().dims(), w.shape(), settings)?;
        crate::dispatch_dtype!(out.dtype(), T => {
            let (re, _) = out.planes_mut::<T>()?;
            kernel::conv1d_input_grad(&p, View::new(g)?, View::new(w)?, re, ctx.parallel_min_len());
            Ok(())
        })
    }

    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let s = settings_of(self.name(), output)?;
        let g = primal(primals, 0, self.name())?;
        let w = primal(primals, 1, self.name())?;
        let dims = output.dims();
        let mut acc = Grad::Zero;
        if let Some(tg) = tangent(tangents, 0) {
            acc = acc.accumulate(Grad::Value(tg.conv1d_input_grad(w, &dims, s)?))?;
        }
        if let Some(tw) = tangent(tangents, 1) {
            acc = acc.accumulate(Grad::Value(g.conv1d_input_grad(tw, &dims, s)?))?;
        }
        Ok(acc)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let s = settings_of(self.name(), output)?;
        let g = primal(primals, 0, self.name())?;
        let w = primal(primals, 1, self.name())?;
        Ok(vec![
            Grad::Value(grad_output.conv1d(w, None, s)?),
            Grad::Value(grad_output.conv1d_weight_grad(g, &w.dims(), s)?),
            Grad::NoGradient,
        ])
    }
}

/// `conv1d_weight_grad(input [N, C_in, L], grad [N, C_out, L_out], Shape [C_out, C_in/groups, K])`
///
/// The adjoint of `conv1d` in its weight. Params as for `conv1d`.
pub struct Conv1dWeightGrad;

impl Operation for Conv1dWeightGrad {
    fn name(&self) -> &'static str {
        "conv1d_weight_grad"
    }

    fn requires_contiguous(&self) -> bool {
        false
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let weight = target(self.name(), operands)?;
        let (input, grad) = (operands[0], operands[1]);
        let settings = ConvSettings::from_shape(self.name(), out)?;
        let p = Conv1dParams::new(self.name(), input.dims(), weight.dims(), settings)?;
        p.expect_output(grad.dims(), self.name())?;
        out.set_contiguous(&p.weight_dims());
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let (x, g) = tensors(self.name(), operands)?;
        let settings = ConvSettings::from_shape(self.name(), ctx.shape())?;
        let p = Conv1dParams::new(self.name(), x.shape(), ctx.shape().dims(), settings)?;
        crate::dispatch_dtype!(out.dtype(), T => {
            let (re, _) = out.planes_mut::<T>()?;
            kernel::conv1d_weight_grad(&p, View::new(x)?, View::new(g)?, re, ctx.parallel_min_len());
            Ok(())
        })
    }

    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let s = settings_of(self.name(), output)?;
        let x = primal(primals, 0, self.name())?;
        let g = primal(primals, 1, self.name())?;
        let dims = output.dims();
        let mut acc = Grad::Zero;
        if let Some(tx) = tangent(tangents, 0) {
            acc = acc.accumulate(Grad::Value(tx.conv1d_weight_grad(g, &dims, s)?))?;
        }
        if let Some(tg) = tangent(tangents, 1) {
            acc = acc.accumulate(Grad::Value(x.conv1d_weight_grad(tg, &dims, s)?))?;
        }
        Ok(acc)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let s = settings_of(self.name(), output)?;
        let x = primal(primals, 0, self.name())?;
        let g = primal(primals, 1, self.name())?;
        Ok(vec![
            Grad::Value(g.conv1d_input_grad(grad_output, &x.dims(), s)?),
            Grad::Value(x.conv1d(grad_output, None, s)?),
            Grad::NoGradient,
        ])
    }
}

impl Array {
    /// Grouped 1-D convolution of `self [N, C_in, L]` with `weight`
    pub fn conv1d(&self, weight: &Array, bias: Option<&Array>, settings: ConvSettings) -> Result<Array> {
        let mut operands = vec![self.into(), weight.into()];
        if let Some(b) = bias {
            operands.push(b.into());
        }
        self.graph()
            .apply_builtin(BuiltinOp::Conv1d, &operands, &settings.to_params())
    }

    /// Input gradient of `conv1d`, with `self` as the output gradient
    pub fn conv1d_input_grad(
        &self,
        weight: &Array,
        input_dims: &[usize],
        settings: ConvSettings,
    ) -> Result<Array> {
        self.graph().apply_builtin(
            BuiltinOp::Conv1dInputGrad,
            &[self.into(), weight.into(), ArrayShape::from_dims(input_dims).into()],
            &settings.to_params(),
        )
    }

    /// Weight gradient of `conv1d`, with `self` as the input
    pub fn conv1d_weight_grad(
        &self,
        grad: &Array,
        weight_dims: &[usize],
        settings: ConvSettings,
    ) -> Result<Array> {
        self.graph().apply_builtin(
            BuiltinOp::Conv1dWeightGrad,
            &[self.into(), grad.into(), ArrayShape::from_dims(weight_dims).into()],
            &settings.to_params(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_output_dims() {
        let g = Graph::new();
        let x = g.zeros(&[2, 3, 10], Default::default()).unwrap();
        let w = g.zeros(&[6, 3, 3], Default::default()).unwrap();
        let s = ConvSettings {
            stride: 2,
            padding: 1,
            ..ConvSettings::default()
        };
        let y = x.conv1d(&w, None, s).unwrap();
        assert_eq!(y.dims().as_slice(), &[2, 6, 5]);
    }

    #[test]
    fn test_bias_shape_checked() {
        let g = Graph::new();
        let x = g.zeros(&[1, 2, 5], Default::default()).unwrap();
        let w = g.zeros(&[3, 2, 3], Default::default()).unwrap();
        let b = g.zeros(&[2], Default::default()).unwrap();
        let err = x.conv1d(&w, Some(&b), ConvSettings::default()).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_complex_input_rejected() {
        let g = Graph::new();
        let x = g.from_complex(&[1.0f64; 3], &[0.0; 3], &[1, 1, 3]).unwrap();
        let w = g.ones(&[1, 1, 1], Default::default()).unwrap();
        let before = g.stats().allocations;
        let err = x.conv1d(&w, None, ConvSettings::default()).unwrap_err();
        assert!(err.is_unsupported_operand());
        assert_eq!(g.stats().allocations, before);
    }

    #[test]
    fn test_gradient_ops_shapes() {
        let g = Graph::new();
        let s = ConvSettings {
            stride: 2,
            padding: 1,
            dilation: 1,
            groups: 2,
        };
        let x = g.ones(&[1, 4, 10], Default::default()).unwrap();
        let w = g.ones(&[4, 2, 3], Default::default()).unwrap();
        let y = x.conv1d(&w, None, s).unwrap();
        let gx = y.conv1d_input_grad(&w, &[1, 4, 10], s).unwrap();
        let gw = x.conv1d_weight_grad(&y, &[4, 2, 3], s).unwrap();
        assert_eq!(gx.dims().as_slice(), &[1, 4, 10]);
        assert_eq!(gw.dims().as_slice(), &[4, 2, 3]);

        // gradient dims must match the forward output
        assert!(
            x.conv1d_weight_grad(&x, &[4, 2, 3], s)
                .unwrap_err()
                .is_shape_mismatch()
        );
    }
}
