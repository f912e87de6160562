//! Shape operations: reshape, transpose, broadcast, reduce-to-shape, copy
//!
//! Target shapes travel as `Operand::Shape` pseudo-operands, which never
//! receive gradients. The derivative of each operation is another operation
//! of this module, so the family is closed under differentiation.

use super::registry::BuiltinOp;
use super::traits::{ExecContext, Operation};
use crate::autograd::{Grad, primal, tangent};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::graph::{Array, ArrayShape, Operand, OperandData, Param};
use crate::tensor::{Layout, Tensor, contiguous_strides};

fn expect_operands<'a, const N: usize>(
    name: &'static str,
    operands: &'a [&'a ArrayShape],
) -> Result<&'a [&'a ArrayShape; N]> {
    operands.try_into().map_err(|_| {
        Error::shape_mismatch(
            name,
            format!("expected {N} operands, got {}", operands.len()),
        )
    })
}

fn input<'a>(name: &'static str, operands: &[OperandData<'a>]) -> Result<&'a Tensor> {
    operands
        .first()
        .ok_or_else(|| Error::execution(name, "missing operand"))?
        .tensor(name)
}

/// Copy the leading `numel` elements of a contiguous input, both planes
fn copy_planes<T: Element>(out: &mut Tensor, x: &Tensor) -> Result<()> {
    let n = x.numel();
    let src_re = x.re::<T>()?;
    let src_im = x.im::<T>()?;
    let (re, im) = out.planes_mut::<T>()?;
    re[..n].copy_from_slice(&src_re[..n]);
    if let (Some(im), Some(src_im)) = (im, src_im) {
        im[..n].copy_from_slice(&src_im[..n]);
    }
    Ok(())
}

fn copy_forward(out: &mut Tensor, operands: &[OperandData<'_>], name: &'static str) -> Result<()> {
    let x = input(name, operands)?;
    crate::dispatch_dtype!(out.dtype(), T => { copy_planes::<T>(out, x) })
}

/// Same elements under new dims (row-major order preserved)
pub struct Reshape;

impl Operation for Reshape {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x, target] = expect_operands::<2>(self.name(), operands)?;
        if x.numel() != target.numel() {
            return Err(Error::shape_mismatch(
                self.name(),
                format!(
                    "cannot reshape {:?} ({} elements) to {:?} ({} elements)",
                    x.dims(),
                    x.numel(),
                    target.dims(),
                    target.numel()
                ),
            ));
        }
        out.set_contiguous(target.dims());
        Ok(())
    }

    fn forward(
        &self,
        _ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        copy_forward(out, operands, self.name())
    }

    fn jvp(&self, _primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        match tangent(tangents, 0) {
            Some(t) => Ok(Grad::Value(t.reshape(&output.dims())?)),
            None => Ok(Grad::Zero),
        }
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, _output: &Array) -> Result<Vec<Grad>> {
        let x = primal(primals, 0, self.name())?;
        Ok(vec![
            Grad::Value(grad_output.reshape(&x.dims())?),
            Grad::NoGradient,
        ])
    }
}

/// Swap two dimensions
///
/// The output keeps the input's row-major buffer and swaps the strides, so
/// the node's layout is genuinely strided. Params: `[dim0, dim1]`.
pub struct Transpose;

impl Transpose {
    fn dims_of(shape: &ArrayShape) -> Result<(usize, usize)> {
        let d0 = shape.param_int(0)?;
        let d1 = shape.param_int(1)?;
        Ok((d0 as usize, d1 as usize))
    }
}

impl Operation for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        let d0 = out.param_int(0).map_err(|e| Error::shape_mismatch(self.name(), e.to_string()))?;
        let d1 = out.param_int(1).map_err(|e| Error::shape_mismatch(self.name(), e.to_string()))?;
        let ndim = x.ndim() as i64;
        if !(0..ndim).contains(&d0) || !(0..ndim).contains(&d1) {
            return Err(Error::shape_mismatch(
                self.name(),
                format!("dims ({d0}, {d1}) out of range for rank {ndim}"),
            ));
        }
        let (d0, d1) = (d0 as usize, d1 as usize);
        let mut dims = x.dims().to_vec();
        let mut strides = contiguous_strides(x.dims());
        dims.swap(d0, d1);
        strides.swap(d0, d1);
        out.set_strided(&dims, &strides)
    }

    fn forward(
        &self,
        _ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        copy_forward(out, operands, self.name())
    }

    fn jvp(&self, _primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let (d0, d1) = Self::dims_of(&output.shape())?;
        match tangent(tangents, 0) {
            Some(t) => Ok(Grad::Value(t.transpose(d0, d1)?)),
            None => Ok(Grad::Zero),
        }
    }

    fn vjp(&self, _primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let (d0, d1) = Self::dims_of(&output.shape())?;
        Ok(vec![Grad::Value(grad_output.transpose(d0, d1)?)])
    }
}

/// Expand size-1 and missing leading dimensions (NumPy rules)
///
/// The input is read in place through a stride-0 layout. The default rules
/// are exact here: the JVP broadcasts the tangent, the VJP sums the gradient
/// back to the input dims.
pub struct BroadcastTo;

impl BroadcastTo {
    fn run<T: Element>(out: &mut Tensor, x: &Tensor, layout: &Layout) -> Result<()> {
        let src_re = x.re::<T>()?;
        let src_im = x.im::<T>()?;
        let (re, im) = out.planes_mut::<T>()?;
        for (dst, o) in re.iter_mut().zip(layout.offsets()) {
            *dst = src_re[o];
        }
        if let (Some(im), Some(src_im)) = (im, src_im) {
            for (dst, o) in im.iter_mut().zip(layout.offsets()) {
                *dst = src_im[o];
            }
        }
        Ok(())
    }
}

impl Operation for BroadcastTo {
    fn name(&self) -> &'static str {
        "broadcast_to"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn requires_contiguous(&self) -> bool {
        false
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x, target] = expect_operands::<2>(self.name(), operands)?;
        if Layout::contiguous(x.dims()).broadcast_to(target.dims()).is_none() {
            return Err(Error::shape_mismatch(
                self.name(),
                format!("cannot broadcast {:?} to {:?}", x.dims(), target.dims()),
            ));
        }
        out.set_contiguous(target.dims());
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let x = input(self.name(), operands)?;
        let layout = x
            .layout()
            .broadcast_to(ctx.shape().dims())
            .ok_or_else(|| Error::execution(self.name(), "operand does not broadcast"))?;
        crate::dispatch_dtype!(out.dtype(), T => { Self::run::<T>(out, x, &layout) })
    }
}

/// Sum over the dimensions along which the target broadcasts to the input
///
/// Inverse of [`BroadcastTo`] for gradients: a `[C]` target of a `[N, C]`
/// input gets the column sums.
pub struct SumToShape;

impl SumToShape {
    fn run<T: Element>(out: &mut Tensor, x: &Tensor) -> Result<()> {
        let scatter = out
            .layout()
            .broadcast_to(x.shape())
            .ok_or_else(|| Error::execution("sum_to_shape", "target does not broadcast"))?;
        let src_re = x.re::<T>()?;
        let src_im = x.im::<T>()?;
        let (re, im) = out.planes_mut::<T>()?;
        for (i, o) in scatter.offsets().enumerate() {
            re[o] = re[o] + src_re[i];
        }
        if let (Some(im), Some(src_im)) = (im, src_im) {
            for (i, o) in scatter.offsets().enumerate() {
                im[o] = im[o] + src_im[i];
            }
        }
        Ok(())
    }
}

impl Operation for SumToShape {
    fn name(&self) -> &'static str {
        "sum_to_shape"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x, target] = expect_operands::<2>(self.name(), operands)?;
        if Layout::contiguous(target.dims()).broadcast_to(x.dims()).is_none() {
            return Err(Error::shape_mismatch(
                self.name(),
                format!("{:?} does not broadcast to {:?}", target.dims(), x.dims()),
            ));
        }
        out.set_contiguous(target.dims());
        Ok(())
    }

    fn forward(
        &self,
        _ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let x = input(self.name(), operands)?;
        crate::dispatch_dtype!(out.dtype(), T => { Self::run::<T>(out, x) })
    }

    fn jvp(&self, _primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        match tangent(tangents, 0) {
            Some(t) => Ok(Grad::Value(t.sum_to_shape(&output.dims())?)),
            None => Ok(Grad::Zero),
        }
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, _output: &Array) -> Result<Vec<Grad>> {
        let x = primal(primals, 0, self.name())?;
        Ok(vec![
            Grad::Value(grad_output.broadcast_to(&x.dims())?),
            Grad::NoGradient,
        ])
    }
}

/// Row-major copy; the identity for differentiation
pub struct Contiguous;

impl Operation for Contiguous {
    fn name(&self) -> &'static str {
        "contiguous"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        out.set_contiguous(x.dims());
        Ok(())
    }

    fn forward(
        &self,
        _ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        copy_forward(out, operands, self.name())
    }
}

impl Array {
    fn with_target(&self, op: BuiltinOp, dims: &[usize]) -> Result<Array> {
        self.graph().apply_builtin(
            op,
            &[self.into(), ArrayShape::from_dims(dims).into()],
            &[],
        )
    }

    /// Same elements under `dims`; returns `self` when the dims already match
    pub fn reshape(&self, dims: &[usize]) -> Result<Array> {
        if self.dims().as_slice() == dims {
            return Ok(self.clone());
        }
        self.with_target(BuiltinOp::Reshape, dims)
    }

    /// Swap dimensions `dim0` and `dim1` as a strided view
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Array> {
        self.graph().apply_builtin(
            BuiltinOp::Transpose,
            &[self.into()],
            &[Param::from(dim0), Param::from(dim1)],
        )
    }

    /// Broadcast to `dims`; returns `self` when the dims already match
    pub fn broadcast_to(&self, dims: &[usize]) -> Result<Array> {
        if self.dims().as_slice() == dims {
            return Ok(self.clone());
        }
        self.with_target(BuiltinOp::BroadcastTo, dims)
    }

    /// Sum down to `dims`; returns `self` when the dims already match
    pub fn sum_to_shape(&self, dims: &[usize]) -> Result<Array> {
        if self.dims().as_slice() == dims {
            return Ok(self.clone());
        }
        self.with_target(BuiltinOp::SumToShape, dims)
    }

    /// Sum of all elements as a 0-d array
    pub fn sum(&self) -> Result<Array> {
        self.sum_to_shape(&[])
    }

    /// Row-major copy
    pub fn contiguous(&self) -> Result<Array> {
        self.graph()
            .apply_builtin(BuiltinOp::Contiguous, &[self.into()], &[])
    }
}
