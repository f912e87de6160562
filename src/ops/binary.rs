//! Broadcasting binary arithmetic
//!
//! Operands are read in place through stride-0 broadcast layouts (no
//! contiguous copy and no materialized broadcast), gathered into lane batches
//! and written to a contiguous output. Mixing a real and a complex operand
//! promotes the result to complex; the real side reads as zero imaginary part.

use super::registry::BuiltinOp;
use super::traits::{ExecContext, Operation};
use super::unary::CHUNK;
use crate::autograd::{Grad, default_jvp, default_vjp, primal, tangent};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::graph::{Array, ArrayShape, Operand, OperandData};
use crate::runtime::{LANES, Lanes, parallel};
use crate::tensor::{Offsets, Tensor, broadcast_shapes};

/// Lane kernels and rules of one binary function
pub trait BinaryKernel: Send + Sync + 'static {
    /// Operation name
    const NAME: &'static str;

    /// Real lane kernel
    fn real<T: Element>(&self, a: Lanes<T>, b: Lanes<T>) -> Lanes<T>;

    /// Complex kernel on `(re, im)` lane pairs
    fn complex<T: Element>(
        &self,
        a: (Lanes<T>, Lanes<T>),
        b: (Lanes<T>, Lanes<T>),
    ) -> (Lanes<T>, Lanes<T>);

    /// Forward-mode rule
    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        default_jvp(primals, tangents, output)
    }

    /// Reverse-mode rule
    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        default_vjp(primals, grad_output, output)
    }
}

/// Operation built from a [`BinaryKernel`]
pub struct ElementwiseBinary<K> {
    kernel: K,
}

impl<K: BinaryKernel> ElementwiseBinary<K> {
    /// Wrap a kernel
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    fn run<T: Element>(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        a: &Tensor,
        b: &Tensor,
    ) -> Result<()> {
        let dims = ctx.shape().dims();
        let broadcast = |t: &Tensor| {
            t.layout().broadcast_to(dims).ok_or_else(|| {
                Error::execution(
                    K::NAME,
                    format!("cannot broadcast {:?} to {:?}", t.shape(), dims),
                )
            })
        };
        let la = broadcast(a)?;
        let lb = broadcast(b)?;
        let (a_re, a_im) = (a.re::<T>()?, a.im::<T>()?);
        let (b_re, b_im) = (b.re::<T>()?, b.im::<T>()?);
        let (out_re, out_im) = out.planes_mut::<T>()?;
        let min_len = ctx.parallel_min_len();

        parallel::for_each_chunk_pair(out_re, out_im, CHUNK, min_len, |start, re, mut im| {
            let mut ia = la.offsets_from(start);
            let mut ib = lb.offsets_from(start);
            let mut pos = 0;
            while pos < re.len() {
                let n = (re.len() - pos).min(LANES);
                let oa = next_offsets(&mut ia, n);
                let ob = next_offsets(&mut ib, n);
                let ar = gather(a_re, &oa, n);
                let br = gather(b_re, &ob, n);
                match im.as_deref_mut() {
                    None => self.kernel.real(ar, br).store(&mut re[pos..pos + n]),
                    Some(im) => {
                        let ai = a_im.map_or_else(Lanes::zero, |p| gather(p, &oa, n));
                        let bi = b_im.map_or_else(Lanes::zero, |p| gather(p, &ob, n));
                        let (r, i) = self.kernel.complex((ar, ai), (br, bi));
                        r.store(&mut re[pos..pos + n]);
                        i.store(&mut im[pos..pos + n]);
                    }
                }
                pos += n;
            }
        });
        Ok(())
    }
}

fn next_offsets(it: &mut Offsets<'_>, n: usize) -> [usize; LANES] {
    let mut idx = [0usize; LANES];
    for (slot, o) in idx.iter_mut().take(n).zip(it) {
        *slot = o;
    }
    idx
}

fn gather<T: Element>(plane: &[T], offsets: &[usize; LANES], n: usize) -> Lanes<T> {
    Lanes(std::array::from_fn(|j| {
        if j < n { plane[offsets[j]] } else { T::zero() }
    }))
}

impl<K: BinaryKernel> Operation for ElementwiseBinary<K> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn requires_contiguous(&self) -> bool {
        false
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [a, b] = operands else {
            return Err(Error::shape_mismatch(
                K::NAME,
                format!("expected 2 operands, got {}", operands.len()),
            ));
        };
        let dims = broadcast_shapes(a.dims(), b.dims()).ok_or_else(|| {
            Error::shape_mismatch(
                K::NAME,
                format!("shapes {:?} and {:?} do not broadcast", a.dims(), b.dims()),
            )
        })?;
        out.set_contiguous(&dims);
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let [a, b] = operands else {
            return Err(Error::execution(K::NAME, "expected 2 operands"));
        };
        let (a, b) = (a.tensor(K::NAME)?, b.tensor(K::NAME)?);
        crate::dispatch_dtype!(out.dtype(), T => { self.run::<T>(ctx, out, a, b) })
    }

    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        self.kernel.jvp(primals, tangents, output)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        self.kernel.vjp(primals, grad_output, output)
    }
}

/// `a + b`
pub struct AddKernel;

impl BinaryKernel for AddKernel {
    const NAME: &'static str = "add";

    fn real<T: Element>(&self, a: Lanes<T>, b: Lanes<T>) -> Lanes<T> {
        a + b
    }

    fn complex<T: Element>(
        &self,
        a: (Lanes<T>, Lanes<T>),
        b: (Lanes<T>, Lanes<T>),
    ) -> (Lanes<T>, Lanes<T>) {
        (a.0 + b.0, a.1 + b.1)
    }
}

/// `a - b`
pub struct SubKernel;

impl BinaryKernel for SubKernel {
    const NAME: &'static str = "sub";

    fn real<T: Element>(&self, a: Lanes<T>, b: Lanes<T>) -> Lanes<T> {
        a - b
    }

    fn complex<T: Element>(
        &self,
        a: (Lanes<T>, Lanes<T>),
        b: (Lanes<T>, Lanes<T>),
    ) -> (Lanes<T>, Lanes<T>) {
        (a.0 - b.0, a.1 - b.1)
    }

    fn jvp(&self, _primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let dims = output.dims();
        let ta = tangent(tangents, 0).map(|t| t.broadcast_to(&dims)).transpose()?;
        let tb = tangent(tangents, 1).map(|t| t.broadcast_to(&dims)).transpose()?;
        Ok(match (ta, tb) {
            (Some(ta), Some(tb)) => Grad::Value(ta.sub(&tb)?),
            (Some(ta), None) => Grad::Value(ta),
            (None, Some(tb)) => Grad::Value(tb.neg()?),
            (None, None) => Grad::Zero,
        })
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, _output: &Array) -> Result<Vec<Grad>> {
        let a = primal(primals, 0, Self::NAME)?;
        let b = primal(primals, 1, Self::NAME)?;
        Ok(vec![
            Grad::Value(grad_output.sum_to_shape(&a.dims())?),
            Grad::Value(grad_output.neg()?.sum_to_shape(&b.dims())?),
        ])
    }
}

/// `a * b`
pub struct MulKernel;

impl BinaryKernel for MulKernel {
    const NAME: &'static str = "mul";

    fn real<T: Element>(&self, a: Lanes<T>, b: Lanes<T>) -> Lanes<T> {
        a * b
    }

    fn complex<T: Element>(
        &self,
        a: (Lanes<T>, Lanes<T>),
        b: (Lanes<T>, Lanes<T>),
    ) -> (Lanes<T>, Lanes<T>) {
        (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
    }

    // d(ab) = da*b + a*db
    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let a = primal(primals, 0, Self::NAME)?;
        let b = primal(primals, 1, Self::NAME)?;
        let dims = output.dims();
        let mut acc = Grad::Zero;
        if let Some(ta) = tangent(tangents, 0) {
            acc = acc.accumulate(Grad::Value(ta.mul(b)?.broadcast_to(&dims)?))?;
        }
        if let Some(tb) = tangent(tangents, 1) {
            acc = acc.accumulate(Grad::Value(a.mul(tb)?.broadcast_to(&dims)?))?;
        }
        Ok(acc)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, _output: &Array) -> Result<Vec<Grad>> {
        let a = primal(primals, 0, Self::NAME)?;
        let b = primal(primals, 1, Self::NAME)?;
        Ok(vec![
            Grad::Value(grad_output.mul(b)?.sum_to_shape(&a.dims())?),
            Grad::Value(grad_output.mul(a)?.sum_to_shape(&b.dims())?),
        ])
    }
}

/// `a / b`
pub struct DivKernel;

impl BinaryKernel for DivKernel {
    const NAME: &'static str = "div";

    fn real<T: Element>(&self, a: Lanes<T>, b: Lanes<T>) -> Lanes<T> {
        a / b
    }

    fn complex<T: Element>(
        &self,
        a: (Lanes<T>, Lanes<T>),
        b: (Lanes<T>, Lanes<T>),
    ) -> (Lanes<T>, Lanes<T>) {
        let d = b.0 * b.0 + b.1 * b.1;
        (
            (a.0 * b.0 + a.1 * b.1) / d,
            (a.1 * b.0 - a.0 * b.1) / d,
        )
    }

    // d(a/b) = da/b - y*db/b
    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        let b = primal(primals, 1, Self::NAME)?;
        let dims = output.dims();
        let mut acc = Grad::Zero;
        if let Some(ta) = tangent(tangents, 0) {
            acc = acc.accumulate(Grad::Value(ta.div(b)?.broadcast_to(&dims)?))?;
        }
        if let Some(tb) = tangent(tangents, 1) {
            let term = output.mul(tb)?.div(b)?.neg()?;
            acc = acc.accumulate(Grad::Value(term.broadcast_to(&dims)?))?;
        }
        Ok(acc)
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let a = primal(primals, 0, Self::NAME)?;
        let b = primal(primals, 1, Self::NAME)?;
        let ga = grad_output.div(b)?;
        let gb = ga.mul(output)?.neg()?;
        Ok(vec![
            Grad::Value(ga.sum_to_shape(&a.dims())?),
            Grad::Value(gb.sum_to_shape(&b.dims())?),
        ])
    }
}

/// `add` operation
pub type Add = ElementwiseBinary<AddKernel>;
/// `sub` operation
pub type Sub = ElementwiseBinary<SubKernel>;
/// `mul` operation
pub type Mul = ElementwiseBinary<MulKernel>;
/// `div` operation
pub type Div = ElementwiseBinary<DivKernel>;

impl Array {
    fn binary(&self, op: BuiltinOp, other: &Array) -> Result<Array> {
        self.graph()
            .apply_builtin(op, &[self.into(), other.into()], &[])
    }

    /// Broadcasting `self + other`
    pub fn add(&self, other: &Array) -> Result<Array> {
        self.binary(BuiltinOp::Add, other)
    }

    /// Broadcasting `self - other`
    pub fn sub(&self, other: &Array) -> Result<Array> {
        self.binary(BuiltinOp::Sub, other)
    }

    /// Broadcasting `self * other`
    pub fn mul(&self, other: &Array) -> Result<Array> {
        self.binary(BuiltinOp::Mul, other)
    }

    /// Broadcasting `self / other`
    pub fn div(&self, other: &Array) -> Result<Array> {
        self.binary(BuiltinOp::Div, other)
    }
}

#[cfg(test)]
mod tests {
    use crate::dtype::DType;
    use crate::error::Error;
    use crate::graph::Graph;

    #[test]
    fn test_broadcast_add_and_mul() {
        let g = Graph::new();
        let a = g.from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let col = g.from_slice(&[10.0f64, 20.0], &[2, 1]).unwrap();
        let row = g.from_slice(&[1.0f64, 0.0, -1.0], &[3]).unwrap();

        let s = a.add(&col).unwrap();
        assert_eq!(s.dims().as_slice(), &[2, 3]);
        assert_eq!(s.to_vec().unwrap(), vec![11.0, 12.0, 13.0, 24.0, 25.0, 26.0]);

        let p = a.mul(&row).unwrap();
        assert_eq!(p.to_vec().unwrap(), vec![1.0, 0.0, -3.0, 4.0, 0.0, -6.0]);
    }

    #[test]
    fn test_incompatible_shapes_fail_at_construction() {
        let g = Graph::new();
        let a = g.zeros(&[2, 3], DType::F64).unwrap();
        let b = g.zeros(&[4], DType::F64).unwrap();
        let before = g.len();
        assert!(a.sub(&b).unwrap_err().is_shape_mismatch());
        assert_eq!(g.len(), before);
    }

    #[test]
    fn test_dtype_mismatch() {
        let g = Graph::new();
        let a = g.zeros(&[2], DType::F64).unwrap();
        let b = g.zeros(&[2], DType::F32).unwrap();
        assert!(matches!(a.add(&b), Err(Error::DTypeMismatch { .. })));
    }

    #[test]
    fn test_mixed_real_complex_promotes() {
        let g = Graph::new();
        let z = g.from_complex(&[1.0f64, 0.0], &[1.0, 2.0], &[2]).unwrap();
        let r = g.from_slice(&[2.0f64, 4.0], &[2]).unwrap();

        let p = z.mul(&r).unwrap();
        assert!(p.is_complex());
        assert_eq!(p.to_vec().unwrap(), vec![2.0, 0.0]);
        assert_eq!(p.imag_to_vec().unwrap(), vec![2.0, 8.0]);

        // (1+i)/(1+i) = 1
        let q = z.div(&z).unwrap();
        let re = q.to_vec().unwrap();
        let im = q.imag_to_vec().unwrap();
        assert!((re[0] - 1.0).abs() < 1e-12 && im[0].abs() < 1e-12);
    }

    #[test]
    fn test_strided_operand_read_in_place() {
        let g = Graph::new();
        let t = g
            .from_strided(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], &[1, 3], 0)
            .unwrap();
        let ones = g.ones(&[3, 2], DType::F64).unwrap();
        let s = t.add(&ones).unwrap();
        assert_eq!(s.to_vec().unwrap(), vec![2.0, 5.0, 3.0, 6.0, 4.0, 7.0]);
    }
}
