//! Elementwise unary operations
//!
//! Each function is a [`UnaryKernel`]: a lane kernel for real data, an
//! optional lane-pair kernel for complex data, and one chain rule. The
//! generic [`ElementwiseUnary`] turns a kernel into a full operation.

mod kernels;

pub use kernels::{
    AtanKernel, CosKernel, ExpKernel, LogKernel, NegKernel, RecipKernel, SinKernel, SqrtKernel,
    SquareKernel, TanhKernel,
};

use super::registry::BuiltinOp;
use super::traits::{ExecContext, Operation};
use crate::autograd::{Grad, primal, tangent};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::graph::{Array, ArrayShape, Operand, OperandData};
use crate::runtime::lanes::{Lanes, map_lane_pairs, map_lanes};
use crate::runtime::{LANES, parallel};
use crate::tensor::Tensor;

/// Elements per parallel partition (a whole number of lane batches)
pub(crate) const CHUNK: usize = 128 * LANES;

/// Scalar function applied elementwise
pub trait UnaryKernel: Send + Sync + 'static {
    /// Operation name
    const NAME: &'static str;

    /// Whether `complex` is implemented
    const COMPLEX: bool = false;

    /// Real lane kernel
    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T>;

    /// Complex lane-pair kernel on (real, imaginary) lanes
    ///
    /// Only called when `COMPLEX` is true.
    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (re, im)
    }

    /// `v * f'(x)` built from graph operations, where `y = f(x)`
    ///
    /// Used by both differentiation modes: the JVP passes the tangent as
    /// `v`, the VJP the output gradient. Complex rules are the holomorphic
    /// derivative, without conjugation.
    fn chain(&self, x: &Array, y: &Array, v: &Array) -> Result<Array>;
}

/// Operation built from a [`UnaryKernel`]
pub struct ElementwiseUnary<K> {
    kernel: K,
}

impl<K: UnaryKernel> ElementwiseUnary<K> {
    /// Wrap a kernel
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    fn run<T: Element>(&self, ctx: &ExecContext<'_>, out: &mut Tensor, x: &Tensor) -> Result<()> {
        let x_re = x.re::<T>()?;
        let x_im = x.im::<T>()?;
        let (out_re, out_im) = out.planes_mut::<T>()?;
        let min_len = ctx.parallel_min_len();

        match out_im {
            None => parallel::for_each_chunk(out_re, CHUNK, min_len, |start, chunk| {
                map_lanes(&x_re[start..start + chunk.len()], chunk, |l| self.kernel.real(l));
            }),
            Some(out_im) => {
                if !K::COMPLEX {
                    return Err(Error::unsupported_operand(K::NAME, "complex operand"));
                }
                let zeros;
                let x_im = match x_im {
                    Some(im) => im,
                    None => {
                        zeros = vec![T::zero(); x_re.len()];
                        &zeros
                    }
                };
                parallel::for_each_chunk_pair(out_re, Some(out_im), CHUNK, min_len, |start, r, i| {
                    let end = start + r.len();
                    if let Some(i) = i {
                        map_lane_pairs(&x_re[start..end], &x_im[start..end], r, i, |a, b| {
                            self.kernel.complex(a, b)
                        });
                    }
                });
            }
        }
        Ok(())
    }
}

impl<K: UnaryKernel> Operation for ElementwiseUnary<K> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn supports_complex(&self) -> bool {
        K::COMPLEX
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        let [x] = operands else {
            return Err(Error::shape_mismatch(
                K::NAME,
                format!("expected 1 operand, got {}", operands.len()),
            ));
        };
        out.set_contiguous(x.dims());
        Ok(())
    }

    fn forward(
        &self,
        ctx: &ExecContext<'_>,
        out: &mut Tensor,
        operands: &[OperandData<'_>],
    ) -> Result<()> {
        let x = operands
            .first()
            .ok_or_else(|| Error::execution(K::NAME, "missing operand"))?
            .tensor(K::NAME)?;
        crate::dispatch_dtype!(out.dtype(), T => { self.run::<T>(ctx, out, x) })
    }

    fn jvp(&self, primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
        match tangent(tangents, 0) {
            Some(v) => Ok(Grad::Value(self.kernel.chain(
                primal(primals, 0, K::NAME)?,
                output,
                v,
            )?)),
            None => Ok(Grad::Zero),
        }
    }

    fn vjp(&self, primals: &[Operand], grad_output: &Array, output: &Array) -> Result<Vec<Grad>> {
        let x = primal(primals, 0, K::NAME)?;
        Ok(vec![Grad::Value(self.kernel.chain(x, output, grad_output)?)])
    }
}

impl Array {
    fn unary(&self, op: BuiltinOp) -> Result<Array> {
        self.graph().apply_builtin(op, &[self.into()], &[])
    }

    /// Elementwise `-x`
    pub fn neg(&self) -> Result<Array> {
        self.unary(BuiltinOp::Neg)
    }

    /// Elementwise `e^x`
    pub fn exp(&self) -> Result<Array> {
        self.unary(BuiltinOp::Exp)
    }

    /// Elementwise natural logarithm (principal branch for complex input)
    pub fn log(&self) -> Result<Array> {
        self.unary(BuiltinOp::Log)
    }

    /// Elementwise sine
    pub fn sin(&self) -> Result<Array> {
        self.unary(BuiltinOp::Sin)
    }

    /// Elementwise cosine
    pub fn cos(&self) -> Result<Array> {
        self.unary(BuiltinOp::Cos)
    }

    /// Elementwise square root (principal branch for complex input)
    pub fn sqrt(&self) -> Result<Array> {
        self.unary(BuiltinOp::Sqrt)
    }

    /// Elementwise `x * x`
    pub fn square(&self) -> Result<Array> {
        self.unary(BuiltinOp::Square)
    }

    /// Elementwise `1 / x`
    pub fn recip(&self) -> Result<Array> {
        self.unary(BuiltinOp::Recip)
    }

    /// Elementwise hyperbolic tangent (real only)
    pub fn tanh(&self) -> Result<Array> {
        self.unary(BuiltinOp::Tanh)
    }

    /// Elementwise arctangent (real only)
    pub fn atan(&self) -> Result<Array> {
        self.unary(BuiltinOp::Atan)
    }
}

#[cfg(test)]
mod tests {
    use crate::dtype::DType;
    use crate::graph::Graph;

    #[test]
    fn test_real_kernels_forward() {
        let g = Graph::new();
        let x = g.from_slice(&[0.25f64, 1.0, 2.0], &[3]).unwrap();
        let cases: [(&str, fn(f64) -> f64); 10] = [
            ("neg", |v| -v),
            ("exp", f64::exp),
            ("log", f64::ln),
            ("sin", f64::sin),
            ("cos", f64::cos),
            ("sqrt", f64::sqrt),
            ("square", |v| v * v),
            ("recip", f64::recip),
            ("tanh", f64::tanh),
            ("atan", f64::atan),
        ];
        for (name, f) in cases {
            let y = g.apply_named(name, &[(&x).into()], &[]).unwrap();
            let got = y.to_vec().unwrap();
            for (v, expected) in got.iter().zip([0.25, 1.0, 2.0].map(f)) {
                assert!((v - expected).abs() < 1e-12, "{name}: {v} vs {expected}");
            }
        }
    }

    #[test]
    fn test_f32_long_input_uses_every_lane() {
        let g = Graph::new();
        let data: Vec<f32> = (0..1000).map(|i| i as f32 * 0.01).collect();
        let x = g.from_slice(&data, &[10, 100]).unwrap();
        let y = x.square().unwrap();
        assert_eq!(y.dtype(), DType::F32);
        let got = y.to_vec().unwrap();
        for (v, d) in got.iter().zip(&data) {
            assert!((v - (*d as f64) * (*d as f64)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_complex_exp_and_log() {
        let g = Graph::new();
        let z = g.from_complex(&[0.0f64, 1.0], &[std::f64::consts::PI, 1.0], &[2]).unwrap();
        let e = z.exp().unwrap();
        let re = e.to_vec().unwrap();
        let im = e.imag_to_vec().unwrap();
        assert!((re[0] + 1.0).abs() < 1e-12);
        assert!(im[0].abs() < 1e-12);

        let back = e.log().unwrap();
        let re = back.to_vec().unwrap();
        let im = back.imag_to_vec().unwrap();
        assert!((re[1] - 1.0).abs() < 1e-12);
        assert!((im[1] - 1.0).abs() < 1e-12);
    }
}
