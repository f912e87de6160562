//! Operations
//!
//! Every operation implements the four-part [`Operation`] protocol: shape
//! inference, forward execution, and the two differentiation rules. The
//! harness (`Graph::apply`) is the only caller; operations never see the
//! graph arena, only shapes, tensors and array handles.
//!
//! ```text
//! Operation
//!   ├── ElementwiseUnary<K: UnaryKernel>   neg, exp, log, sin, cos, sqrt, square, recip, tanh, atan
//!   ├── AddScalar, MulScalar               x + c, x * c
//!   ├── ElementwiseBinary<K: BinaryKernel> add, sub, mul, div (broadcasting)
//!   ├── shape_ops                          reshape, transpose, broadcast_to, sum_to_shape, contiguous
//!   └── conv                               conv1d, conv1d_input_grad, conv1d_weight_grad
//! ```
//!
//! # Adding an operation
//!
//! Implement [`Operation`] and register it with `Graph::register`; apply it
//! with `Graph::apply` (handle) or `Graph::apply_named`. Rules that are not
//! overridden fall back to [`crate::autograd::default_jvp`] and
//! [`crate::autograd::default_vjp`].
//!
//! ```
//! use ndgrad::prelude::*;
//! use ndgrad::ops::ExecContext;
//! use ndgrad::graph::OperandData;
//!
//! /// x + x, differentiated by hand
//! struct Double;
//!
//! impl Operation for Double {
//!     fn name(&self) -> &'static str {
//!         "double"
//!     }
//!
//!     fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
//!         out.set_contiguous(operands[0].dims());
//!         Ok(())
//!     }
//!
//!     fn forward(&self, _: &ExecContext<'_>, out: &mut Tensor, operands: &[OperandData<'_>]) -> Result<()> {
//!         let x = operands[0].tensor(self.name())?.re::<f64>()?;
//!         for (o, v) in out.re_mut::<f64>()?.iter_mut().zip(x) {
//!             *o = 2.0 * v;
//!         }
//!         Ok(())
//!     }
//!
//!     fn vjp(&self, _: &[Operand], grad: &Array, _: &Array) -> Result<Vec<Grad>> {
//!         Ok(vec![Grad::Value(grad.mul_scalar(2.0)?)])
//!     }
//! }
//!
//! let g = Graph::new();
//! let op = g.register(Double).unwrap();
//! let x = g.from_slice(&[1.0f64, 2.0], &[2]).unwrap();
//! let y = g.apply(&op, &[x.clone().into()], &[]).unwrap();
//! assert_eq!(y.to_vec().unwrap(), vec![2.0, 4.0]);
//! ```

mod binary;
mod constant;
pub mod conv;
mod registry;
mod scalar;
mod shape_ops;
mod traits;
mod unary;

pub use binary::{
    Add, AddKernel, BinaryKernel, Div, DivKernel, ElementwiseBinary, Mul, MulKernel, Sub,
    SubKernel,
};
pub use constant::Constant;
pub use conv::{Conv1d, Conv1dInputGrad, Conv1dWeightGrad, ConvSettings};
pub use registry::{BuiltinOp, OpRegistry};
pub use scalar::{AddScalar, MulScalar};
pub use shape_ops::{BroadcastTo, Contiguous, Reshape, SumToShape, Transpose};
pub use traits::{ExecContext, OpHandle, Operation};
pub use unary::{
    AtanKernel, CosKernel, ElementwiseUnary, ExpKernel, LogKernel, NegKernel, RecipKernel,
    SinKernel, SqrtKernel, SquareKernel, TanhKernel, UnaryKernel,
};
