//! Automatic differentiation (autograd)
//!
//! Both modes run over the same graph the values live in:
//!
//! - [`jvp`] pushes tangents forward through each operation's `jvp` rule.
//! - [`vjp`] and [`backward`] pull gradients back through each operation's
//!   `vjp` rule, summing contributions that reach the same node.
//!
//! Rules build their results from other operations, so every derivative is
//! an ordinary lazy [`Array`](crate::graph::Array): nothing is computed until
//! it is read, and derivatives can be differentiated again.
//!
//! Positions that cannot carry a derivative (shape pseudo-operands) are
//! marked [`Grad::NoGradient`]; derivatives that are known to vanish are
//! [`Grad::Zero`]. Neither allocates an array.

mod backward;
mod check;
mod forward;
mod grad_store;
mod rule;

pub use backward::{backward, vjp};
pub use check::{GradCheck, check_duality, check_jvp, numerical_jvp};
pub use forward::jvp;
pub use grad_store::GradStore;
pub use rule::{Grad, default_jvp, default_vjp, primal, tangent};
