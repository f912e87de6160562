//! # ndgrad
//!
//! **Lazy tensor graphs with forward- and reverse-mode automatic differentiation.**
//!
//! ndgrad evaluates numerical operations over strided, optionally complex
//! n-dimensional arrays. Every operation implements one four-part protocol
//! (shape inference, forward kernel, JVP rule, VJP rule), and every derivative
//! is built from the same operations, so gradients are graph nodes that can be
//! differentiated again.
//!
//! ## Features
//!
//! - **Graph arena**: shared, diamond-shaped DAGs addressed by node ID
//! - **Lazy or eager**: one materialization policy per graph
//! - **Strided storage**: transposes and broadcasts without copies
//! - **Complex values**: separate real and imaginary planes
//! - **Grouped 1-D convolution** with its input and weight gradients
//! - **Numerical checks**: finite-difference and duality checkers for rules
//!
//! ## Quick Start
//!
//! ```
//! use ndgrad::prelude::*;
//!
//! let g = Graph::new();
//! let x = g.from_slice(&[0.5f64, 1.0, 2.0], &[3]).unwrap();
//! let y = x.atan().unwrap().sum().unwrap();
//!
//! let grads = backward(&y).unwrap();
//! let dx = grads.grad(&x).unwrap().to_vec().unwrap();
//! assert!((dx[1] - 0.5).abs() < 1e-12);
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel kernels over disjoint output partitions
//!
//! ## Environment
//!
//! `Graph::from_env` reads `NDGRAD_EXECUTION` (`lazy`/`eager`),
//! `NDGRAD_PARALLEL_MIN_LEN` and `NDGRAD_SHAPE_CACHE`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod autograd;
pub mod config;
pub mod dtype;
pub mod error;
pub mod graph;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::autograd::{Grad, GradStore, backward, jvp, vjp};
    pub use crate::config::{ExecutionPolicy, GraphConfig};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::graph::{Array, ArrayShape, Graph, Operand, Param};
    pub use crate::ops::{ConvSettings, Operation};
    pub use crate::tensor::{Layout, Tensor};
}
