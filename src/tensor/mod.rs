//! Tensor storage types
//!
//! This module provides `Tensor`, a materialized n-dimensional buffer: a
//! `Layout` (shape, strides, offset) over a `Storage` of one real plane and
//! an optional imaginary plane.

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, Offsets, Shape, Strides, broadcast_shapes, contiguous_strides};
pub use storage::{Plane, Storage};
