//! Execution primitives consumed by the operation kernels
//!
//! - `allocator`: output buffer allocation with accounting
//! - `helpers`: the make-contiguous copy used before contiguous-only kernels
//! - `lanes`: fixed-width numeric lanes for elementwise kernels
//! - `parallel`: parallel-for over disjoint output partitions

mod allocator;
mod helpers;
pub mod lanes;
pub mod parallel;

pub use allocator::{Allocator, AllocatorStats, CpuAllocator};
pub use helpers::ensure_contiguous;
pub use lanes::{LANES, Lanes};
