//! Buffer allocator with allocation accounting
//!
//! Every output buffer the harness creates goes through an `Allocator`, so the
//! counters below are an exact record of which nodes touched memory.

use crate::dtype::DType;
use crate::error::Result;
use crate::tensor::{Layout, Tensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory allocator trait for output buffers
pub trait Allocator: Send + Sync {
    /// Allocate a zero-filled tensor whose planes cover `layout`
    fn allocate(&self, layout: Layout, dtype: DType, complex: bool) -> Result<Tensor>;

    /// Snapshot of the allocation counters
    fn stats(&self) -> AllocatorStats {
        AllocatorStats::default()
    }
}

/// Allocation counters
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of buffers handed out
    pub allocations: usize,
    /// Total bytes handed out, both planes included
    pub bytes: usize,
}

/// Heap allocator used by every graph
///
/// Clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct CpuAllocator {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    allocations: AtomicUsize,
    bytes: AtomicUsize,
}

impl CpuAllocator {
    /// Create an allocator with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }
}

impl Allocator for CpuAllocator {
    fn allocate(&self, layout: Layout, dtype: DType, complex: bool) -> Result<Tensor> {
        let tensor = Tensor::zeroed(layout, dtype, complex)?;
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes
            .fetch_add(tensor.storage().size_in_bytes(), Ordering::Relaxed);
        Ok(tensor)
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            bytes: self.counters.bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_counts_both_planes() {
        let alloc = CpuAllocator::new();
        let t = alloc
            .allocate(Layout::contiguous(&[2, 3]), DType::F32, true)
            .unwrap();
        assert!(t.is_complex());
        assert_eq!(
            alloc.stats(),
            AllocatorStats {
                allocations: 1,
                bytes: 48
            }
        );

        let shared = alloc.clone();
        shared
            .allocate(Layout::contiguous(&[4]), DType::F64, false)
            .unwrap();
        assert_eq!(alloc.stats().allocations, 2);
        assert_eq!(alloc.stats().bytes, 80);
    }
}
