//! Shared helper functions for kernels

use crate::tensor::Tensor;

/// Ensure a tensor is contiguous in memory.
///
/// If the tensor is already contiguous, returns a clone (zero-copy, just
/// increments the storage refcount). Otherwise, creates a row-major copy of
/// the strided view.
///
/// # Example
///
/// ```
/// use ndgrad::runtime::ensure_contiguous;
/// use ndgrad::tensor::Tensor;
///
/// let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// let b = a.transpose(0, 1).unwrap();
/// let c = ensure_contiguous(&b);
/// assert!(c.is_contiguous());
/// assert_eq!(c.to_vec::<f64>().unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
/// ```
#[inline]
pub fn ensure_contiguous(tensor: &Tensor) -> Tensor {
    if tensor.is_contiguous() {
        tensor.clone()
    } else {
        tensor.contiguous()
    }
}
