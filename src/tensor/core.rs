//! Core Tensor type

use super::{Layout, Plane, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::tensor::layout::{Shape, Strides};
use std::fmt;
use std::sync::Arc;

/// Materialized n-dimensional buffer
///
/// `Tensor` is the data half of a graph node. It consists of:
/// - **Storage**: reference-counted real plane plus optional imaginary plane
/// - **Layout**: shape, strides, and offset defining the view into storage
///
/// Views (`transpose`) share storage; writes go through `Arc::make_mut`, so a
/// shared buffer is copied before it is modified.
#[derive(Clone)]
pub struct Tensor {
    storage: Arc<Storage>,
    layout: Layout,
}

impl Tensor {
    /// Create a tensor from storage and layout
    ///
    /// Fails if the layout has negative strides or addresses past the end of
    /// the planes.
    pub fn from_parts(storage: Storage, layout: Layout) -> Result<Self> {
        if layout.has_negative_strides() {
            return Err(Error::invalid_argument(
                "strides",
                format!("negative strides are not supported: {:?}", layout.strides()),
            ));
        }
        let span = layout.storage_span();
        if span > storage.len() {
            return Err(Error::invalid_argument(
                "strides",
                format!(
                    "layout addresses {} elements but storage holds {}",
                    span,
                    storage.len()
                ),
            ));
        }
        Ok(Self {
            storage: Arc::new(storage),
            layout,
        })
    }

    /// Create a contiguous real tensor from a slice of data
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::tensor::Tensor;
    /// let t = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// assert_eq!(t.shape(), &[2, 2]);
    /// ```
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        check_len("data", data.len(), shape)?;
        Self::from_parts(
            Storage::real(T::into_plane(data.to_vec())),
            Layout::contiguous(shape),
        )
    }

    /// Create a contiguous complex tensor from real and imaginary parts
    pub fn from_complex<T: Element>(re: &[T], im: &[T], shape: &[usize]) -> Result<Self> {
        check_len("re", re.len(), shape)?;
        check_len("im", im.len(), shape)?;
        let storage = Storage::complex(T::into_plane(re.to_vec()), T::into_plane(im.to_vec()))?;
        Self::from_parts(storage, Layout::contiguous(shape))
    }

    /// Create a real tensor viewing `data` through explicit strides and offset
    pub fn from_strided<T: Element>(
        data: &[T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(Error::invalid_argument(
                "strides",
                format!("{} strides for {} dimensions", strides.len(), shape.len()),
            ));
        }
        let layout = Layout::new(
            shape.iter().copied().collect::<Shape>(),
            strides.iter().copied().collect::<Strides>(),
            offset,
        );
        Self::from_parts(Storage::real(T::into_plane(data.to_vec())), layout)
    }

    /// Zero-filled tensor over `layout`
    ///
    /// The planes are sized to the layout's storage span, so a strided
    /// layout gets exactly the buffer it addresses.
    pub fn zeroed(layout: Layout, dtype: DType, complex: bool) -> Result<Self> {
        let span = layout.storage_span();
        Self::from_parts(Storage::zeros(dtype, span, complex), layout)
    }

    /// Contiguous real tensor filled with `value`
    pub fn full(shape: &[usize], dtype: DType, value: f64) -> Result<Self> {
        let len: usize = shape.iter().product();
        let plane = crate::dispatch_dtype!(dtype, T => {
            T::into_plane(vec![T::from_f64(value); len])
        });
        Self::from_parts(Storage::real(plane), Layout::contiguous(shape))
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Get the number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Get the total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// True if the tensor carries an imaginary plane
    #[inline]
    pub fn is_complex(&self) -> bool {
        self.storage.is_complex()
    }

    /// Check if the tensor is contiguous in memory
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Real plane as a typed slice (raw storage order)
    pub fn re<T: Element>(&self) -> Result<&[T]> {
        self.storage.re().as_slice()
    }

    /// Imaginary plane as a typed slice, if complex
    pub fn im<T: Element>(&self) -> Result<Option<&[T]>> {
        self.storage.im().map(Plane::as_slice).transpose()
    }

    /// Mutable real plane
    pub fn re_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        Arc::make_mut(&mut self.storage).planes_mut().0.as_mut_slice()
    }

    /// Both planes mutably
    pub fn planes_mut<T: Element>(&mut self) -> Result<(&mut [T], Option<&mut [T]>)> {
        let (re, im) = Arc::make_mut(&mut self.storage).planes_mut();
        let re = re.as_mut_slice()?;
        let im = im.map(Plane::as_mut_slice).transpose()?;
        Ok((re, im))
    }

    // ===== Views and copies =====

    /// Transpose two dimensions (zero-copy)
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let layout = self.layout.transpose(dim0, dim1).ok_or_else(|| {
            Error::invalid_argument(
                "dim",
                format!("transpose({dim0}, {dim1}) on rank {}", self.ndim()),
            )
        })?;
        Ok(Self {
            storage: Arc::clone(&self.storage),
            layout,
        })
    }

    /// Row-major copy with fresh storage
    pub fn contiguous(&self) -> Self {
        let re = self.storage.re().gather(self.layout.offsets());
        let im = self.storage.im().map(|p| p.gather(self.layout.offsets()));
        Self {
            storage: Arc::new(Storage::from_planes(re, im)),
            layout: Layout::contiguous(self.shape()),
        }
    }

    /// Real parts in logical row-major order
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let re = self.re::<T>()?;
        Ok(self.layout.offsets().map(|o| re[o]).collect())
    }

    /// Imaginary parts in logical row-major order (zeros for a real tensor)
    pub fn imag_to_vec<T: Element>(&self) -> Result<Vec<T>> {
        match self.im::<T>()? {
            Some(im) => Ok(self.layout.offsets().map(|o| im[o]).collect()),
            None => Ok(vec![T::zero(); self.numel()]),
        }
    }

    /// Real parts widened to f64, whatever the dtype
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let plane = self.storage.re();
        crate::dispatch_dtype!(plane.dtype(), T => {
            match T::slice(plane) {
                Some(re) => self.layout.offsets().map(|o| re[o].as_f64()).collect(),
                None => Vec::new(),
            }
        })
    }

    /// Imaginary parts widened to f64 (zeros for a real tensor)
    pub fn imag_to_f64_vec(&self) -> Vec<f64> {
        match self.storage.im() {
            Some(plane) => crate::dispatch_dtype!(plane.dtype(), T => {
                match T::slice(plane) {
                    Some(im) => self.layout.offsets().map(|o| im[o].as_f64()).collect(),
                    None => Vec::new(),
                }
            }),
            None => vec![0.0; self.numel()],
        }
    }
}

fn check_len(arg: &'static str, len: usize, shape: &[usize]) -> Result<()> {
    let expected: usize = shape.iter().product();
    if len != expected {
        return Err(Error::invalid_argument(
            arg,
            format!("{len} elements for shape {shape:?} ({expected} expected)"),
        ));
    }
    Ok(())
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("dtype", &self.dtype())
            .field("complex", &self.is_complex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_checks_len() {
        assert!(Tensor::from_slice(&[1.0f64, 2.0, 3.0], &[2, 2]).is_err());
        let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.is_contiguous());
        assert!(!t.is_complex());
    }

    #[test]
    fn test_strided_view_reads_logical_order() {
        // every other element of a length-6 buffer
        let t = Tensor::from_strided(&[0.0f64, 1.0, 2.0, 3.0, 4.0, 5.0], &[3], &[2], 0).unwrap();
        assert!(!t.is_contiguous());
        assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0, 2.0, 4.0]);

        let c = t.contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c.re::<f64>().unwrap(), &[0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_strided_rejects_out_of_bounds_and_negative() {
        assert!(Tensor::from_strided(&[0.0f64; 4], &[3], &[2], 0).is_err());
        assert!(Tensor::from_strided(&[0.0f64; 4], &[2], &[-1], 1).is_err());
    }

    #[test]
    fn test_transpose_view_shares_storage() {
        let t = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let tt = t.transpose(0, 1).unwrap();
        assert_eq!(tt.shape(), &[3, 2]);
        assert_eq!(tt.to_vec::<f64>().unwrap(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert!(t.transpose(0, 2).is_err());
    }

    #[test]
    fn test_complex_accessors() {
        let t = Tensor::from_complex(&[1.0f64, 2.0], &[3.0, 4.0], &[2]).unwrap();
        assert!(t.is_complex());
        assert_eq!(t.imag_to_vec::<f64>().unwrap(), vec![3.0, 4.0]);

        let r = Tensor::from_slice(&[1.0f64, 2.0], &[2]).unwrap();
        assert_eq!(r.imag_to_f64_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_write_through_shared_storage_copies() {
        let a = Tensor::from_slice(&[1.0f64, 2.0], &[2]).unwrap();
        let mut b = a.clone();
        b.re_mut::<f64>().unwrap()[0] = 9.0;
        assert_eq!(a.to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
        assert_eq!(b.to_vec::<f64>().unwrap(), vec![9.0, 2.0]);
    }
}
