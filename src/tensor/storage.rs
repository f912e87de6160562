//! Storage: typed real and imaginary buffer planes

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

/// One typed, dense buffer
///
/// A plane is the unit the allocator hands out. Complex storage is two planes
/// of the same dtype and length.
#[derive(Clone, Debug, PartialEq)]
pub enum Plane {
    /// 32-bit float buffer
    F32(Vec<f32>),
    /// 64-bit float buffer
    F64(Vec<f64>),
}

impl Plane {
    /// Zero-filled plane of `len` elements
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Plane::F32(vec![0.0; len]),
            DType::F64 => Plane::F64(vec![0.0; len]),
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Plane::F32(v) => v.len(),
            Plane::F64(v) => v.len(),
        }
    }

    /// True if the plane holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the plane
    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            Plane::F32(_) => DType::F32,
            Plane::F64(_) => DType::F64,
        }
    }

    /// Size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype().size_in_bytes()
    }

    /// Copy the elements at `offsets` into a new dense plane
    pub fn gather(&self, offsets: impl Iterator<Item = usize>) -> Self {
        match self {
            Plane::F32(v) => Plane::F32(offsets.map(|o| v[o]).collect()),
            Plane::F64(v) => Plane::F64(offsets.map(|o| v[o]).collect()),
        }
    }

    /// Borrow as a typed slice
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(self).ok_or(Error::DTypeMismatch {
            lhs: T::DTYPE,
            rhs: self.dtype(),
        })
    }

    /// Mutably borrow as a typed slice
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        let dtype = self.dtype();
        T::slice_mut(self).ok_or(Error::DTypeMismatch {
            lhs: T::DTYPE,
            rhs: dtype,
        })
    }
}

/// Real plane plus an optional imaginary plane of identical dtype and length
///
/// A buffer is complex iff the imaginary plane is present.
#[derive(Clone, Debug, PartialEq)]
pub struct Storage {
    re: Plane,
    im: Option<Plane>,
}

impl Storage {
    /// Real-only storage
    pub fn real(re: Plane) -> Self {
        Self { re, im: None }
    }

    /// Complex storage; planes must agree in dtype and length
    pub fn complex(re: Plane, im: Plane) -> Result<Self> {
        if re.dtype() != im.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: re.dtype(),
                rhs: im.dtype(),
            });
        }
        if re.len() != im.len() {
            return Err(Error::invalid_argument(
                "im",
                format!("imaginary plane has {} elements, real plane {}", im.len(), re.len()),
            ));
        }
        Ok(Self { re, im: Some(im) })
    }

    /// Storage from planes already known to agree in dtype and length
    pub(crate) fn from_planes(re: Plane, im: Option<Plane>) -> Self {
        debug_assert!(im.as_ref().is_none_or(|p| p.len() == re.len()));
        Self { re, im }
    }

    /// Zero-filled storage
    pub fn zeros(dtype: DType, len: usize, complex: bool) -> Self {
        Self {
            re: Plane::zeros(dtype, len),
            im: complex.then(|| Plane::zeros(dtype, len)),
        }
    }

    /// Element count of each plane
    #[inline]
    pub fn len(&self) -> usize {
        self.re.len()
    }

    /// True if the planes hold no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.re.dtype()
    }

    /// True if an imaginary plane is present
    #[inline]
    pub fn is_complex(&self) -> bool {
        self.im.is_some()
    }

    /// Total bytes across both planes
    pub fn size_in_bytes(&self) -> usize {
        self.re.size_in_bytes() + self.im.as_ref().map_or(0, Plane::size_in_bytes)
    }

    /// Real plane
    #[inline]
    pub fn re(&self) -> &Plane {
        &self.re
    }

    /// Imaginary plane, if complex
    #[inline]
    pub fn im(&self) -> Option<&Plane> {
        self.im.as_ref()
    }

    /// Both planes mutably
    #[inline]
    pub fn planes_mut(&mut self) -> (&mut Plane, Option<&mut Plane>) {
        (&mut self.re, self.im.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_zeros_and_bytes() {
        let p = Plane::zeros(DType::F32, 6);
        assert_eq!(p.len(), 6);
        assert_eq!(p.size_in_bytes(), 24);
        assert_eq!(p.as_slice::<f32>().unwrap(), &[0.0; 6]);
        assert!(p.as_slice::<f64>().is_err());
    }

    #[test]
    fn test_plane_gather() {
        let p = Plane::F64(vec![0.0, 1.0, 2.0, 3.0]);
        let g = p.gather([3, 1, 1].into_iter());
        assert_eq!(g, Plane::F64(vec![3.0, 1.0, 1.0]));
    }

    #[test]
    fn test_complex_storage_validates_planes() {
        let s = Storage::complex(Plane::F64(vec![1.0]), Plane::F64(vec![2.0])).unwrap();
        assert!(s.is_complex());
        assert_eq!(s.size_in_bytes(), 16);

        assert!(Storage::complex(Plane::F64(vec![1.0]), Plane::F32(vec![2.0])).is_err());
        assert!(Storage::complex(Plane::F64(vec![1.0]), Plane::F64(vec![])).is_err());
    }
}
