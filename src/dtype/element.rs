//! Element trait for mapping Rust types to DType

use super::DType;
use crate::tensor::Plane;
use num_traits::Float;
use std::fmt::Debug;

/// Trait for types that can be elements of an array plane
///
/// This trait connects Rust's type system to the runtime dtype carried by
/// every buffer. Kernels are written once, generic over `T: Element`, and
/// instantiated for each dtype by `dispatch_dtype!`.
///
/// # Bounds
/// - `Float` - transcendental primitives used by the lane kernels
/// - `Send + Sync + 'static` - buffers are shared across worker threads
pub trait Element: Float + Default + Debug + Send + Sync + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Borrow a plane as a slice of this type, if the dtypes agree
    fn slice(plane: &Plane) -> Option<&[Self]>;

    /// Mutably borrow a plane as a slice of this type, if the dtypes agree
    fn slice_mut(plane: &mut Plane) -> Option<&mut [Self]>;

    /// Wrap a vector of this type into a plane
    fn into_plane(data: Vec<Self>) -> Plane;

    /// Convert from f64 (rounding for narrower types)
    fn from_f64(v: f64) -> Self;

    /// Convert to f64
    fn as_f64(self) -> f64;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn slice(plane: &Plane) -> Option<&[Self]> {
        match plane {
            Plane::F64(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(plane: &mut Plane) -> Option<&mut [Self]> {
        match plane {
            Plane::F64(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn into_plane(data: Vec<Self>) -> Plane {
        Plane::F64(data)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn slice(plane: &Plane) -> Option<&[Self]> {
        match plane {
            Plane::F32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(plane: &mut Plane) -> Option<&mut [Self]> {
        match plane {
            Plane::F32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn into_plane(data: Vec<Self>) -> Plane {
        Plane::F32(data)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// Runs `$body` with `$T` bound to the Rust type of `$dtype`
#[macro_export]
#[doc(hidden)]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_roundtrip_by_type() {
        let plane = f32::into_plane(vec![1.0, 2.0]);
        assert_eq!(f32::slice(&plane), Some(&[1.0f32, 2.0][..]));
        assert!(f64::slice(&plane).is_none());
    }

    #[test]
    fn test_dispatch_dtype_binds_type() {
        let size = dispatch_dtype!(DType::F32, T => { std::mem::size_of::<T>() });
        assert_eq!(size, 4);
    }
}
