//! Data type system for ndgrad arrays
//!
//! `DType` names the scalar type of a buffer plane. Complex arrays are not a
//! separate dtype: they carry a second (imaginary) plane of the same dtype,
//! so a complex `F64` array is two `f64` planes.

mod element;

pub use element::Element;

use crate::error::{Error, Result};
use std::fmt;

/// Scalar types supported by ndgrad buffers
///
/// The discriminant values are stable: F64=0, F32=1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    #[default]
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
}

impl DType {
    /// Size of one scalar of this type in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DType::F64 => 8,
            DType::F32 => 4,
        }
    }

    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            DType::F64 => "f64",
            DType::F32 => "f32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result dtype of combining two operands
///
/// ndgrad never casts implicitly, so both sides must agree.
pub fn promote(lhs: DType, rhs: DType) -> Result<DType> {
    if lhs == rhs {
        Ok(lhs)
    } else {
        Err(Error::DTypeMismatch { lhs, rhs })
    }
}
