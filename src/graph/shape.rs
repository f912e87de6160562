//! ArrayShape: the immutable output descriptor produced by shape inference

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensor::{Layout, Shape, Strides, contiguous_strides};
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Scalar parameter attached to a node
///
/// Floats compare and hash by bit pattern so shapes can key a hash map.
#[derive(Copy, Clone, Debug)]
pub enum Param {
    /// Integer parameter (stride, padding, axis, ...)
    Int(i64),
    /// Floating-point parameter (scalar operand of `add_scalar`, ...)
    Float(f64),
}

impl Param {
    /// Integer value, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Param::Int(v) => Some(v),
            Param::Float(_) => None,
        }
    }

    /// Float value; integers are widened
    pub fn as_float(&self) -> f64 {
        match *self {
            Param::Int(v) => v as f64,
            Param::Float(v) => v,
        }
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Param::Int(a), Param::Int(b)) => a == b,
            (Param::Float(a), Param::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Param {}

impl Hash for Param {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match *self {
            Param::Int(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Param::Float(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<usize> for Param {
    fn from(v: usize) -> Self {
        Param::Int(v as i64)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

/// Ordered parameter list
pub type Params = SmallVec<[Param; 4]>;

/// Output geometry of one node
///
/// Built once by shape inference and shared as `Arc<ArrayShape>` afterwards.
/// The harness fills `op_name`, `params`, `dtype` and `complex` before
/// inference runs; the operation fills `dims` and `strides`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayShape {
    dims: Shape,
    strides: Strides,
    params: Params,
    op_name: &'static str,
    dtype: DType,
    complex: bool,
}

impl ArrayShape {
    /// Shape handle pre-filled for inference; dims are empty until set
    pub fn new(op_name: &'static str, dtype: DType, complex: bool, params: &[Param]) -> Self {
        Self {
            dims: SmallVec::new(),
            strides: SmallVec::new(),
            params: params.iter().copied().collect(),
            op_name,
            dtype,
            complex,
        }
    }

    /// Plain contiguous shape, used as a parameter-only pseudo-operand
    ///
    /// # Example
    /// ```
    /// use ndgrad::graph::ArrayShape;
    /// let s = ArrayShape::from_dims(&[2, 3]);
    /// assert_eq!(s.strides(), &[3, 1]);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Self {
        let mut shape = Self::new("shape", DType::default(), false, &[]);
        shape.set_contiguous(dims);
        shape
    }

    /// Set row-major dims and strides
    pub fn set_contiguous(&mut self, dims: &[usize]) {
        self.dims = dims.iter().copied().collect();
        self.strides = contiguous_strides(dims);
    }

    /// Set dims with an explicit (possibly non-contiguous) stride vector
    pub fn set_strided(&mut self, dims: &[usize], strides: &[isize]) -> Result<()> {
        if dims.len() != strides.len() {
            return Err(Error::shape_mismatch(
                self.op_name,
                format!("{} strides for {} dims", strides.len(), dims.len()),
            ));
        }
        if strides.iter().any(|&s| s < 0) {
            return Err(Error::shape_mismatch(
                self.op_name,
                format!("negative strides {strides:?}"),
            ));
        }
        self.dims = dims.iter().copied().collect();
        self.strides = strides.iter().copied().collect();
        Ok(())
    }

    /// Dimension sizes
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Element strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Operation parameters
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Name of the producing operation
    #[inline]
    pub fn op_name(&self) -> &'static str {
        self.op_name
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// True if the node carries an imaginary plane
    #[inline]
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Rank
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Integer parameter at `index`
    pub fn param_int(&self, index: usize) -> Result<i64> {
        self.params
            .get(index)
            .and_then(Param::as_int)
            .ok_or_else(|| {
                Error::execution(
                    self.op_name,
                    format!("missing integer parameter #{index} in {:?}", self.params),
                )
            })
    }

    /// Float parameter at `index`
    pub fn param_float(&self, index: usize) -> Result<f64> {
        self.params.get(index).map(Param::as_float).ok_or_else(|| {
            Error::execution(
                self.op_name,
                format!("missing parameter #{index} in {:?}", self.params),
            )
        })
    }

    /// Buffer layout described by dims and strides
    pub fn layout(&self) -> Layout {
        Layout::new(self.dims.clone(), self.strides.clone(), 0)
    }

    /// True if the strides are row-major for the dims
    pub fn is_contiguous(&self) -> bool {
        self.layout().is_contiguous()
    }

    /// Geometry-only key, ignoring which op produced the shape
    pub(crate) fn geometry(&self, pseudo: bool) -> OperandKey {
        OperandKey {
            pseudo,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            dtype: self.dtype,
            complex: self.complex,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dims.len() != self.strides.len() {
            return Err(Error::Internal(format!(
                "'{}' produced {} dims but {} strides",
                self.op_name,
                self.dims.len(),
                self.strides.len()
            )));
        }
        if self.strides.iter().any(|&s| s < 0) {
            return Err(Error::Internal(format!(
                "'{}' produced negative strides {:?}",
                self.op_name, self.strides
            )));
        }
        Ok(())
    }
}

/// Geometry of one operand inside a shape-cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OperandKey {
    pseudo: bool,
    dims: Shape,
    strides: Strides,
    dtype: DType,
    complex: bool,
}

/// Memoization key for shape inference: op identity, operand geometry, params
///
/// `op` is the address of the shared operation object, so two distinct
/// operations never share cache entries even if their names collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ShapeKey {
    pub(crate) op: usize,
    pub(crate) operands: SmallVec<[OperandKey; 3]>,
    pub(crate) params: Params,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_float_params_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(Param::Float(0.5));
        assert!(set.contains(&Param::Float(0.5)));
        assert!(!set.contains(&Param::Float(-0.5)));
        assert_ne!(Param::Int(1), Param::Float(1.0));
    }

    #[test]
    fn test_set_strided_validates() {
        let mut s = ArrayShape::new("transpose", DType::F64, false, &[]);
        assert!(s.set_strided(&[3, 2], &[1]).unwrap_err().is_shape_mismatch());
        s.set_strided(&[3, 2], &[1, 3]).unwrap();
        assert!(!s.is_contiguous());
        assert_eq!(s.numel(), 6);
    }

    #[test]
    fn test_param_accessors() {
        let s = ArrayShape::new("conv1d", DType::F32, false, &[Param::Int(2), Param::Float(0.25)]);
        assert_eq!(s.param_int(0).unwrap(), 2);
        assert!(s.param_int(1).is_err());
        assert_eq!(s.param_float(1).unwrap(), 0.25);
        assert!(s.param_float(4).is_err());
    }
}
