//! Layout: shape, strides, and offset for array memory layout

use smallvec::SmallVec;
use std::fmt;

/// Stack allocation threshold for dimensions
/// Most arrays have 4 or fewer dimensions, so we stack-allocate up to 4
const STACK_DIMS: usize = 4;

/// Shape type: dimensions of an array
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Strides type: element offsets between consecutive elements along each dimension
/// NOTE: Strides are in ELEMENTS, not bytes
pub type Strides = SmallVec<[isize; STACK_DIMS]>;

/// Layout describes how logical indices map onto a buffer plane
///
/// Address of element at indices [i0, i1, ..., in]:
///   offset + i0 * strides[0] + i1 * strides[1] + ... + in * strides[n]
///
/// A stride of 0 repeats the same element along that dimension (broadcast).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Create a new contiguous (row-major/C-order) layout from a shape
    ///
    /// # Example
    /// ```
    /// use ndgrad::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.shape(), &[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        let shape: Shape = shape.iter().copied().collect();
        let strides = contiguous_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a layout with explicit shape, strides, and offset
    pub fn new(shape: Shape, strides: Strides, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            shape,
            strides,
            offset,
        }
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Get the offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if memory is contiguous (row-major order)
    ///
    /// Dimensions of size 1 never move the address, so their stride is ignored.
    pub fn is_contiguous(&self) -> bool {
        if self.offset != 0 {
            return false;
        }
        let mut expected = 1isize;
        for (&dim, &stride) in self.shape.iter().zip(self.strides.iter()).rev() {
            if dim == 0 {
                return true;
            }
            if dim != 1 && stride != expected {
                return false;
            }
            expected *= dim as isize;
        }
        true
    }

    /// True if any stride is negative
    pub fn has_negative_strides(&self) -> bool {
        self.strides.iter().any(|&s| s < 0)
    }

    /// Minimal plane length this layout addresses
    ///
    /// Assumes non-negative strides.
    pub fn storage_span(&self) -> usize {
        if self.elem_count() == 0 {
            return 0;
        }
        let last: isize = self
            .shape
            .iter()
            .zip(self.strides.iter())
            .map(|(&d, &s)| (d as isize - 1) * s)
            .sum();
        self.offset + last as usize + 1
    }

    /// Create a transposed layout (swap two dimensions)
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Option<Self> {
        if dim0 >= self.ndim() || dim1 >= self.ndim() {
            return None;
        }

        let mut new_shape = self.shape.clone();
        let mut new_strides = self.strides.clone();

        new_shape.swap(dim0, dim1);
        new_strides.swap(dim0, dim1);

        Some(Self {
            shape: new_shape,
            strides: new_strides,
            offset: self.offset,
        })
    }

    /// Create a broadcast layout that reads this layout as `target` dims
    ///
    /// Follows NumPy rules: dimensions are aligned from the right, and a
    /// source dimension must either match or be 1. Expanded dimensions get
    /// stride 0. Returns None if the shapes are not broadcast-compatible.
    pub fn broadcast_to(&self, target: &[usize]) -> Option<Self> {
        if target.len() < self.ndim() {
            return None;
        }
        let lead = target.len() - self.ndim();
        let mut strides: Strides = SmallVec::with_capacity(target.len());
        for (i, &t) in target.iter().enumerate() {
            if i < lead {
                strides.push(0);
                continue;
            }
            let src = self.shape[i - lead];
            let stride = self.strides[i - lead];
            if src == t {
                strides.push(stride);
            } else if src == 1 {
                strides.push(0);
            } else {
                return None;
            }
        }
        Some(Self {
            shape: target.iter().copied().collect(),
            strides,
            offset: self.offset,
        })
    }

    /// Storage offsets in row-major logical order
    pub fn offsets(&self) -> Offsets<'_> {
        self.offsets_from(0)
    }

    /// Storage offsets in row-major logical order, starting at logical element `start`
    pub fn offsets_from(&self, start: usize) -> Offsets<'_> {
        let count = self.elem_count();
        let start = start.min(count);
        let mut index: Shape = SmallVec::from_elem(0, self.ndim());
        let mut rem = start;
        let mut current = self.offset as isize;
        for d in (0..self.ndim()).rev() {
            let dim = self.shape[d];
            if dim == 0 {
                break;
            }
            index[d] = rem % dim;
            rem /= dim;
            current += index[d] as isize * self.strides[d];
        }
        Offsets {
            layout: self,
            index,
            current,
            remaining: count - start,
        }
    }
}

/// Compute contiguous strides for a given shape (row-major order)
pub fn contiguous_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0, shape.len());
    let mut stride = 1isize;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[i] = stride;
        stride *= dim.max(1) as isize;
    }
    strides
}

/// Broadcast two shapes together (NumPy rules)
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Option<Shape> {
    let ndim = lhs.len().max(rhs.len());
    let mut out: Shape = SmallVec::from_elem(0, ndim);
    for i in 0..ndim {
        let l = if i < ndim - lhs.len() { 1 } else { lhs[i + lhs.len() - ndim] };
        let r = if i < ndim - rhs.len() { 1 } else { rhs[i + rhs.len() - ndim] };
        out[i] = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => return None,
        };
    }
    Some(out)
}

/// Iterator over the storage offsets of a layout
///
/// Walks logical indices in row-major order and yields the buffer offset of
/// each one, carrying the address incrementally instead of recomputing it.
pub struct Offsets<'a> {
    layout: &'a Layout,
    index: Shape,
    current: isize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current as usize;
        self.remaining -= 1;
        if self.remaining > 0 {
            let shape = self.layout.shape();
            let strides = self.layout.strides();
            for d in (0..shape.len()).rev() {
                self.index[d] += 1;
                self.current += strides[d];
                if self.index[d] < shape[d] {
                    break;
                }
                self.current -= strides[d] * shape[d] as isize;
                self.index[d] = 0;
            }
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("shape", &self.shape.as_slice())
            .field("strides", &self.strides.as_slice())
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_layout() {
        let layout = Layout::contiguous(&[2, 3, 4]);
        assert_eq!(layout.strides(), &[12, 4, 1]);
        assert!(layout.is_contiguous());
        assert_eq!(layout.elem_count(), 24);
        assert_eq!(layout.storage_span(), 24);
    }

    #[test]
    fn test_transpose_is_not_contiguous() {
        let layout = Layout::contiguous(&[2, 3]).transpose(0, 1).unwrap();
        assert_eq!(layout.shape(), &[3, 2]);
        assert_eq!(layout.strides(), &[1, 3]);
        assert!(!layout.is_contiguous());
        assert_eq!(layout.storage_span(), 6);

        let offsets: Vec<usize> = layout.offsets().collect();
        assert_eq!(offsets, vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_offsets_from_middle() {
        let layout = Layout::contiguous(&[2, 3]).transpose(0, 1).unwrap();
        let offsets: Vec<usize> = layout.offsets_from(3).collect();
        assert_eq!(offsets, vec![4, 2, 5]);
    }

    #[test]
    fn test_broadcast_layout() {
        let layout = Layout::contiguous(&[3, 1]);
        let b = layout.broadcast_to(&[2, 3, 4]).unwrap();
        assert_eq!(b.strides(), &[0, 1, 0]);
        assert!(layout.broadcast_to(&[2, 4]).is_none());
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 1, 4], &[3, 1]).unwrap().as_slice(), &[2, 3, 4]);
        assert_eq!(broadcast_shapes(&[], &[5]).unwrap().as_slice(), &[5]);
        assert!(broadcast_shapes(&[2, 3], &[4]).is_none());
    }

    #[test]
    fn test_scalar_layout_yields_one_offset() {
        let layout = Layout::contiguous(&[]);
        assert_eq!(layout.offsets().collect::<Vec<_>>(), vec![0]);
        assert_eq!(layout.storage_span(), 1);
    }
}
