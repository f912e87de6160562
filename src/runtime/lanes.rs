//! Fixed-width numeric lanes
//!
//! `Lanes<T>` is a batch of `LANES` scalars with elementwise arithmetic and
//! transcendental primitives. Elementwise kernels are written against lanes so
//! that each kernel body handles a whole batch; the compiler vectorizes the
//! fixed-size loops.

use crate::dtype::Element;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Number of scalars in one lane batch
pub const LANES: usize = 8;

/// A batch of `LANES` scalars
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lanes<T>(pub [T; LANES]);

impl<T: Element> Lanes<T> {
    /// All lanes set to `v`
    #[inline]
    pub fn splat(v: T) -> Self {
        Self([v; LANES])
    }

    /// All lanes zero
    #[inline]
    pub fn zero() -> Self {
        Self::splat(T::zero())
    }

    /// Load up to `LANES` values; missing tail lanes are zero
    #[inline]
    pub fn load(src: &[T]) -> Self {
        let mut out = [T::zero(); LANES];
        let n = src.len().min(LANES);
        out[..n].copy_from_slice(&src[..n]);
        Self(out)
    }

    /// Store the first `dst.len()` lanes (at most `LANES`)
    #[inline]
    pub fn store(self, dst: &mut [T]) {
        let n = dst.len().min(LANES);
        dst[..n].copy_from_slice(&self.0[..n]);
    }

    /// Apply `f` to every lane
    #[inline]
    pub fn map(self, f: impl Fn(T) -> T) -> Self {
        let mut out = self.0;
        for v in out.iter_mut() {
            *v = f(*v);
        }
        Self(out)
    }

    /// Apply `f` lane-wise to `self` and `other`
    #[inline]
    pub fn zip_map(self, other: Self, f: impl Fn(T, T) -> T) -> Self {
        let mut out = self.0;
        for (v, o) in out.iter_mut().zip(other.0) {
            *v = f(*v, o);
        }
        Self(out)
    }

    /// Lane-wise `exp`
    #[inline]
    pub fn exp(self) -> Self {
        self.map(T::exp)
    }

    /// Lane-wise `ln`
    #[inline]
    pub fn ln(self) -> Self {
        self.map(T::ln)
    }

    /// Lane-wise `sin`
    #[inline]
    pub fn sin(self) -> Self {
        self.map(T::sin)
    }

    /// Lane-wise `cos`
    #[inline]
    pub fn cos(self) -> Self {
        self.map(T::cos)
    }

    /// Lane-wise `sinh`
    #[inline]
    pub fn sinh(self) -> Self {
        self.map(T::sinh)
    }

    /// Lane-wise `cosh`
    #[inline]
    pub fn cosh(self) -> Self {
        self.map(T::cosh)
    }

    /// Lane-wise `tanh`
    #[inline]
    pub fn tanh(self) -> Self {
        self.map(T::tanh)
    }

    /// Lane-wise `atan`
    #[inline]
    pub fn atan(self) -> Self {
        self.map(T::atan)
    }

    /// Lane-wise `sqrt`
    #[inline]
    pub fn sqrt(self) -> Self {
        self.map(T::sqrt)
    }

    /// Lane-wise `abs`
    #[inline]
    pub fn abs(self) -> Self {
        self.map(T::abs)
    }

    /// Lane-wise `recip`
    #[inline]
    pub fn recip(self) -> Self {
        self.map(T::recip)
    }

    /// Lane-wise `atan2(self, x)`
    #[inline]
    pub fn atan2(self, x: Self) -> Self {
        self.zip_map(x, T::atan2)
    }

    /// Lane-wise `sqrt(self^2 + other^2)` without undue overflow
    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        self.zip_map(other, T::hypot)
    }

    /// `self` with the sign bit of `sign`, so `-0.0` counts as negative
    #[inline]
    pub fn with_sign_of(self, sign: Self) -> Self {
        self.zip_map(sign, |v, s| if s.is_sign_negative() { -v.abs() } else { v.abs() })
    }
}

macro_rules! impl_lane_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T: Element> $trait for Lanes<T> {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.zip_map(rhs, |a, b| a $op b)
            }
        }
    };
}

impl_lane_binop!(Add, add, +);
impl_lane_binop!(Sub, sub, -);
impl_lane_binop!(Mul, mul, *);
impl_lane_binop!(Div, div, /);

impl<T: Element> Neg for Lanes<T> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}

/// Drive `f` over `input` in lane batches, writing `out`
///
/// `input` and `out` must have equal length; the final partial batch is
/// padded with zeros and only its live lanes are stored.
pub fn map_lanes<T: Element>(input: &[T], out: &mut [T], f: impl Fn(Lanes<T>) -> Lanes<T>) {
    debug_assert_eq!(input.len(), out.len());
    for (src, dst) in input.chunks(LANES).zip(out.chunks_mut(LANES)) {
        f(Lanes::load(src)).store(dst);
    }
}

/// Drive a lane-pair kernel over real and imaginary inputs
pub fn map_lane_pairs<T: Element>(
    re: &[T],
    im: &[T],
    out_re: &mut [T],
    out_im: &mut [T],
    f: impl Fn(Lanes<T>, Lanes<T>) -> (Lanes<T>, Lanes<T>),
) {
    debug_assert_eq!(re.len(), out_re.len());
    for (((r, i), or), oi) in re
        .chunks(LANES)
        .zip(im.chunks(LANES))
        .zip(out_re.chunks_mut(LANES))
        .zip(out_im.chunks_mut(LANES))
    {
        let (a, b) = f(Lanes::load(r), Lanes::load(i));
        a.store(or);
        b.store(oi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_pads_and_store_truncates() {
        let l = Lanes::load(&[1.0f64, 2.0, 3.0]);
        assert_eq!(l.0[2], 3.0);
        assert_eq!(l.0[3], 0.0);

        let mut out = [0.0f64; 3];
        (l + Lanes::splat(1.0)).store(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_map_lanes_covers_tail() {
        let input: Vec<f32> = (0..19).map(|i| i as f32).collect();
        let mut out = vec![0.0f32; 19];
        map_lanes(&input, &mut out, |x| x * x);
        assert_eq!(out[18], 324.0);
        assert_eq!(out[9], 81.0);
    }

    #[test]
    fn test_with_sign_of() {
        let v = Lanes::splat(2.0f64).with_sign_of(Lanes::load(&[-1.0, 0.0, -0.0]));
        assert_eq!(v.0[0], -2.0);
        assert_eq!(v.0[1], 2.0);
        assert_eq!(v.0[2], -2.0);
    }
}
