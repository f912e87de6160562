//! Lane kernels and chain rules of the built-in unary functions

use super::UnaryKernel;
use crate::dtype::Element;
use crate::error::Result;
use crate::graph::Array;
use crate::runtime::Lanes;

/// `-x`
pub struct NegKernel;

impl UnaryKernel for NegKernel {
    const NAME: &'static str = "neg";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        -x
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (-re, -im)
    }

    fn chain(&self, _x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.neg()
    }
}

/// `e^x`
pub struct ExpKernel;

impl UnaryKernel for ExpKernel {
    const NAME: &'static str = "exp";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.exp()
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        let r = re.exp();
        (r * im.cos(), r * im.sin())
    }

    // d/dx e^x = y
    fn chain(&self, _x: &Array, y: &Array, v: &Array) -> Result<Array> {
        v.mul(y)
    }
}

/// `ln x`
pub struct LogKernel;

impl UnaryKernel for LogKernel {
    const NAME: &'static str = "log";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.ln()
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (re.hypot(im).ln(), im.atan2(re))
    }

    fn chain(&self, x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.div(x)
    }
}

/// `sin x`
pub struct SinKernel;

impl UnaryKernel for SinKernel {
    const NAME: &'static str = "sin";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.sin()
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (re.sin() * im.cosh(), re.cos() * im.sinh())
    }

    fn chain(&self, x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.mul(&x.cos()?)
    }
}

/// `cos x`
pub struct CosKernel;

impl UnaryKernel for CosKernel {
    const NAME: &'static str = "cos";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.cos()
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (re.cos() * im.cosh(), -(re.sin() * im.sinh()))
    }

    fn chain(&self, x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.mul(&x.sin()?.neg()?)
    }
}

/// `sqrt x`
pub struct SqrtKernel;

impl UnaryKernel for SqrtKernel {
    const NAME: &'static str = "sqrt";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.sqrt()
    }

    // principal root: Re >= 0, Im takes the sign of the input's Im
    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        let half = Lanes::splat(T::from_f64(0.5));
        let r = re.hypot(im);
        let out_re = ((r + re) * half).sqrt();
        let out_im = ((r - re) * half).sqrt().with_sign_of(im);
        (out_re, out_im)
    }

    // d/dx sqrt(x) = 1 / (2y)
    fn chain(&self, _x: &Array, y: &Array, v: &Array) -> Result<Array> {
        v.div(&y.mul_scalar(2.0)?)
    }
}

/// `x^2`
pub struct SquareKernel;

impl UnaryKernel for SquareKernel {
    const NAME: &'static str = "square";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x * x
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        (re * re - im * im, (re * im) * Lanes::splat(T::from_f64(2.0)))
    }

    fn chain(&self, x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.mul(&x.mul_scalar(2.0)?)
    }
}

/// `1 / x`
pub struct RecipKernel;

impl UnaryKernel for RecipKernel {
    const NAME: &'static str = "recip";
    const COMPLEX: bool = true;

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.recip()
    }

    fn complex<T: Element>(&self, re: Lanes<T>, im: Lanes<T>) -> (Lanes<T>, Lanes<T>) {
        let d = re * re + im * im;
        (re / d, -(im / d))
    }

    // d/dx (1/x) = -y^2
    fn chain(&self, _x: &Array, y: &Array, v: &Array) -> Result<Array> {
        v.mul(&y.square()?)?.neg()
    }
}

/// `tanh x`
pub struct TanhKernel;

impl UnaryKernel for TanhKernel {
    const NAME: &'static str = "tanh";

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.tanh()
    }

    // d/dx tanh(x) = 1 - y^2
    fn chain(&self, _x: &Array, y: &Array, v: &Array) -> Result<Array> {
        v.mul(&y.square()?.mul_scalar(-1.0)?.add_scalar(1.0)?)
    }
}

/// `atan x`
pub struct AtanKernel;

impl UnaryKernel for AtanKernel {
    const NAME: &'static str = "atan";

    fn real<T: Element>(&self, x: Lanes<T>) -> Lanes<T> {
        x.atan()
    }

    // d/dx atan(x) = 1 / (1 + x^2)
    fn chain(&self, x: &Array, _y: &Array, v: &Array) -> Result<Array> {
        v.div(&x.square()?.add_scalar(1.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &impl UnaryKernel, re: f64, im: f64) -> (f64, f64) {
        let (a, b) = k.complex(Lanes::splat(re), Lanes::splat(im));
        (a.0[0], b.0[0])
    }

    #[test]
    fn test_complex_sqrt_branch() {
        let (re, im) = pair(&SqrtKernel, -4.0, 0.0);
        assert!(re.abs() < 1e-12);
        assert!((im - 2.0).abs() < 1e-12);

        let (re, im) = pair(&SqrtKernel, 3.0, -4.0);
        assert!((re - 2.0).abs() < 1e-12);
        assert!((im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_complex_recip_and_square() {
        let (re, im) = pair(&RecipKernel, 0.0, 2.0);
        assert!(re.abs() < 1e-12);
        assert!((im + 0.5).abs() < 1e-12);

        let (re, im) = pair(&SquareKernel, 1.0, 1.0);
        assert!(re.abs() < 1e-12);
        assert!((im - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_complex_sin_cos_identity() {
        // sin^2 + cos^2 = 1 holds for complex arguments too
        let (sr, si) = pair(&SinKernel, 0.3, 0.7);
        let (cr, ci) = pair(&CosKernel, 0.3, 0.7);
        let re = sr * sr - si * si + cr * cr - ci * ci;
        let im = 2.0 * sr * si + 2.0 * cr * ci;
        assert!((re - 1.0).abs() < 1e-12);
        assert!(im.abs() < 1e-12);
    }
}
