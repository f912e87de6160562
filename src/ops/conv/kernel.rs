//! CPU convolution kernels.
//!
//! Direct convolution over strided buffers, without im2col and without a
//! padded copy: taps that land outside `[0, L)` are skipped. Each kernel
//! fills one contiguous output row per callback, so rows can be handed to
//! independent workers.

use super::params::Conv1dParams;
use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::parallel;
use crate::tensor::Tensor;

/// Read-only strided view of a 3-D (or 1-D) real plane
#[derive(Clone, Copy)]
pub(crate) struct View<'a, T> {
    data: &'a [T],
    strides: [usize; 3],
    offset: usize,
}

impl<'a, T: Element> View<'a, T> {
    pub(crate) fn new(tensor: &'a Tensor) -> Result<Self> {
        let mut strides = [0usize; 3];
        let ndim = tensor.ndim();
        // strides are non-negative for every stored tensor; right-align 1-D bias
        for (slot, &s) in strides[3 - ndim.min(3)..].iter_mut().zip(tensor.strides()) {
            *slot = s as usize;
        }
        Ok(Self {
            data: tensor.re::<T>()?,
            strides,
            offset: tensor.layout().offset(),
        })
    }

    #[inline(always)]
    fn at(&self, i: usize, j: usize, k: usize) -> T {
        self.data[self.offset + i * self.strides[0] + j * self.strides[1] + k * self.strides[2]]
    }
}

/// Input position read by output position `ox` through tap `kx`
#[inline(always)]
fn input_position(p: &Conv1dParams, ox: usize, kx: usize) -> Option<usize> {
    let ix = (ox * p.stride + kx * p.dilation) as isize - p.padding as isize;
    (ix >= 0 && (ix as usize) < p.length).then_some(ix as usize)
}

/// `out[b, oc, ox] = bias[oc] + sum input[b, g*cig + ic, ix] * weight[oc, ic, kx]`
pub(crate) fn conv1d_forward<T: Element>(
    p: &Conv1dParams,
    input: View<'_, T>,
    weight: View<'_, T>,
    bias: Option<View<'_, T>>,
    out: &mut [T],
    min_len: usize,
) {
    let cig = p.c_in_per_group();
    let cog = p.c_out_per_group();

    parallel::for_each_chunk(out, p.output_length, min_len, |start, row| {
        let r = start / p.output_length;
        let (b, oc) = (r / p.c_out, r % p.c_out);
        let c_in_start = (oc / cog) * cig;
        let base = bias.map_or_else(T::zero, |v| v.at(0, 0, oc));

        for (ox, slot) in row.iter_mut().enumerate() {
            let mut sum = base;
            for ic in 0..cig {
                for kx in 0..p.kernel_size {
                    if let Some(ix) = input_position(p, ox, kx) {
                        sum = sum + input.at(b, c_in_start + ic, ix) * weight.at(oc, ic, kx);
                    }
                }
            }
            *slot = sum;
        }
    });
}

/// Gradient with respect to the input: the adjoint of [`conv1d_forward`]
///
/// `out[b, ci, ix] = sum grad[b, oc, ox] * weight[oc, ci - g*cig, kx]` over
/// the output channels `oc` of `ci`'s group and the taps with
/// `ox * stride + kx * dilation - padding == ix`.
pub(crate) fn conv1d_input_grad<T: Element>(
    p: &Conv1dParams,
    grad: View<'_, T>,
    weight: View<'_, T>,
    out: &mut [T],
    min_len: usize,
) {
    let cig = p.c_in_per_group();
    let cog = p.c_out_per_group();

    parallel::for_each_chunk(out, p.length, min_len, |start, row| {
        let r = start / p.length;
        let (b, ci) = (r / p.c_in, r % p.c_in);
        let g = ci / cig;
        let ic = ci - g * cig;

        for (ix, slot) in row.iter_mut().enumerate() {
            let mut sum = T::zero();
            for oc in g * cog..(g + 1) * cog {
                for kx in 0..p.kernel_size {
                    let num = (ix + p.padding) as isize - (kx * p.dilation) as isize;
                    if num < 0 || num as usize % p.stride != 0 {
                        continue;
                    }
                    let ox = num as usize / p.stride;
                    if ox < p.output_length {
                        sum = sum + grad.at(b, oc, ox) * weight.at(oc, ic, kx);
                    }
                }
            }
            *slot = sum;
        }
    });
}

/// Gradient with respect to the weight
///
/// `out[oc, ic, kx] = sum grad[b, oc, ox] * input[b, g*cig + ic, ix]` over
/// the batch and every output position whose tap `kx` lands inside the input.
pub(crate) fn conv1d_weight_grad<T: Element>(
    p: &Conv1dParams,
    input: View<'_, T>,
    grad: View<'_, T>,
    out: &mut [T],
    min_len: usize,
) {
    let cig = p.c_in_per_group();
    let cog = p.c_out_per_group();

    parallel::for_each_chunk(out, p.kernel_size, min_len, |start, row| {
        let r = start / p.kernel_size;
        let (oc, ic) = (r / cig, r % cig);
        let ci = (oc / cog) * cig + ic;

        for (kx, slot) in row.iter_mut().enumerate() {
            let mut sum = T::zero();
            for b in 0..p.batch {
                for ox in 0..p.output_length {
                    if let Some(ix) = input_position(p, ox, kx) {
                        sum = sum + grad.at(b, oc, ox) * input.at(b, ci, ix);
                    }
                }
            }
            *slot = sum;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::conv::params::ConvSettings;

    fn params(input: &[usize], weight: &[usize], s: ConvSettings) -> Conv1dParams {
        Conv1dParams::new("conv1d", input, weight, s).unwrap()
    }

    #[test]
    fn test_forward_implicit_padding() {
        // one channel, kernel [1, 1, 1], padding 1: sliding sums with zero edges
        let p = params(
            &[1, 1, 4],
            &[1, 1, 3],
            ConvSettings {
                padding: 1,
                ..ConvSettings::default()
            },
        );
        let x = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[1, 1, 4]).unwrap();
        let w = Tensor::from_slice(&[1.0f64, 1.0, 1.0], &[1, 1, 3]).unwrap();
        let mut out = vec![0.0f64; 4];
        conv1d_forward(
            &p,
            View::new(&x).unwrap(),
            View::new(&w).unwrap(),
            None,
            &mut out,
            usize::MAX,
        );
        assert_eq!(out, vec![3.0, 6.0, 9.0, 7.0]);
    }

    #[test]
    fn test_forward_reads_strided_input() {
        // [1, 1, 3] input stored as every other element of a longer buffer
        let p = params(&[1, 1, 3], &[1, 1, 1], ConvSettings::default());
        let x = Tensor::from_strided(&[1.0f64, -1.0, 2.0, -1.0, 3.0], &[1, 1, 3], &[3, 3, 2], 0)
            .unwrap();
        let w = Tensor::from_slice(&[2.0f64], &[1, 1, 1]).unwrap();
        let b = Tensor::from_slice(&[0.5f64], &[1]).unwrap();
        let mut out = vec![0.0f64; 3];
        conv1d_forward(
            &p,
            View::new(&x).unwrap(),
            View::new(&w).unwrap(),
            Some(View::new(&b).unwrap()),
            &mut out,
            usize::MAX,
        );
        assert_eq!(out, vec![2.5, 4.5, 6.5]);
    }

    #[test]
    fn test_grad_kernels_are_adjoint() {
        // <conv(x, w), g> == <x, input_grad(g, w)> == <w, weight_grad(x, g)>
        let s = ConvSettings {
            stride: 2,
            padding: 1,
            dilation: 2,
            groups: 2,
        };
        let p = params(&[2, 4, 7], &[4, 2, 2], s);
        let fill = |n: usize, k: f64| (0..n).map(|i| ((i as f64) * k).sin()).collect::<Vec<_>>();
        let xd = fill(2 * 4 * 7, 0.7);
        let wd = fill(4 * 2 * 2, 1.3);
        let gd = fill(2 * 4 * p.output_length, 0.4);
        let x = Tensor::from_slice(&xd, &[2, 4, 7]).unwrap();
        let w = Tensor::from_slice(&wd, &[4, 2, 2]).unwrap();
        let g = Tensor::from_slice(&gd, &p.output_dims()).unwrap();

        let mut y = vec![0.0; gd.len()];
        conv1d_forward(&p, View::new(&x).unwrap(), View::new(&w).unwrap(), None, &mut y, 1);
        let mut gx = vec![0.0; xd.len()];
        conv1d_input_grad(&p, View::new(&g).unwrap(), View::new(&w).unwrap(), &mut gx, 1);
        let mut gw = vec![0.0; wd.len()];
        conv1d_weight_grad(&p, View::new(&x).unwrap(), View::new(&g).unwrap(), &mut gw, 1);

        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
        let lhs = dot(&y, &gd);
        assert!((lhs - dot(&xd, &gx)).abs() < 1e-10);
        assert!((lhs - dot(&wd, &gw)).abs() < 1e-10);
    }
}
