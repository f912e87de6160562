//! Validation and geometry shared by the convolution family
//!
//! Every convolution node carries the same four params
//! `[stride, padding, dilation, groups]`, and every member of the family
//! rebuilds the same [`Conv1dParams`] from its input and weight dims.

use crate::error::{Error, Result};
use crate::graph::{ArrayShape, Param};

/// Stride, symmetric padding, dilation and group count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSettings {
    /// Step between output positions
    pub stride: usize,
    /// Implicit zeros on each side of the input
    pub padding: usize,
    /// Spacing between kernel taps
    pub dilation: usize,
    /// Number of independent channel groups
    pub groups: usize,
}

impl Default for ConvSettings {
    fn default() -> Self {
        Self {
            stride: 1,
            padding: 0,
            dilation: 1,
            groups: 1,
        }
    }
}

impl ConvSettings {
    /// Node params in order `[stride, padding, dilation, groups]`
    pub fn to_params(self) -> [Param; 4] {
        [
            Param::from(self.stride),
            Param::from(self.padding),
            Param::from(self.dilation),
            Param::from(self.groups),
        ]
    }

    /// Read the settings back from a node shape
    pub fn from_shape(op: &'static str, shape: &ArrayShape) -> Result<Self> {
        let get = |i: usize, name: &'static str| -> Result<usize> {
            let v = shape
                .param_int(i)
                .map_err(|_| Error::shape_mismatch(op, format!("missing parameter '{name}'")))?;
            usize::try_from(v)
                .map_err(|_| Error::shape_mismatch(op, format!("{name} must be >= 0, got {v}")))
        };
        let settings = Self {
            stride: get(0, "stride")?,
            padding: get(1, "padding")?,
            dilation: get(2, "dilation")?,
            groups: get(3, "groups")?,
        };
        validate_positive(settings.stride, "stride", op)?;
        validate_positive(settings.dilation, "dilation", op)?;
        validate_positive(settings.groups, "groups", op)?;
        Ok(settings)
    }
}

/// Validates that stride, dilation, and groups are non-zero
///
/// Settings are checked during shape inference, so a bad value is a
/// `ShapeMismatch` like any other geometry failure.
#[inline]
pub fn validate_positive(value: usize, name: &'static str, op: &'static str) -> Result<()> {
    if value == 0 {
        return Err(Error::shape_mismatch(op, format!("{name} must be > 0, got 0")));
    }
    Ok(())
}

/// Validates that a shape is 3-dimensional
#[inline]
pub fn validate_3d(dims: &[usize], what: &str, op: &'static str) -> Result<()> {
    if dims.len() != 3 {
        return Err(Error::shape_mismatch(
            op,
            format!("{what} must be 3-D, got {}-D {:?}", dims.len(), dims),
        ));
    }
    Ok(())
}

/// Validates that channels are divisible by groups.
#[inline]
pub fn validate_groups(c_in: usize, c_out: usize, groups: usize, op: &'static str) -> Result<()> {
    if !c_in.is_multiple_of(groups) {
        return Err(Error::shape_mismatch(
            op,
            format!("C_in ({c_in}) must be divisible by groups ({groups})"),
        ));
    }
    if !c_out.is_multiple_of(groups) {
        return Err(Error::shape_mismatch(
            op,
            format!("C_out ({c_out}) must be divisible by groups ({groups})"),
        ));
    }
    Ok(())
}

/// Computes the output length of one convolved dimension.
///
/// output = floor((input + 2*padding - dilation*(kernel-1) - 1) / stride) + 1,
/// or `None` when the padded input is shorter than the dilated kernel.
#[inline]
pub fn compute_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
    padding: usize,
) -> Option<usize> {
    let effective_kernel = dilation * (kernel_size.checked_sub(1)?) + 1;
    let padded_size = input_size + 2 * padding;
    if padded_size < effective_kernel {
        None
    } else {
        Some((padded_size - effective_kernel) / stride + 1)
    }
}

/// Validated geometry of one grouped 1-D convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv1dParams {
    /// Batch size `N`
    pub batch: usize,
    /// Input channels
    pub c_in: usize,
    /// Input length `L`
    pub length: usize,
    /// Output channels
    pub c_out: usize,
    /// Kernel taps `K`
    pub kernel_size: usize,
    /// Step between output positions
    pub stride: usize,
    /// Implicit zeros on each side
    pub padding: usize,
    /// Spacing between taps
    pub dilation: usize,
    /// Channel groups
    pub groups: usize,
    /// Output length `L_out`
    pub output_length: usize,
}

impl Conv1dParams {
    /// Check `input [N, C_in, L]` against `weight [C_out, C_in/groups, K]`
    pub fn new(
        op: &'static str,
        input: &[usize],
        weight: &[usize],
        settings: ConvSettings,
    ) -> Result<Self> {
        validate_3d(input, "input", op)?;
        validate_3d(weight, "weight", op)?;
        let ConvSettings {
            stride,
            padding,
            dilation,
            groups,
        } = settings;
        let (batch, c_in, length) = (input[0], input[1], input[2]);
        let (c_out, weight_c_in, kernel_size) = (weight[0], weight[1], weight[2]);

        validate_groups(c_in, c_out, groups, op)?;
        if weight_c_in != c_in / groups {
            return Err(Error::shape_mismatch(
                op,
                format!(
                    "weight.shape[1] should be C_in/groups = {c_in}/{groups} = {}, got {weight_c_in}",
                    c_in / groups
                ),
            ));
        }
        let output_length = compute_output_size(length, kernel_size, stride, dilation, padding)
            .ok_or_else(|| {
                Error::shape_mismatch(
                    op,
                    format!(
                        "padded input length {} is shorter than the dilated kernel \
                         (kernel {kernel_size}, dilation {dilation})",
                        length + 2 * padding
                    ),
                )
            })?;

        Ok(Self {
            batch,
            c_in,
            length,
            c_out,
            kernel_size,
            stride,
            padding,
            dilation,
            groups,
            output_length,
        })
    }

    /// Dims of the forward output `[N, C_out, L_out]`
    pub fn output_dims(&self) -> [usize; 3] {
        [self.batch, self.c_out, self.output_length]
    }

    /// Dims of the input `[N, C_in, L]`
    pub fn input_dims(&self) -> [usize; 3] {
        [self.batch, self.c_in, self.length]
    }

    /// Dims of the weight `[C_out, C_in/groups, K]`
    pub fn weight_dims(&self) -> [usize; 3] {
        [self.c_out, self.c_in / self.groups, self.kernel_size]
    }

    /// Check that `grad` has the forward output dims
    pub fn expect_output(&self, grad: &[usize], op: &'static str) -> Result<()> {
        if grad != self.output_dims() {
            return Err(Error::shape_mismatch(
                op,
                format!(
                    "gradient dims {:?} do not match convolution output {:?}",
                    grad,
                    self.output_dims()
                ),
            ));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn c_in_per_group(&self) -> usize {
        self.c_in / self.groups
    }

    #[inline]
    pub(crate) fn c_out_per_group(&self) -> usize {
        self.c_out / self.groups
    }
}
