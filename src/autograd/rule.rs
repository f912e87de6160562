//! Gradient values and the default differentiation rules

use crate::error::{Error, Result};
use crate::graph::{Array, Operand};

/// Derivative flowing through one operand position
#[derive(Clone, Debug)]
pub enum Grad {
    /// A derivative array
    Value(Array),
    /// Structurally zero: the value does not depend on the seeds
    Zero,
    /// Not a differentiable position (e.g. a shape pseudo-operand)
    NoGradient,
}

impl Grad {
    /// The derivative array, if any
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Grad::Value(a) => Some(a),
            Grad::Zero | Grad::NoGradient => None,
        }
    }

    /// Consume into the derivative array, if any
    pub fn into_array(self) -> Option<Array> {
        match self {
            Grad::Value(a) => Some(a),
            Grad::Zero | Grad::NoGradient => None,
        }
    }

    /// True for `Grad::Value`
    pub fn is_value(&self) -> bool {
        matches!(self, Grad::Value(_))
    }

    /// True for `Grad::NoGradient`
    pub fn is_no_gradient(&self) -> bool {
        matches!(self, Grad::NoGradient)
    }

    /// Sum of two contributions
    ///
    /// `Zero` and `NoGradient` are both identities for the sum; two values
    /// are added with the `add` operation.
    pub fn accumulate(self, other: Grad) -> Result<Grad> {
        Ok(match (self, other) {
            (Grad::Value(a), Grad::Value(b)) => Grad::Value(a.add(&b)?),
            (Grad::Value(a), _) | (_, Grad::Value(a)) => Grad::Value(a),
            (Grad::Zero, _) | (_, Grad::Zero) => Grad::Zero,
            (Grad::NoGradient, Grad::NoGradient) => Grad::NoGradient,
        })
    }
}

impl From<Array> for Grad {
    fn from(a: Array) -> Self {
        Grad::Value(a)
    }
}

/// Array operand at `index`, or an error naming `op`
pub fn primal<'a>(primals: &'a [Operand], index: usize, op: &'static str) -> Result<&'a Array> {
    primals
        .get(index)
        .ok_or_else(|| Error::Internal(format!("'{op}' rule expected operand #{index}")))?
        .array(op)
}

/// Tangent at `index`, if it carries a value
pub fn tangent(tangents: &[Grad], index: usize) -> Option<&Array> {
    tangents.get(index).and_then(Grad::as_array)
}

/// Forward-mode rule for operations without a custom one
///
/// Every array operand's tangent is broadcast to the output dims and the
/// results are summed, which is exact for operations that are the identity in
/// each operand up to broadcasting (`add`, `add_scalar`, `contiguous`).
/// Pseudo-operands contribute nothing. If no operand carries a tangent the
/// result is `Zero`.
pub fn default_jvp(primals: &[Operand], tangents: &[Grad], output: &Array) -> Result<Grad> {
    let dims = output.dims();
    let mut acc = Grad::Zero;
    for (primal, t) in primals.iter().zip(tangents) {
        if let (Operand::Array(_), Grad::Value(t)) = (primal, t) {
            acc = acc.accumulate(Grad::Value(t.broadcast_to(&dims)?))?;
        }
    }
    Ok(acc)
}

/// Reverse-mode rule for operations without a custom one
///
/// Each array operand receives the output gradient summed over the
/// dimensions along which that operand was broadcast (`sum_to_shape`), so a
/// bias of shape `[C]` added to `[N, C]` gets the column sums. Pseudo-operands
/// receive `NoGradient`.
pub fn default_vjp(primals: &[Operand], grad_output: &Array, _output: &Array) -> Result<Vec<Grad>> {
    primals
        .iter()
        .map(|p| match p {
            Operand::Array(a) => Ok(Grad::Value(grad_output.sum_to_shape(&a.dims())?)),
            Operand::Shape(_) => Ok(Grad::NoGradient),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::graph::{ArrayShape, Graph};

    #[test]
    fn test_accumulate_identities() {
        let g = Graph::new();
        let x = g.from_slice(&[1.0f64, 2.0], &[2]).unwrap();

        assert!(matches!(
            Grad::Zero.accumulate(Grad::NoGradient).unwrap(),
            Grad::Zero
        ));
        let v = Grad::NoGradient.accumulate(Grad::Value(x.clone())).unwrap();
        assert_eq!(v.as_array().unwrap().id(), x.id());

        let sum = Grad::Value(x.clone()).accumulate(Grad::Value(x)).unwrap();
        assert_eq!(sum.into_array().unwrap().to_vec().unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_default_vjp_sums_broadcast_dims() {
        let g = Graph::new();
        let a = g.ones(&[2, 3], DType::F64).unwrap();
        let bias = g.ones(&[3], DType::F64).unwrap();
        let out = a.add(&bias).unwrap();
        let grad = g.full(&[2, 3], DType::F64, 0.5).unwrap();

        let primals = [
            Operand::Array(a),
            Operand::Array(bias),
            Operand::Shape(ArrayShape::from_dims(&[2])),
        ];
        let grads = default_vjp(&primals, &grad, &out).unwrap();
        assert_eq!(grads[0].as_array().unwrap().to_vec().unwrap(), vec![0.5; 6]);
        assert_eq!(grads[1].as_array().unwrap().to_vec().unwrap(), vec![1.0; 3]);
        assert!(grads[2].is_no_gradient());
    }

    #[test]
    fn test_default_jvp_zero_without_tangents() {
        let g = Graph::new();
        let a = g.ones(&[2], DType::F64).unwrap();
        let out = a.add_scalar(1.0).unwrap();
        let primals = [Operand::Array(a)];
        assert!(matches!(
            default_jvp(&primals, &[Grad::Zero], &out).unwrap(),
            Grad::Zero
        ));
    }
}
