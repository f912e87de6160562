//! Numerical checks for differentiation rules
//!
//! `check_jvp` compares forward-mode derivatives with central finite
//! differences; `check_duality` compares `<vjp(u), v>` with `<u, jvp(v)>`.
//! Both take the function as a closure that builds it on a given graph, so
//! the same closure serves the analytic and the perturbed evaluations.

use super::{jvp, vjp};
use crate::error::{Error, Result};
use crate::graph::{Array, Graph};
use crate::tensor::Tensor;

/// Analytic values next to the reference they should match
#[derive(Clone, Debug, PartialEq)]
pub struct GradCheck {
    /// Values produced by the differentiation rules
    pub analytic: Vec<f64>,
    /// Reference values (finite differences or the dual product)
    pub reference: Vec<f64>,
}

impl GradCheck {
    /// Largest absolute difference
    pub fn max_abs_error(&self) -> f64 {
        self.analytic
            .iter()
            .zip(&self.reference)
            .map(|(a, r)| (a - r).abs())
            .fold(0.0, f64::max)
    }

    /// Largest difference relative to `max(1, |reference|)`
    pub fn max_rel_error(&self) -> f64 {
        self.analytic
            .iter()
            .zip(&self.reference)
            .map(|(a, r)| (a - r).abs() / r.abs().max(1.0))
            .fold(0.0, f64::max)
    }

    /// Whether every entry agrees within `tol` (relative)
    pub fn passed(&self, tol: f64) -> bool {
        self.analytic.len() == self.reference.len() && self.max_rel_error() <= tol
    }
}

fn leaves(graph: &Graph, tensors: &[Tensor]) -> Result<Vec<Array>> {
    tensors.iter().map(|t| graph.constant(t.clone())).collect()
}

fn check_pairs(inputs: &[Tensor], tangents: &[Tensor]) -> Result<()> {
    if inputs.len() != tangents.len() {
        return Err(Error::invalid_argument(
            "tangents",
            format!("{} inputs but {} tangents", inputs.len(), tangents.len()),
        ));
    }
    for (x, t) in inputs.iter().zip(tangents) {
        if x.shape() != t.shape() {
            return Err(Error::shape_mismatch(
                "check",
                format!("tangent dims {:?} differ from input dims {:?}", t.shape(), x.shape()),
            ));
        }
        if x.is_complex() || t.is_complex() {
            return Err(Error::unsupported_operand("check", "complex input"));
        }
    }
    Ok(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Central finite difference `(f(x + eps v) - f(x - eps v)) / 2 eps`
///
/// Every evaluation runs on a fresh graph with f64 inputs.
pub fn numerical_jvp<F>(f: F, inputs: &[Tensor], tangents: &[Tensor], eps: f64) -> Result<Vec<f64>>
where
    F: Fn(&Graph, &[Array]) -> Result<Array>,
{
    check_pairs(inputs, tangents)?;
    let eval = |sign: f64| -> Result<Vec<f64>> {
        let graph = Graph::new();
        let shifted = inputs
            .iter()
            .zip(tangents)
            .map(|(x, t)| {
                let data: Vec<f64> = x
                    .to_f64_vec()
                    .iter()
                    .zip(t.to_f64_vec())
                    .map(|(x, t)| x + sign * eps * t)
                    .collect();
                graph.from_slice(&data, x.shape())
            })
            .collect::<Result<Vec<_>>>()?;
        f(&graph, &shifted)?.to_vec()
    };
    let plus = eval(1.0)?;
    let minus = eval(-1.0)?;
    Ok(plus
        .iter()
        .zip(&minus)
        .map(|(p, m)| (p - m) / (2.0 * eps))
        .collect())
}

/// Compare `jvp` of `f` at `inputs` along `tangents` with finite differences
///
/// # Example
///
/// ```
/// use ndgrad::autograd::check_jvp;
/// use ndgrad::tensor::Tensor;
///
/// let x = Tensor::from_slice(&[0.3f64, -1.2], &[2]).unwrap();
/// let v = Tensor::from_slice(&[1.0f64, 0.5], &[2]).unwrap();
/// let report = check_jvp(|_, xs| xs[0].atan(), &[x], &[v], 1e-6).unwrap();
/// assert!(report.passed(1e-6));
/// ```
pub fn check_jvp<F>(f: F, inputs: &[Tensor], tangents: &[Tensor], eps: f64) -> Result<GradCheck>
where
    F: Fn(&Graph, &[Array]) -> Result<Array>,
{
    check_pairs(inputs, tangents)?;
    let graph = Graph::new();
    let xs = leaves(&graph, inputs)?;
    let ts = leaves(&graph, tangents)?;
    let y = f(&graph, &xs)?;
    let analytic = jvp(&y, &xs, &ts)?.to_vec()?;
    let reference = numerical_jvp(&f, inputs, tangents, eps)?;
    Ok(GradCheck {
        analytic,
        reference,
    })
}

/// Compare `sum_i <vjp_i(u), v_i>` with `<u, jvp(v)>`
///
/// Both sides are returned as one-element vectors.
pub fn check_duality<F>(
    f: F,
    inputs: &[Tensor],
    tangents: &[Tensor],
    cotangent: &Tensor,
) -> Result<GradCheck>
where
    F: Fn(&Graph, &[Array]) -> Result<Array>,
{
    check_pairs(inputs, tangents)?;
    let graph = Graph::new();
    let xs = leaves(&graph, inputs)?;
    let ts = leaves(&graph, tangents)?;
    let y = f(&graph, &xs)?;
    let u = graph.constant(cotangent.clone())?;

    let jv = jvp(&y, &xs, &ts)?.to_vec()?;
    let rhs = dot(&cotangent.to_f64_vec(), &jv);

    let mut lhs = 0.0;
    for (g, t) in vjp(&y, &u, &xs)?.iter().zip(tangents) {
        lhs += dot(&g.to_vec()?, &t.to_f64_vec());
    }
    Ok(GradCheck {
        analytic: vec![lhs],
        reference: vec![rhs],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_wrong_rule() {
        // the reference of a correct rule matches; a perturbed one does not
        let x = Tensor::from_slice(&[0.5f64, 2.0], &[2]).unwrap();
        let v = Tensor::from_slice(&[1.0f64, 1.0], &[2]).unwrap();
        let mut report = check_jvp(|_, xs| xs[0].exp(), &[x], &[v], 1e-6).unwrap();
        assert!(report.passed(1e-6));
        report.analytic[0] += 1e-3;
        assert!(!report.passed(1e-6));
    }

    #[test]
    fn test_complex_inputs_rejected() {
        let z = Tensor::from_complex(&[1.0f64], &[1.0], &[1]).unwrap();
        let err = numerical_jvp(|_, xs| xs[0].exp(), &[z.clone()], &[z], 1e-6).unwrap_err();
        assert!(err.is_unsupported_operand());
    }
}
