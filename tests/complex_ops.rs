//! Integration tests for complex-valued arrays

mod common;

use common::assert_allclose_f64;
use ndgrad::autograd::jvp;
use ndgrad::dtype::DType;
use ndgrad::graph::{Array, Graph};

const RE: [f64; 4] = [1.0, -0.5, 0.25, -2.0];
const IM: [f64; 4] = [0.5, 1.5, -1.0, -0.75];

fn z(g: &Graph) -> Array {
    g.from_complex(&RE, &IM, &[2, 2]).unwrap()
}

fn assert_complex(a: &Array, re: &[f64], im: &[f64], msg: &str) {
    assert!(a.is_complex(), "{msg}: result is real");
    assert_allclose_f64(&a.to_vec().unwrap(), re, 1e-12, 1e-12, msg);
    assert_allclose_f64(&a.imag_to_vec().unwrap(), im, 1e-12, 1e-12, msg);
}

#[test]
fn test_real_only_ops_reject_complex() {
    let g = Graph::new();
    let x = z(&g);
    let before = g.len();
    assert!(x.atan().unwrap_err().is_unsupported_operand());
    assert!(x.tanh().unwrap_err().is_unsupported_operand());
    assert_eq!(g.len(), before);
    assert_eq!(g.stats().allocations, 0);
}

#[test]
fn test_exp_log_sqrt() {
    let g = Graph::new();
    let x = z(&g);

    let (re, im): (Vec<f64>, Vec<f64>) = RE
        .iter()
        .zip(IM)
        .map(|(a, b)| (a.exp() * b.cos(), a.exp() * b.sin()))
        .unzip();
    assert_complex(&x.exp().unwrap(), &re, &im, "exp");

    let (re, im): (Vec<f64>, Vec<f64>) = RE
        .iter()
        .zip(IM)
        .map(|(a, b)| (a.hypot(b).ln(), b.atan2(*a)))
        .unzip();
    assert_complex(&x.log().unwrap(), &re, &im, "log");

    // the principal root squares back to the input
    let s = x.sqrt().unwrap();
    let back = s.mul(&s).unwrap();
    assert_complex(&back, &RE, &IM, "sqrt");
    assert!(s.to_vec().unwrap().iter().all(|v| *v >= 0.0));
}

#[test]
fn test_mul_div_with_broadcast() {
    let g = Graph::new();
    let x = z(&g);
    // (0 + 1i) broadcast along the last dim of [2, 2]
    let i = g.from_complex(&[0.0f64, 2.0], &[1.0, 0.0], &[2]).unwrap();

    let mut re = Vec::new();
    let mut im = Vec::new();
    for (k, (a, b)) in RE.iter().zip(IM).enumerate() {
        if k % 2 == 0 {
            // times i
            re.push(-b);
            im.push(*a);
        } else {
            re.push(2.0 * a);
            im.push(2.0 * b);
        }
    }
    let prod = x.mul(&i).unwrap();
    assert_complex(&prod, &re, &im, "mul");

    // dividing the product by the same factor recovers the input
    let q = prod.div(&i).unwrap();
    assert_complex(&q, &RE, &IM, "div");
}

#[test]
fn test_real_operand_promotes() {
    let g = Graph::new();
    let x = z(&g);
    let r = g.full(&[2, 2], DType::F64, 2.0).unwrap();
    let sum = r.add(&x).unwrap();
    let re: Vec<f64> = RE.iter().map(|v| v + 2.0).collect();
    assert_complex(&sum, &re, &IM, "add");
}

#[test]
fn test_exp_jvp_at_complex_point() {
    let g = Graph::new();
    let x = z(&g);
    let y = x.exp().unwrap();
    let t = g.ones(&[2, 2], DType::F64).unwrap();
    let dy = jvp(&y, &[x.clone()], &[t]).unwrap();

    let expected = y.materialize().unwrap();
    assert_complex(
        &dy,
        &expected.to_f64_vec(),
        &expected.imag_to_f64_vec(),
        "exp jvp",
    );
}

#[test]
fn test_complex_transpose_and_sum() {
    let g = Graph::new();
    let x = z(&g);
    let t = x.transpose(0, 1).unwrap();
    assert_complex(
        &t,
        &[RE[0], RE[2], RE[1], RE[3]],
        &[IM[0], IM[2], IM[1], IM[3]],
        "transpose",
    );

    let s = x.sum().unwrap();
    assert_complex(&s, &[RE.iter().sum::<f64>()], &[IM.iter().sum::<f64>()], "sum");
}

#[test]
fn test_sqrt_branch_follows_sign_of_zero_imaginary() {
    let g = Graph::new();
    let x = g.from_complex(&[-4.0f64, -4.0], &[0.0, -0.0], &[2]).unwrap();
    let s = x.sqrt().unwrap();
    assert_complex(&s, &[0.0, 0.0], &[2.0, -2.0], "sqrt");
}
