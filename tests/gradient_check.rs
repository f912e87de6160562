//! Finite-difference and duality checks for every differentiation rule

mod common;

use common::{assert_allclose_f64, init_logger, random_tensor, rng};
use ndgrad::autograd::{backward, check_duality, check_jvp, jvp};
use ndgrad::error::Result;
use ndgrad::graph::{Array, Graph};
use ndgrad::ops::ConvSettings;
use ndgrad::tensor::Tensor;

const EPS: f64 = 1e-6;
const TOL: f64 = 1e-4;

type UnaryFn = fn(&Array) -> Result<Array>;

/// Run both checks for `f` at random inputs of the given dims
fn check<F>(name: &str, f: F, dims: &[&[usize]], lo: f64, hi: f64, seed: u64)
where
    F: Fn(&Graph, &[Array]) -> Result<Array>,
{
    let mut r = rng(seed);
    let inputs: Vec<Tensor> = dims.iter().map(|d| random_tensor(&mut r, d, lo, hi)).collect();
    let tangents: Vec<Tensor> = dims.iter().map(|d| random_tensor(&mut r, d, -1.0, 1.0)).collect();

    let report = check_jvp(&f, &inputs, &tangents, EPS).unwrap();
    assert!(
        report.passed(TOL),
        "{name}: jvp off by {} (analytic {:?}, numeric {:?})",
        report.max_rel_error(),
        report.analytic,
        report.reference
    );

    let out_dims = {
        let g = Graph::new();
        let xs: Vec<Array> = inputs
            .iter()
            .map(|t| g.constant(t.clone()).unwrap())
            .collect();
        f(&g, &xs).unwrap().dims().to_vec()
    };
    let cotangent = random_tensor(&mut r, &out_dims, -1.0, 1.0);
    let report = check_duality(&f, &inputs, &tangents, &cotangent).unwrap();
    assert!(
        report.passed(1e-10),
        "{name}: <vjp(u), v> = {} but <u, jvp(v)> = {}",
        report.analytic[0],
        report.reference[0]
    );
}

#[test]
fn test_unary_rules() {
    init_logger();
    let cases: [(&str, UnaryFn, f64, f64); 10] = [
        ("neg", Array::neg, -2.0, 2.0),
        ("exp", Array::exp, -2.0, 2.0),
        ("log", Array::log, 0.5, 2.0),
        ("sin", Array::sin, -2.0, 2.0),
        ("cos", Array::cos, -2.0, 2.0),
        ("sqrt", Array::sqrt, 0.5, 2.0),
        ("square", Array::square, -2.0, 2.0),
        ("recip", Array::recip, 0.5, 2.0),
        ("tanh", Array::tanh, -2.0, 2.0),
        ("atan", Array::atan, -2.0, 2.0),
    ];
    for (i, (name, op, lo, hi)) in cases.into_iter().enumerate() {
        check(name, |_, xs| op(&xs[0]), &[&[2, 3]], lo, hi, i as u64);
    }
}

#[test]
fn test_scalar_rules() {
    check("add_scalar", |_, xs| xs[0].add_scalar(0.75), &[&[4]], -1.0, 1.0, 20);
    check("mul_scalar", |_, xs| xs[0].mul_scalar(-1.5), &[&[4]], -1.0, 1.0, 21);
}

#[test]
fn test_broadcasting_binary_rules() {
    let dims: &[&[usize]] = &[&[2, 3], &[3]];
    check("add", |_, xs| xs[0].add(&xs[1]), dims, -1.0, 1.0, 30);
    check("sub", |_, xs| xs[0].sub(&xs[1]), dims, -1.0, 1.0, 31);
    check("mul", |_, xs| xs[0].mul(&xs[1]), dims, -1.0, 1.0, 32);
    check("div", |_, xs| xs[0].div(&xs[1]), dims, 0.5, 2.0, 33);
    // broadcast on the left operand
    check("div_left", |_, xs| xs[1].div(&xs[0]), dims, 0.5, 2.0, 34);
}

#[test]
fn test_shape_rules() {
    check(
        "transpose",
        |_, xs| xs[0].transpose(0, 1)?.exp(),
        &[&[2, 3]],
        -1.0,
        1.0,
        40,
    );
    check(
        "reshape",
        |_, xs| xs[0].reshape(&[3, 2])?.mul(&xs[1]),
        &[&[2, 3], &[2]],
        -1.0,
        1.0,
        41,
    );
    check("sum", |_, xs| xs[0].sin()?.sum(), &[&[2, 3]], -1.0, 1.0, 42);
    check(
        "sum_to_shape",
        |_, xs| xs[0].sum_to_shape(&[1, 3]),
        &[&[4, 3]],
        -1.0,
        1.0,
        43,
    );
    check(
        "broadcast_to",
        |_, xs| xs[0].broadcast_to(&[2, 3])?.square(),
        &[&[3]],
        -1.0,
        1.0,
        44,
    );
}

#[test]
fn test_conv1d_rules() {
    let settings = ConvSettings {
        stride: 2,
        padding: 1,
        dilation: 2,
        groups: 2,
    };
    check(
        "conv1d",
        move |_, xs| xs[0].conv1d(&xs[1], Some(&xs[2]), settings),
        &[&[2, 4, 7], &[4, 2, 3], &[4]],
        -1.0,
        1.0,
        50,
    );
    // L_out = (7 + 2 - 4 - 1) / 2 + 1 = 3
    check(
        "conv1d_input_grad",
        move |_, xs| xs[0].conv1d_input_grad(&xs[1], &[2, 4, 7], settings),
        &[&[2, 4, 3], &[4, 2, 3]],
        -1.0,
        1.0,
        51,
    );
    check(
        "conv1d_weight_grad",
        move |_, xs| xs[0].conv1d_weight_grad(&xs[1], &[4, 2, 3], settings),
        &[&[2, 4, 7], &[2, 4, 3]],
        -1.0,
        1.0,
        52,
    );
}

#[test]
fn test_composite() {
    check(
        "composite",
        |_, xs| {
            let h = xs[0].mul(&xs[1])?.tanh()?;
            h.add(&xs[0].atan()?)?.sum()
        },
        &[&[3, 2], &[2]],
        -1.0,
        1.0,
        60,
    );
}

#[test]
fn test_second_order_atan() {
    let g = Graph::new();
    let data = [-1.5, -0.2, 0.0, 0.7, 2.0];
    let x = g.from_slice(&data, &[5]).unwrap();
    let v = g.from_slice(&[1.0, 2.0, -1.0, 0.5, 3.0], &[5]).unwrap();

    let grads = backward(&x.atan().unwrap().sum().unwrap()).unwrap();
    let dx = grads.grad(&x).unwrap();
    let first: Vec<f64> = data.iter().map(|x| 1.0 / (1.0 + x * x)).collect();
    assert_allclose_f64(&dx.to_vec().unwrap(), &first, 1e-12, 1e-12, "first order");

    let d2 = jvp(dx, &[x.clone()], &[v.clone()]).unwrap();
    let expected: Vec<f64> = data
        .iter()
        .zip(v.to_vec().unwrap())
        .map(|(x, v)| -2.0 * x / (1.0 + x * x).powi(2) * v)
        .collect();
    assert_allclose_f64(&d2.to_vec().unwrap(), &expected, 1e-10, 1e-12, "second order");
}
