//! Integration tests for the op-application harness and materialization.

mod common;

use common::init_logger;
use ndgrad::config::{ExecutionPolicy, GraphConfig};
use ndgrad::dtype::DType;
use ndgrad::error::{Error, Result};
use ndgrad::graph::{Array, ArrayShape, Graph, NodeStatus, OperandData};
use ndgrad::ops::{ExecContext, Operation};
use ndgrad::tensor::Tensor;
use std::sync::Arc;

/// Elementwise op whose kernel always fails
struct Broken;

impl Operation for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn infer_shape(&self, out: &mut ArrayShape, operands: &[&ArrayShape]) -> Result<()> {
        out.set_contiguous(operands[0].dims());
        Ok(())
    }

    fn forward(&self, _: &ExecContext<'_>, _: &mut Tensor, _: &[OperandData<'_>]) -> Result<()> {
        Err(Error::execution("broken", "kernel refused to run"))
    }
}

fn input(g: &Graph) -> Array {
    g.from_slice(&[0.5f64, 1.5, -2.0], &[3]).unwrap()
}

// =============================================================================
// Shape inference
// =============================================================================

#[test]
fn test_shape_inference_is_cached_and_deterministic() {
    init_logger();
    let g = Graph::new();
    let x = input(&g);
    let y = x.exp().unwrap();
    let misses = g.stats().shape_cache_misses;

    let z = x.exp().unwrap();
    assert!(Arc::ptr_eq(&y.shape(), &z.shape()));
    assert_eq!(g.stats().shape_cache_misses, misses);
    assert!(g.stats().shape_cache_hits >= 1);

    // a different scalar is a different key
    let a = x.mul_scalar(2.0).unwrap();
    let b = x.mul_scalar(3.0).unwrap();
    assert!(!Arc::ptr_eq(&a.shape(), &b.shape()));
    assert_eq!(a.shape().dims(), b.shape().dims());
}

#[test]
fn test_shape_cache_disabled_still_deterministic() {
    let g = Graph::with_config(GraphConfig::builder().shape_cache(false).build());
    let x = input(&g);
    let y = x.sin().unwrap();
    let z = x.sin().unwrap();
    assert!(!Arc::ptr_eq(&y.shape(), &z.shape()));
    assert_eq!(*y.shape(), *z.shape());
    assert_eq!(g.stats().shape_cache_hits, 0);
}

#[test]
fn test_failed_construction_adds_no_node() {
    let g = Graph::new();
    let x = input(&g);
    let w = g.zeros(&[2, 2], DType::F64).unwrap();
    let before = g.len();
    assert!(x.add(&w).unwrap_err().is_shape_mismatch());
    assert!(x.reshape(&[4]).unwrap_err().is_shape_mismatch());
    assert_eq!(g.len(), before);
    assert_eq!(g.stats().allocations, 0);
}

#[test]
fn test_arrays_from_other_graphs_rejected() {
    let g1 = Graph::new();
    let g2 = Graph::new();
    let a = input(&g1);
    let b = input(&g2);
    assert_eq!(a.add(&b).unwrap_err(), Error::GraphMismatch);
}

// =============================================================================
// Materialization
// =============================================================================

#[test]
fn test_lazy_until_read_then_idempotent() {
    let g = Graph::new();
    let x = input(&g);
    let y = x.square().unwrap().add_scalar(1.0).unwrap();
    assert_eq!(y.status(), NodeStatus::ShapeOnly);
    assert_eq!(g.stats().executions, 0);

    let first = y.materialize().unwrap();
    assert_eq!(y.status(), NodeStatus::Materialized);
    let runs = g.stats().executions;
    assert_eq!(runs, 2);

    let second = y.materialize().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(g.stats().executions, runs);
    assert_eq!(y.to_vec().unwrap(), vec![1.25, 3.25, 5.0]);
}

#[test]
fn test_diamond_operand_executes_once() {
    let g = Graph::new();
    let x = input(&g);
    let shared = x.exp().unwrap();
    let left = shared.sin().unwrap();
    let right = shared.cos().unwrap();
    let out = left.mul(&right).unwrap();
    out.materialize().unwrap();
    // exp, sin, cos, mul
    assert_eq!(g.stats().executions, 4);
}

#[test]
fn test_poisoned_node_re_raises() {
    init_logger();
    let g = Graph::new();
    let op = g.register(Broken).unwrap();
    let x = input(&g);
    let bad = g.apply(&op, &[(&x).into()], &[]).unwrap();
    let consumer = bad.exp().unwrap();

    let err = bad.materialize().unwrap_err();
    assert_eq!(bad.status(), NodeStatus::Poisoned);
    assert!(matches!(err, Error::Execution { op: "broken", .. }));

    // same error again, kernel not rerun
    let runs = g.stats().executions;
    assert_eq!(bad.to_vec().unwrap_err(), err);
    assert_eq!(g.stats().executions, runs);

    // consumers fail with the operand's error
    assert_eq!(consumer.materialize().unwrap_err(), err);
    assert_eq!(consumer.status(), NodeStatus::Poisoned);
}

#[test]
fn test_eager_policy_materializes_on_apply() {
    let config = GraphConfig::builder()
        .execution(ExecutionPolicy::Eager)
        .build();
    let g = Graph::with_config(config);
    let x = input(&g);
    let y = x.neg().unwrap();
    assert_eq!(y.status(), NodeStatus::Materialized);
    assert_eq!(g.stats().executions, 1);

    let op = g.register(Broken).unwrap();
    let err = g.apply(&op, &[(&x).into()], &[]).unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
}

#[test]
fn test_concurrent_reads_execute_once() {
    let g = Graph::new();
    let x = g.full(&[64, 64], DType::F64, 0.25).unwrap();
    let y = x.exp().unwrap().mul(&x).unwrap().sum().unwrap();

    let values: Vec<f64> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| y.item().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(values.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(g.stats().executions, 3);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let data: Vec<f64> = (0..10_000).map(|i| (i as f64) * 1e-3).collect();
    let run = |min_len: usize| {
        let g = Graph::with_config(GraphConfig::builder().parallel_min_len(min_len).build());
        let x = g.from_slice(&data, &[100, 100]).unwrap();
        let b = g.from_slice(&data[..100], &[100]).unwrap();
        x.sin().unwrap().add(&b).unwrap().to_vec().unwrap()
    };
    assert_eq!(run(1), run(usize::MAX));
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_custom_registration() {
    let g = Graph::new();
    g.register(Broken).unwrap();
    assert!(g.register(Broken).is_err());
    assert!(g.registry().names().contains(&"broken"));
    assert!(g.apply_named("no_such_op", &[], &[]).is_err());

    let x = input(&g);
    let y = g.apply_named("atan", &[(&x).into()], &[]).unwrap();
    assert_eq!(y.op_name(), "atan");
}

#[test]
fn test_allocation_accounting() {
    let g = Graph::new();
    let x = g.from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4]).unwrap();
    x.sqrt().unwrap().materialize().unwrap();
    let stats = g.stats();
    assert_eq!(stats.allocations, 1);
    assert_eq!(stats.allocated_bytes, 16);
}
