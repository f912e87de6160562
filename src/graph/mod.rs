//! Computation graph: node arena, array handles and the op-application harness
//!
//! A `Graph` owns an append-only arena of nodes. Each node records its
//! operation, its operand edges and the `ArrayShape` produced by shape
//! inference; its data is computed on demand (or immediately, under the eager
//! policy) by a depth-first materialization walk.
//!
//! ```
//! use ndgrad::graph::Graph;
//!
//! let g = Graph::new();
//! let x = g.from_slice(&[0.0f64, 1.0], &[2]).unwrap();
//! let y = x.atan().unwrap();
//! assert_eq!(y.dims().as_slice(), &[2]);
//! let v = y.to_vec().unwrap();
//! assert!((v[1] - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
//! ```

mod array;
mod harness;
mod id;
mod materialize;
mod node;
mod operand;
mod shape;

pub use array::Array;
pub use id::{GraphId, NodeId};
pub use node::NodeStatus;
pub use operand::{Operand, OperandData};
pub use shape::{ArrayShape, Param, Params};

pub(crate) use node::{Node, NodeOperand, NodeState};
pub(crate) use shape::ShapeKey;

use crate::config::GraphConfig;
use crate::dtype::{DType, Element};
use crate::error::Result;
use crate::ops::{BuiltinOp, OpHandle, OpRegistry, Operation};
use crate::runtime::{Allocator, CpuAllocator};
use crate::tensor::Tensor;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Handle to a computation graph
///
/// Clones share the same arena.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

struct GraphInner {
    id: GraphId,
    config: GraphConfig,
    registry: OpRegistry,
    allocator: CpuAllocator,
    nodes: RwLock<Vec<Arc<Node>>>,
    shapes: Mutex<HashMap<ShapeKey, Arc<ArrayShape>>>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    executions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

/// Snapshot of graph activity
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Nodes in the arena
    pub nodes: usize,
    /// Forward kernels run
    pub executions: usize,
    /// Shape inferences answered from the cache
    pub shape_cache_hits: usize,
    /// Shape inferences that ran the op's `infer_shape`
    pub shape_cache_misses: usize,
    /// Output buffers allocated
    pub allocations: usize,
    /// Bytes allocated for output buffers
    pub allocated_bytes: usize,
}

impl Graph {
    /// Create a graph with the default configuration
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create a graph with an explicit configuration
    pub fn with_config(config: GraphConfig) -> Self {
        let id = GraphId::next();
        debug!("creating graph {} with {:?}", id.raw(), config);
        Self {
            inner: Arc::new(GraphInner {
                id,
                config,
                registry: OpRegistry::with_builtins(),
                allocator: CpuAllocator::new(),
                nodes: RwLock::new(Vec::new()),
                shapes: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Create a graph configured from `NDGRAD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_config(GraphConfig::from_env()?))
    }

    /// Graph identifier
    pub fn id(&self) -> GraphId {
        self.inner.id
    }

    /// Configuration fixed at creation
    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Operation registry
    pub fn registry(&self) -> &OpRegistry {
        &self.inner.registry
    }

    /// Register a custom operation under its name
    pub fn register(&self, op: impl Operation + 'static) -> Result<OpHandle> {
        self.inner.registry.register(Arc::new(op))
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// True if no node has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Activity counters
    pub fn stats(&self) -> GraphStats {
        let c = &self.inner.counters;
        let alloc = self.inner.allocator.stats();
        GraphStats {
            nodes: self.len(),
            executions: c.executions.load(Ordering::Relaxed),
            shape_cache_hits: c.cache_hits.load(Ordering::Relaxed),
            shape_cache_misses: c.cache_misses.load(Ordering::Relaxed),
            allocations: alloc.allocations,
            allocated_bytes: alloc.bytes,
        }
    }

    /// True if both handles refer to the same graph
    pub fn same_graph(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ===== Leaf constructors =====

    /// Wrap a tensor as a materialized leaf node
    pub fn constant(&self, tensor: Tensor) -> Result<Array> {
        let mut shape = ArrayShape::new(
            BuiltinOp::Constant.name(),
            tensor.dtype(),
            tensor.is_complex(),
            &[],
        );
        shape.set_strided(tensor.shape(), tensor.strides())?;
        let op = self.registry().builtin(BuiltinOp::Constant).clone();
        let id = self.push_node(
            op,
            Vec::new(),
            Arc::new(shape),
            NodeState::Materialized(Arc::new(tensor)),
        );
        Ok(Array::new(self.clone(), id))
    }

    /// Contiguous real leaf from a slice
    pub fn from_slice<T: Element>(&self, data: &[T], shape: &[usize]) -> Result<Array> {
        self.constant(Tensor::from_slice(data, shape)?)
    }

    /// Contiguous complex leaf from real and imaginary parts
    pub fn from_complex<T: Element>(&self, re: &[T], im: &[T], shape: &[usize]) -> Result<Array> {
        self.constant(Tensor::from_complex(re, im, shape)?)
    }

    /// Real leaf viewing `data` through explicit strides and offset
    pub fn from_strided<T: Element>(
        &self,
        data: &[T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Array> {
        self.constant(Tensor::from_strided(data, shape, strides, offset)?)
    }

    /// Real leaf filled with `value`
    pub fn full(&self, dims: &[usize], dtype: DType, value: f64) -> Result<Array> {
        self.constant(Tensor::full(dims, dtype, value)?)
    }

    /// Real leaf of zeros
    pub fn zeros(&self, dims: &[usize], dtype: DType) -> Result<Array> {
        self.full(dims, dtype, 0.0)
    }

    /// Real leaf of ones
    pub fn ones(&self, dims: &[usize], dtype: DType) -> Result<Array> {
        self.full(dims, dtype, 1.0)
    }

    // ===== Arena access =====

    pub(crate) fn node(&self, id: NodeId) -> Arc<Node> {
        Arc::clone(&self.inner.nodes.read()[id.index()])
    }

    pub(crate) fn push_node(
        &self,
        op: OpHandle,
        operands: Vec<NodeOperand>,
        shape: Arc<ArrayShape>,
        state: NodeState,
    ) -> NodeId {
        let mut nodes = self.inner.nodes.write();
        let id = NodeId::new(nodes.len());
        nodes.push(Arc::new(Node::new(id, op, operands, shape, state)));
        id
    }

    /// Every node reachable from `roots`, operands before consumers
    ///
    /// Node IDs follow construction order, so ascending ID order is a
    /// topological order of the reachable subgraph.
    pub(crate) fn topo_order(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut seen = vec![false; self.len()];
        let mut stack: Vec<NodeId> = roots.to_vec();
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            order.push(id);
            stack.extend(self.node(id).operand_ids());
        }
        order.sort_unstable();
        order
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.inner.id.raw())
            .field("nodes", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
