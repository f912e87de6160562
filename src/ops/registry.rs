//! Operation registry
//!
//! Built-in operations are instantiated once per graph and indexed by
//! [`BuiltinOp`]; custom operations are registered by name. Names are only
//! resolved when a node is constructed, never while kernels run.

use super::binary::{AddKernel, DivKernel, ElementwiseBinary, MulKernel, SubKernel};
use super::constant::Constant;
use super::conv::{Conv1d, Conv1dInputGrad, Conv1dWeightGrad};
use super::scalar::{AddScalar, MulScalar};
use super::shape_ops::{BroadcastTo, Contiguous, Reshape, SumToShape, Transpose};
use super::traits::OpHandle;
use super::unary::{
    AtanKernel, CosKernel, ElementwiseUnary, ExpKernel, LogKernel, NegKernel, RecipKernel,
    SinKernel, SqrtKernel, SquareKernel, TanhKernel,
};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

macro_rules! builtin_ops {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Operations every graph provides
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(usize)]
        pub enum BuiltinOp {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl BuiltinOp {
            /// Every built-in, in index order
            pub const ALL: &'static [BuiltinOp] = &[$(BuiltinOp::$variant),*];

            /// Registered name
            pub const fn name(self) -> &'static str {
                match self {
                    $(BuiltinOp::$variant => $name,)*
                }
            }

            /// Built-in with the given name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(BuiltinOp::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

builtin_ops! {
    Constant => "constant",
    Neg => "neg",
    Exp => "exp",
    Log => "log",
    Sin => "sin",
    Cos => "cos",
    Sqrt => "sqrt",
    Square => "square",
    Recip => "recip",
    Tanh => "tanh",
    Atan => "atan",
    AddScalar => "add_scalar",
    MulScalar => "mul_scalar",
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    Reshape => "reshape",
    Transpose => "transpose",
    BroadcastTo => "broadcast_to",
    SumToShape => "sum_to_shape",
    Contiguous => "contiguous",
    Conv1d => "conv1d",
    Conv1dInputGrad => "conv1d_input_grad",
    Conv1dWeightGrad => "conv1d_weight_grad",
}

impl BuiltinOp {
    fn instantiate(self) -> OpHandle {
        match self {
            BuiltinOp::Constant => Arc::new(Constant),
            BuiltinOp::Neg => Arc::new(ElementwiseUnary::new(NegKernel)),
            BuiltinOp::Exp => Arc::new(ElementwiseUnary::new(ExpKernel)),
            BuiltinOp::Log => Arc::new(ElementwiseUnary::new(LogKernel)),
            BuiltinOp::Sin => Arc::new(ElementwiseUnary::new(SinKernel)),
            BuiltinOp::Cos => Arc::new(ElementwiseUnary::new(CosKernel)),
            BuiltinOp::Sqrt => Arc::new(ElementwiseUnary::new(SqrtKernel)),
            BuiltinOp::Square => Arc::new(ElementwiseUnary::new(SquareKernel)),
            BuiltinOp::Recip => Arc::new(ElementwiseUnary::new(RecipKernel)),
            BuiltinOp::Tanh => Arc::new(ElementwiseUnary::new(TanhKernel)),
            BuiltinOp::Atan => Arc::new(ElementwiseUnary::new(AtanKernel)),
            BuiltinOp::AddScalar => Arc::new(AddScalar),
            BuiltinOp::MulScalar => Arc::new(MulScalar),
            BuiltinOp::Add => Arc::new(ElementwiseBinary::new(AddKernel)),
            BuiltinOp::Sub => Arc::new(ElementwiseBinary::new(SubKernel)),
            BuiltinOp::Mul => Arc::new(ElementwiseBinary::new(MulKernel)),
            BuiltinOp::Div => Arc::new(ElementwiseBinary::new(DivKernel)),
            BuiltinOp::Reshape => Arc::new(Reshape),
            BuiltinOp::Transpose => Arc::new(Transpose),
            BuiltinOp::BroadcastTo => Arc::new(BroadcastTo),
            BuiltinOp::SumToShape => Arc::new(SumToShape),
            BuiltinOp::Contiguous => Arc::new(Contiguous),
            BuiltinOp::Conv1d => Arc::new(Conv1d),
            BuiltinOp::Conv1dInputGrad => Arc::new(Conv1dInputGrad),
            BuiltinOp::Conv1dWeightGrad => Arc::new(Conv1dWeightGrad),
        }
    }
}

/// Name-to-operation table of one graph
pub struct OpRegistry {
    builtins: Vec<OpHandle>,
    custom: RwLock<HashMap<&'static str, OpHandle>>,
}

impl OpRegistry {
    /// Registry holding one instance of every built-in
    pub fn with_builtins() -> Self {
        Self {
            builtins: BuiltinOp::ALL.iter().map(|b| b.instantiate()).collect(),
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Shared instance of a built-in
    #[inline]
    pub fn builtin(&self, op: BuiltinOp) -> &OpHandle {
        &self.builtins[op as usize]
    }

    /// Operation registered under `name`
    pub fn lookup(&self, name: &str) -> Result<OpHandle> {
        if let Some(b) = BuiltinOp::from_name(name) {
            return Ok(Arc::clone(self.builtin(b)));
        }
        self.custom
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::invalid_argument("op", format!("no operation named '{name}'")))
    }

    /// Add a custom operation; its name must not be taken
    pub fn register(&self, op: OpHandle) -> Result<OpHandle> {
        let name = op.name();
        if BuiltinOp::from_name(name).is_some() {
            return Err(Error::invalid_argument(
                "op",
                format!("'{name}' is a built-in operation"),
            ));
        }
        let mut custom = self.custom.write();
        if custom.contains_key(name) {
            return Err(Error::invalid_argument(
                "op",
                format!("'{name}' is already registered"),
            ));
        }
        custom.insert(name, Arc::clone(&op));
        Ok(op)
    }

    /// Names of every available operation
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = BuiltinOp::ALL.iter().map(|b| b.name()).collect();
        names.extend(self.custom.read().keys().copied());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_index_matches_name() {
        let registry = OpRegistry::with_builtins();
        for &op in BuiltinOp::ALL {
            assert_eq!(registry.builtin(op).name(), op.name());
            assert_eq!(BuiltinOp::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_lookup_and_duplicate_registration() {
        let registry = OpRegistry::with_builtins();
        assert_eq!(registry.lookup("atan").unwrap().name(), "atan");
        assert!(registry.lookup("nope").is_err());

        let dup: OpHandle = Arc::new(Constant);
        assert!(registry.register(dup).is_err());
    }
}
