//! Error types for ndgrad

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using ndgrad's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or evaluating a graph
///
/// The enum is `Clone` so a poisoned node can hand the exact failure back to
/// every later reader.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Rank or dimension incompatibility found during shape inference
    #[error("Shape mismatch in '{op}': {reason}")]
    ShapeMismatch {
        /// The operation name
        op: &'static str,
        /// The violated constraint
        reason: String,
    },

    /// Operand kind the operation cannot handle (e.g. complex input)
    #[error("Unsupported operand kind for '{op}': {kind}")]
    UnsupportedOperandKind {
        /// The operation name
        op: &'static str,
        /// Description of the rejected operand kind
        kind: String,
    },

    /// Failure discovered while a kernel was running
    #[error("Execution of '{op}' failed: {reason}")]
    Execution {
        /// The operation name
        op: &'static str,
        /// What went wrong
        reason: String,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Invalid argument provided to an operation or constructor
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Arrays from different graphs were combined
    #[error("Arrays belong to different graphs")]
    GraphMismatch,

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(op: &'static str, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            op,
            reason: reason.into(),
        }
    }

    /// Create an unsupported operand kind error
    pub fn unsupported_operand(op: &'static str, kind: impl Into<String>) -> Self {
        Self::UnsupportedOperandKind {
            op,
            kind: kind.into(),
        }
    }

    /// Create an execution error
    pub fn execution(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Execution {
            op,
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised by shape inference
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// Returns true for errors rejecting an operand kind
    pub fn is_unsupported_operand(&self) -> bool {
        matches!(self, Self::UnsupportedOperandKind { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape_mismatch("conv1d", "in_channels 3 != kernel in_channels 4");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in 'conv1d': in_channels 3 != kernel in_channels 4"
        );

        let err = Error::unsupported_operand("atan", "complex input");
        assert!(err.is_unsupported_operand());
        assert!(!err.is_shape_mismatch());
    }

    #[test]
    fn test_error_clone_is_identical() {
        let err = Error::execution("div", "bad parameters");
        assert_eq!(err.clone(), err);
    }
}
