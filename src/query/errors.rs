#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Structured errors emitted while compiling a filter tree.
///
/// Every variant aborts the current compile. The payload names the selector
/// segment, owning entity, or operator symbol involved so callers can build
/// precise messages for whoever wrote the filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Selector segment does not exist on the owning entity.
    #[error("Unknown property: {name} from entity {owner}")]
    UnknownProperty { name: String, owner: String },
    /// Comparison operator has no built-in meaning and no custom strategy.
    #[error("Unknown operator: {symbol}")]
    UnknownOperator { symbol: String },
    /// Logical node used something other than AND/OR.
    #[error("Unknown logical operator: {symbol}")]
    UnknownLogicalOperator { symbol: String },
    /// Ordering operator applied to an attribute type without an ordering.
    #[error("Invalid type for comparison operator: {operator} type: {type_name} must be comparable")]
    NotComparable { type_name: String, operator: String },
    /// Literal argument could not be converted to the attribute type.
    #[error("Cannot coerce argument '{argument}' to {expected}")]
    ArgumentTypeMismatch { argument: String, expected: String },
    /// Operator received the wrong number of arguments.
    #[error("operator {operator} cannot take {found} argument(s)")]
    InvalidArgumentCount { operator: String, found: usize },
    /// AST node is neither a comparison nor a logical node.
    #[error("Unknown expression type: {kind}")]
    UnsupportedNodeType { kind: String },
    /// A comparison was compiled before any root was established.
    #[error("From root node was undefined.")]
    UndefinedRoot,
    /// The defined root context is not an entity context of the target query.
    #[error("From root {context} is not an entity of the query.")]
    RootNotInQuery { context: String },
}

impl CompileError {
    pub fn unknown_property(name: impl Into<String>, owner: impl Into<String>) -> Self {
        CompileError::UnknownProperty {
            name: name.into(),
            owner: owner.into(),
        }
    }

    pub fn unknown_operator(symbol: impl Into<String>) -> Self {
        CompileError::UnknownOperator {
            symbol: symbol.into(),
        }
    }

    pub fn mismatch(argument: impl Into<String>, expected: impl fmt::Display) -> Self {
        CompileError::ArgumentTypeMismatch {
            argument: argument.into(),
            expected: expected.to_string(),
        }
    }

    /// Stable identifier suitable for programmatic matching.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownProperty { .. } => "UnknownProperty",
            CompileError::UnknownOperator { .. } => "UnknownOperator",
            CompileError::UnknownLogicalOperator { .. } => "UnknownLogicalOperator",
            CompileError::NotComparable { .. } => "NotComparable",
            CompileError::ArgumentTypeMismatch { .. } => "ArgumentTypeMismatch",
            CompileError::InvalidArgumentCount { .. } => "ArgumentTypeMismatch",
            CompileError::UnsupportedNodeType { .. } => "UnsupportedNodeType",
            CompileError::UndefinedRoot => "UndefinedRoot",
            CompileError::RootNotInQuery { .. } => "UndefinedRoot",
        }
    }
}

/// Renders an error as `[Code] message`.
pub struct CompileErrorWithCode<'a>(pub &'a CompileError);

impl fmt::Display for CompileErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

/// Result alias used throughout the compiler.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
