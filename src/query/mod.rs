#![forbid(unsafe_code)]

//! Filter compiler.
//!
//! Turns a parsed filter tree into a [`criteria::CriteriaQuery`] against a
//! typed entity graph: selectors are resolved through entity metadata and
//! per-entity aliases, arguments are coerced to attribute types, operators
//! are dispatched to built-in or custom predicate builders, and logical groups
//! are composed into one predicate tree.

/// Filter tree produced by the expression parser.
pub mod ast;

/// Fluent filter construction.
///
/// Builds filter trees in code, mostly for tests and callers without a parser.
pub mod builder;

/// Argument coercion.
pub mod coerce;

pub(crate) mod compose;

/// Compiled query: projection, joins and filter.
pub mod criteria;

/// Operator dispatch and the custom predicate-builder hook.
pub mod dispatch;

/// Compile errors.
pub mod errors;

/// Reference executor.
///
/// Evaluates compiled queries over in-memory tables so filters can be checked
/// against fixtures.
pub mod executor;

/// Per-entity alias tables.
pub mod mapper;

/// Entity metadata consumed by the compiler.
pub mod metadata;

/// Compiled predicate tree.
pub mod predicate;

/// Selector resolution and join reuse.
pub mod resolve;

/// Replaceable compiler components.
pub mod tools;

/// Typed runtime values.
pub mod value;

/// Selection, count and bare-predicate entry points.
pub mod visitor;

pub use ast::Node;
pub use builder::FilterBuilder;
pub use criteria::{CriteriaQuery, JoinType};
pub use errors::{CompileError, CompileResult};
pub use tools::BuilderTools;
pub use visitor::{CountQueryVisitor, CriteriaQueryVisitor, PredicateVisitor};
