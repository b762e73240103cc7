//! Compiled predicate tree handed to an executor.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::query::value::Value;
use crate::types::JoinId;

/// Context an attribute path starts from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathRoot {
    /// The query root.
    Root,
    /// A join registered on the query.
    Join(JoinId),
}

impl fmt::Display for PathRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRoot::Root => f.write_str("root"),
            PathRoot::Join(id) => write!(f, "{id}"),
        }
    }
}

/// Attribute reached from a root or join through embedded segments.
///
/// Empty `segments` denotes the joined element itself (element collections and
/// association leaves reached through a join).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePath {
    /// Starting context.
    pub root: PathRoot,
    /// Embedded path below the root.
    pub segments: SmallVec<[String; 4]>,
}

impl AttributePath {
    /// Path starting at `root`.
    pub fn new<I, S>(root: PathRoot, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// Binary comparison kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Boolean condition over attribute paths.
///
/// The shape mirrors the filter tree: no flattening or reordering happens
/// during compilation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// `path op value`
    Compare {
        /// Left-hand attribute.
        path: AttributePath,
        /// Comparison kind.
        op: CompareOp,
        /// Right-hand literal.
        value: Value,
    },
    /// Glob match where `*` spans any run of characters.
    Like {
        /// Text attribute.
        path: AttributePath,
        /// Pattern with `*` wildcards.
        pattern: String,
        /// Inverted match.
        negated: bool,
    },
    /// `path IS [NOT] NULL`
    IsNull {
        /// Tested attribute.
        path: AttributePath,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// `path [NOT] IN (values)`
    In {
        /// Tested attribute.
        path: AttributePath,
        /// Candidates in argument order.
        values: Vec<Value>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Shorthand for [`Predicate::Compare`].
    pub fn compare(path: AttributePath, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { path, op, value }
    }

    /// Number of leaf conditions.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
            _ => 1,
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { path, op, value } => write!(f, "{path} {} {value}", op.sql()),
            Predicate::Like {
                path,
                pattern,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let sql = pattern.replace('\'', "''").replace('*', "%");
                write!(f, "{path} {not}LIKE '{sql}'")
            }
            Predicate::IsNull { path, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{path} IS {not}NULL")
            }
            Predicate::In {
                path,
                values,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{path} {not}IN (")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Predicate::And(children) => write_group(f, children, " AND "),
            Predicate::Or(children) => write_group(f, children, " OR "),
        }
    }
}
