//! Filter tree handed over by the expression parser.
//!
//! The grammar is owned elsewhere; this module only fixes the shape of its
//! output. Two node kinds are understood: comparisons (`selector op args`) and
//! logical groups (`;` for AND, `,` for OR). Anything else a parser extension
//! produces arrives as [`Node::Extension`] and is rejected by the compiler.

use serde::{Deserialize, Serialize};

/// Node of a parsed filter expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// `selector op args` leaf.
    Comparison(ComparisonNode),
    /// AND/OR group.
    Logical(LogicalNode),
    /// Node kind this compiler does not understand.
    Extension {
        /// Name of the concrete node kind.
        kind: String,
    },
}

/// `selector op args` leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonNode {
    /// Dotted property path.
    pub selector: String,
    /// Operator symbol as written, e.g. `==` or `=gt=`.
    pub operator: String,
    /// Literal arguments in source order.
    pub arguments: Vec<String>,
}

/// Group of child nodes joined by one logical operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    /// Operator symbol as written, e.g. `;` or `,`.
    pub operator: String,
    /// Children in source order.
    pub children: Vec<Node>,
}

/// Comparison operators with built-in semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `=gt=` or `>`
    GreaterThan,
    /// `=ge=` or `>=`
    GreaterThanOrEqual,
    /// `=lt=` or `<`
    LessThan,
    /// `=le=` or `<=`
    LessThanOrEqual,
    /// `=in=`
    In,
    /// `=out=`
    NotIn,
}

impl ComparisonOperator {
    /// Recognizes a built-in symbol.
    pub fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => ComparisonOperator::Equal,
            "!=" => ComparisonOperator::NotEqual,
            "=gt=" | ">" => ComparisonOperator::GreaterThan,
            "=ge=" | ">=" => ComparisonOperator::GreaterThanOrEqual,
            "=lt=" | "<" => ComparisonOperator::LessThan,
            "=le=" | "<=" => ComparisonOperator::LessThanOrEqual,
            "=in=" => ComparisonOperator::In,
            "=out=" => ComparisonOperator::NotIn,
            _ => return None,
        })
    }

    /// Canonical symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::GreaterThan => "=gt=",
            ComparisonOperator::GreaterThanOrEqual => "=ge=",
            ComparisonOperator::LessThan => "=lt=",
            ComparisonOperator::LessThanOrEqual => "=le=",
            ComparisonOperator::In => "=in=",
            ComparisonOperator::NotIn => "=out=",
        }
    }

    /// Operators that need an ordering on the attribute type.
    pub fn requires_ordering(self) -> bool {
        matches!(
            self,
            ComparisonOperator::GreaterThan
                | ComparisonOperator::GreaterThanOrEqual
                | ComparisonOperator::LessThan
                | ComparisonOperator::LessThanOrEqual
        )
    }

    /// Operators taking an argument list rather than a single value.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, ComparisonOperator::In | ComparisonOperator::NotIn)
    }
}

/// Logical combinators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// `;`
    And,
    /// `,`
    Or,
}

impl LogicalOperator {
    /// Recognizes `;`/`and` and `,`/`or`.
    pub fn parse(symbol: &str) -> Option<Self> {
        if symbol == ";" || symbol.eq_ignore_ascii_case("and") {
            Some(LogicalOperator::And)
        } else if symbol == "," || symbol.eq_ignore_ascii_case("or") {
            Some(LogicalOperator::Or)
        } else {
            None
        }
    }

    /// Canonical symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::And => ";",
            LogicalOperator::Or => ",",
        }
    }
}

/// Double-dispatch entry point for walking a filter tree.
pub trait NodeVisitor {
    /// Value produced for every node.
    type Output;

    /// Called for comparison leaves.
    fn visit_comparison(&mut self, node: &ComparisonNode) -> Self::Output;
    /// Called for AND/OR groups.
    fn visit_logical(&mut self, node: &LogicalNode) -> Self::Output;
    /// Called for node kinds outside the grammar.
    fn visit_extension(&mut self, kind: &str) -> Self::Output;
}

impl Node {
    /// Builds a comparison leaf.
    pub fn comparison<S, O, I, A>(selector: S, operator: O, arguments: I) -> Self
    where
        S: Into<String>,
        O: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Node::Comparison(ComparisonNode {
            selector: selector.into(),
            operator: operator.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        })
    }

    /// Builds a logical group with an arbitrary operator symbol.
    pub fn logical(operator: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Logical(LogicalNode {
            operator: operator.into(),
            children,
        })
    }

    /// AND group.
    pub fn and(children: Vec<Node>) -> Self {
        Node::logical(LogicalOperator::And.symbol(), children)
    }

    /// OR group.
    pub fn or(children: Vec<Node>) -> Self {
        Node::logical(LogicalOperator::Or.symbol(), children)
    }

    /// Dispatches to the matching visitor method.
    pub fn accept<V: NodeVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Node::Comparison(node) => visitor.visit_comparison(node),
            Node::Logical(node) => visitor.visit_logical(node),
            Node::Extension { kind } => visitor.visit_extension(kind),
        }
    }

    /// Reads a tree from its JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_symbols_and_synonyms() {
        assert_eq!(ComparisonOperator::parse("<"), Some(ComparisonOperator::LessThan));
        assert_eq!(
            ComparisonOperator::parse("=ge=").map(ComparisonOperator::symbol),
            Some("=ge=")
        );
        assert_eq!(ComparisonOperator::parse("=def="), None);
        assert!(ComparisonOperator::In.is_multi_valued());
        assert!(ComparisonOperator::LessThanOrEqual.requires_ordering());
        assert!(!ComparisonOperator::Equal.requires_ordering());
    }

    #[test]
    fn logical_symbols() {
        assert_eq!(LogicalOperator::parse(";"), Some(LogicalOperator::And));
        assert_eq!(LogicalOperator::parse("OR"), Some(LogicalOperator::Or));
        assert_eq!(LogicalOperator::parse("^"), None);
    }

    struct Depth;

    impl NodeVisitor for Depth {
        type Output = usize;

        fn visit_comparison(&mut self, _node: &ComparisonNode) -> usize {
            1
        }

        fn visit_logical(&mut self, node: &LogicalNode) -> usize {
            1 + node
                .children
                .iter()
                .map(|child| child.accept(self))
                .max()
                .unwrap_or(0)
        }

        fn visit_extension(&mut self, _kind: &str) -> usize {
            0
        }
    }

    #[test]
    fn accept_walks_nested_groups() {
        let tree = Node::and(vec![
            Node::or(vec![Node::comparison("id", "==", ["1"])]),
            Node::comparison("code", "==", ["A"]),
        ]);
        assert_eq!(tree.accept(&mut Depth), 3);
    }

    #[test]
    fn json_form_is_tagged() {
        let tree = Node::from_json(
            r#"{"type":"logical","operator":",","children":[
                {"type":"comparison","selector":"id","operator":"==","arguments":["1"]},
                {"type":"extension","kind":"OtherNode"}
            ]}"#,
        )
        .expect("parse json");
        assert_eq!(
            tree,
            Node::or(vec![
                Node::comparison("id", "==", ["1"]),
                Node::Extension {
                    kind: "OtherNode".into()
                },
            ])
        );
    }
}
