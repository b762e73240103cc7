//! Fluent construction of filter trees without going through text.

use crate::query::ast::{LogicalOperator, Node};

/// Builds a [`Node`] tree one comparison at a time.
///
/// ```
/// use rsql_criteria::query::builder::FilterBuilder;
///
/// let mut filter = FilterBuilder::and();
/// filter
///     .eq("department.code", "MI-MDW")
///     .or_group(|g| {
///         g.lt("credits", "5").is_null("name");
///     });
/// let node = filter.finish().expect("non-empty filter");
/// # let _ = node;
/// ```
#[derive(Clone, Debug)]
pub struct FilterBuilder {
    mode: LogicalOperator,
    nodes: Vec<Node>,
}

impl FilterBuilder {
    /// Builder whose top-level comparisons are ANDed.
    pub fn and() -> Self {
        Self::with_mode(LogicalOperator::And)
    }

    /// Builder whose top-level comparisons are ORed.
    pub fn or() -> Self {
        Self::with_mode(LogicalOperator::Or)
    }

    fn with_mode(mode: LogicalOperator) -> Self {
        Self {
            mode,
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    fn single(&mut self, selector: impl Into<String>, op: &str, argument: impl Into<String>) -> &mut Self {
        self.push(Node::comparison(selector, op, [argument.into()]))
    }

    /// Single node, group of all nodes, or `None` when nothing was added.
    pub fn finish(self) -> Option<Node> {
        match self.nodes.len() {
            0 => None,
            1 => self.nodes.into_iter().next(),
            _ => Some(Node::logical(self.mode.symbol(), self.nodes)),
        }
    }

    /// `selector==argument`; `*` in text arguments is a wildcard.
    pub fn eq(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "==", argument)
    }

    /// `selector!=argument`
    pub fn ne(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "!=", argument)
    }

    /// `selector=gt=argument`
    pub fn gt(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "=gt=", argument)
    }

    /// `selector=ge=argument`
    pub fn ge(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "=ge=", argument)
    }

    /// `selector=lt=argument`
    pub fn lt(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "=lt=", argument)
    }

    /// `selector=le=argument`
    pub fn le(&mut self, selector: impl Into<String>, argument: impl Into<String>) -> &mut Self {
        self.single(selector, "=le=", argument)
    }

    /// `selector=in=(arguments)`
    pub fn in_list<I, A>(&mut self, selector: impl Into<String>, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.push(Node::comparison(selector, "=in=", arguments))
    }

    /// `selector=out=(arguments)`
    pub fn not_in<I, A>(&mut self, selector: impl Into<String>, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.push(Node::comparison(selector, "=out=", arguments))
    }

    /// `selector==null` with the default null token.
    pub fn is_null(&mut self, selector: impl Into<String>) -> &mut Self {
        self.single(selector, "==", "null")
    }

    /// `selector!=null` with the default null token.
    pub fn is_not_null(&mut self, selector: impl Into<String>) -> &mut Self {
        self.single(selector, "!=", "null")
    }

    /// Comparison with an arbitrary operator symbol.
    pub fn custom<I, A>(
        &mut self,
        selector: impl Into<String>,
        operator: impl Into<String>,
        arguments: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.push(Node::comparison(selector, operator, arguments))
    }

    /// Nests a group of comparisons combined with AND.
    pub fn and_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut FilterBuilder),
    {
        self.group(LogicalOperator::And, build)
    }

    /// Nests a group of comparisons combined with OR.
    pub fn or_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut FilterBuilder),
    {
        self.group(LogicalOperator::Or, build)
    }

    /// Empty groups are dropped.
    fn group<F>(&mut self, mode: LogicalOperator, build: F) -> &mut Self
    where
        F: FnOnce(&mut FilterBuilder),
    {
        let mut nested = FilterBuilder::with_mode(mode);
        build(&mut nested);
        match nested.finish() {
            Some(node) => self.push(node),
            None => self,
        }
    }
}
