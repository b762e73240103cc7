//! Operator dispatch: one comparison node in, one predicate out.
//!
//! Built-in operators are handled here directly. Symbols outside the built-in
//! table go to the [`PredicateBuilderStrategy`] installed in the
//! [`BuilderTools`], if any; the strategy gets the raw node and the whole
//! [`BuildContext`], so it can resolve paths itself or rewrite the node and
//! hand it back through [`BuildContext::build_default`].

use tracing::trace;

use crate::config::CompilerOptions;
use crate::query::ast::{ComparisonNode, ComparisonOperator, LogicalNode, Node, NodeVisitor};
use crate::query::compose::compose_logical;
use crate::query::criteria::CriteriaQuery;
use crate::query::errors::{CompileError, CompileResult};
use crate::query::metadata::MetadataProvider;
use crate::query::predicate::{CompareOp, Predicate};
use crate::query::resolve::{AttributeRef, Origin, PathResolver, ResolvedPath};
use crate::query::tools::BuilderTools;
use crate::query::value::Value;

/// Custom handling for comparison operators outside the built-in table.
pub trait PredicateBuilderStrategy: Send + Sync {
    /// Builds a predicate for `node`, whose operator is not built in.
    fn build(&self, node: &ComparisonNode, ctx: &mut BuildContext<'_>)
        -> CompileResult<Predicate>;
}

/// State of one compile pass, shared by dispatch and composition.
pub struct BuildContext<'a> {
    metadata: &'a dyn MetadataProvider,
    tools: &'a BuilderTools,
    options: &'a CompilerOptions,
    origin: Origin,
    query: &'a mut CriteriaQuery,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        metadata: &'a dyn MetadataProvider,
        tools: &'a BuilderTools,
        options: &'a CompilerOptions,
        origin: Origin,
        query: &'a mut CriteriaQuery,
    ) -> Self {
        Self {
            metadata,
            tools,
            options,
            origin,
            query,
        }
    }

    /// Metadata provider for this compile.
    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata
    }

    /// Tools in effect.
    pub fn tools(&self) -> &BuilderTools {
        self.tools
    }

    /// Query being built; joins created so far are visible here.
    pub fn query(&self) -> &CriteriaQuery {
        self.query
    }

    /// Where selectors start.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Resolves a selector, joining through the query's join cache.
    pub fn resolve(&mut self, selector: &str) -> CompileResult<ResolvedPath> {
        PathResolver::new(self.metadata, self.tools.property_mapper()).resolve(
            self.query,
            self.origin,
            selector,
        )
    }

    /// Coerces one literal; the null token becomes [`Value::Null`] untouched.
    pub fn coerce(&self, argument: &str, attribute: &AttributeRef) -> CompileResult<Value> {
        if argument == self.options.null_token {
            return Ok(Value::Null);
        }
        self.tools.argument_parser().parse(argument, &attribute.ty)
    }

    /// Compiles any node.
    pub fn build(&mut self, node: &Node) -> CompileResult<Predicate> {
        node.accept(self)
    }

    /// Compiles a comparison, consulting the custom strategy for unknown symbols.
    pub fn build_comparison(&mut self, node: &ComparisonNode) -> CompileResult<Predicate> {
        let tools = self.tools;
        if ComparisonOperator::parse(&node.operator).is_none() {
            if let Some(strategy) = tools.predicate_builder() {
                trace!(operator = %node.operator, "delegating to custom predicate builder");
                return strategy.build(node, self);
            }
        }
        self.build_default(node)
    }

    /// Compiles a comparison with the built-in operator table only.
    pub fn build_default(&mut self, node: &ComparisonNode) -> CompileResult<Predicate> {
        let op = ComparisonOperator::parse(&node.operator)
            .ok_or_else(|| CompileError::unknown_operator(&node.operator))?;
        let resolved = self.resolve(&node.selector)?;
        self.build_resolved(op, &node.operator, resolved, &node.arguments)
    }

    fn build_resolved(
        &self,
        op: ComparisonOperator,
        symbol: &str,
        resolved: ResolvedPath,
        arguments: &[String],
    ) -> CompileResult<Predicate> {
        let ResolvedPath { path, attribute } = resolved;
        let arity_error = || CompileError::InvalidArgumentCount {
            operator: symbol.to_owned(),
            found: arguments.len(),
        };

        if op.is_multi_valued() {
            if arguments.is_empty() {
                return Err(arity_error());
            }
            let values = arguments
                .iter()
                .map(|argument| self.coerce(argument, &attribute))
                .collect::<CompileResult<Vec<_>>>()?;
            return Ok(Predicate::In {
                path,
                values,
                negated: op == ComparisonOperator::NotIn,
            });
        }

        let [argument] = arguments else {
            return Err(arity_error());
        };
        let equality = matches!(op, ComparisonOperator::Equal | ComparisonOperator::NotEqual);
        let negated = op == ComparisonOperator::NotEqual;

        if *argument == self.options.null_token {
            if equality {
                return Ok(Predicate::IsNull { path, negated });
            }
            return Err(CompileError::mismatch(
                argument.as_str(),
                format!("a non-null {} for {symbol}", attribute.ty),
            ));
        }
        if equality && attribute.ty.is_textual() && argument.contains('*') {
            return Ok(Predicate::Like {
                path,
                pattern: argument.clone(),
                negated,
            });
        }

        let value = self.coerce(argument, &attribute)?;
        if op.requires_ordering() && !attribute.ty.is_orderable() {
            return Err(CompileError::NotComparable {
                type_name: attribute.ty.type_name().to_owned(),
                operator: symbol.to_owned(),
            });
        }
        let compare = match op {
            ComparisonOperator::Equal => CompareOp::Eq,
            ComparisonOperator::NotEqual => CompareOp::Ne,
            ComparisonOperator::GreaterThan => CompareOp::Gt,
            ComparisonOperator::GreaterThanOrEqual => CompareOp::Ge,
            ComparisonOperator::LessThan => CompareOp::Lt,
            ComparisonOperator::LessThanOrEqual => CompareOp::Le,
            ComparisonOperator::In | ComparisonOperator::NotIn => {
                return Err(CompileError::unknown_operator(symbol))
            }
        };
        Ok(Predicate::compare(path, compare, value))
    }
}

impl NodeVisitor for BuildContext<'_> {
    type Output = CompileResult<Predicate>;

    fn visit_comparison(&mut self, node: &ComparisonNode) -> Self::Output {
        self.build_comparison(node)
    }

    fn visit_logical(&mut self, node: &LogicalNode) -> Self::Output {
        compose_logical(self, node)
    }

    fn visit_extension(&mut self, kind: &str) -> Self::Output {
        Err(CompileError::UnsupportedNodeType {
            kind: kind.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::query::metadata::{AttributeType, Cardinality, InMemoryMetadata};
    use crate::query::predicate::{AttributePath, PathRoot};
    use crate::types::{EntityId, JoinId};

    const COURSE: EntityId = EntityId(1);
    const DEPARTMENT: EntityId = EntityId(2);

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_entity(COURSE, "Course")
            .with_entity(DEPARTMENT, "Department")
            .with_identifier(COURSE, "id", AttributeType::Integer)
            .with_attribute(COURSE, "name", AttributeType::Text)
            .with_attribute(
                COURSE,
                "fee",
                AttributeType::Object {
                    type_name: "Money".into(),
                    comparable: false,
                },
            )
            .with_association(COURSE, "department", DEPARTMENT, Cardinality::Single)
            .with_identifier(DEPARTMENT, "id", AttributeType::Integer)
    }

    fn compile_with(tools: &BuilderTools, node: &Node) -> CompileResult<(Predicate, CriteriaQuery)> {
        let meta = metadata();
        let options = CompilerOptions::default();
        let mut query = CriteriaQuery::select(COURSE);
        let predicate = {
            let mut ctx =
                BuildContext::new(&meta, tools, &options, Origin::root(COURSE), &mut query);
            ctx.build(node)?
        };
        Ok((predicate, query))
    }

    fn compile(node: &Node) -> CompileResult<Predicate> {
        compile_with(&BuilderTools::default(), node).map(|(predicate, _)| predicate)
    }

    fn root(segment: &str) -> AttributePath {
        AttributePath::new(PathRoot::Root, [segment])
    }

    #[test]
    fn equality_coerces_argument() {
        let predicate = compile(&Node::comparison("id", "==", ["1"])).expect("compile");
        assert_eq!(predicate, Predicate::compare(root("id"), CompareOp::Eq, Value::Int(1)));
    }

    #[test]
    fn wildcard_turns_into_like() {
        let predicate = compile(&Node::comparison("name", "!=", ["*Course"])).expect("compile");
        assert_eq!(
            predicate,
            Predicate::Like {
                path: root("name"),
                pattern: "*Course".into(),
                negated: true
            }
        );
    }

    #[test]
    fn null_token_becomes_null_test() {
        let predicate = compile(&Node::comparison("name", "==", ["null"])).expect("compile");
        assert_eq!(
            predicate,
            Predicate::IsNull {
                path: root("name"),
                negated: false
            }
        );
        let err = compile(&Node::comparison("id", "=gt=", ["null"])).expect_err("null ordering");
        assert!(matches!(err, CompileError::ArgumentTypeMismatch { .. }));
    }

    #[test]
    fn membership_keeps_order_and_duplicates() {
        let predicate =
            compile(&Node::comparison("id", "=out=", ["3", "1", "3"])).expect("compile");
        assert_eq!(
            predicate,
            Predicate::In {
                path: root("id"),
                values: vec![Value::Int(3), Value::Int(1), Value::Int(3)],
                negated: true
            }
        );
    }

    #[test]
    fn ordering_requires_comparable_type() {
        let err = compile(&Node::comparison("fee", "=ge=", ["10"])).expect_err("money");
        assert_eq!(
            err,
            CompileError::NotComparable {
                type_name: "Money".into(),
                operator: "=ge=".into()
            }
        );
        let err = compile(&Node::comparison("department", ">", ["1"])).expect_err("reference");
        assert!(matches!(err, CompileError::NotComparable { .. }));
    }

    #[test]
    fn coercion_failure_precedes_comparability() {
        let err = compile(&Node::comparison("department", "=gt=", ["x"])).expect_err("bad id");
        assert!(matches!(err, CompileError::ArgumentTypeMismatch { .. }));
    }

    #[test]
    fn arity_is_checked() {
        let err = compile(&Node::comparison("id", "==", ["1", "2"])).expect_err("two args");
        assert_eq!(
            err,
            CompileError::InvalidArgumentCount {
                operator: "==".into(),
                found: 2
            }
        );
        let empty: [&str; 0] = [];
        assert!(compile(&Node::comparison("id", "=in=", empty)).is_err());
    }

    #[test]
    fn unknown_operator_without_strategy_fails() {
        let err = compile(&Node::comparison("id", "=def=", ["1"])).expect_err("unknown");
        assert_eq!(err, CompileError::unknown_operator("=def="));
    }

    struct DelegateToEquality;

    impl PredicateBuilderStrategy for DelegateToEquality {
        fn build(
            &self,
            node: &ComparisonNode,
            ctx: &mut BuildContext<'_>,
        ) -> CompileResult<Predicate> {
            let rewritten = ComparisonNode {
                operator: "==".into(),
                ..node.clone()
            };
            ctx.build_default(&rewritten)
        }
    }

    #[test]
    fn custom_strategy_handles_unknown_symbols() {
        let mut tools = BuilderTools::default();
        tools.set_predicate_builder(Some(Arc::new(DelegateToEquality)));
        let (predicate, query) =
            compile_with(&tools, &Node::comparison("department.id", "=def=", ["1"])).expect("custom");
        assert_eq!(
            predicate,
            Predicate::compare(
                AttributePath::new(PathRoot::Join(JoinId(0)), ["id"]),
                CompareOp::Eq,
                Value::Int(1)
            )
        );
        assert_eq!(query.join_count(), 1);
    }

    #[test]
    fn extension_nodes_are_rejected() {
        let err = compile(&Node::Extension {
            kind: "OtherNode".into(),
        })
        .expect_err("unsupported");
        assert_eq!(
            err,
            CompileError::UnsupportedNodeType {
                kind: "OtherNode".into()
            }
        );
    }
}
