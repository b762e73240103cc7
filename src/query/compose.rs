//! AND/OR composition of compiled children.

use tracing::trace;

use crate::query::ast::{LogicalNode, LogicalOperator};
use crate::query::dispatch::BuildContext;
use crate::query::errors::{CompileError, CompileResult};
use crate::query::predicate::Predicate;

/// Compiles every child depth-first, in order, and combines them.
///
/// The output keeps the group structure of the input; single-child groups are
/// not collapsed.
pub(crate) fn compose_logical(
    ctx: &mut BuildContext<'_>,
    node: &LogicalNode,
) -> CompileResult<Predicate> {
    let operator =
        LogicalOperator::parse(&node.operator).ok_or_else(|| CompileError::UnknownLogicalOperator {
            symbol: node.operator.clone(),
        })?;
    trace!(operator = operator.symbol(), children = node.children.len(), "composing group");
    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        children.push(ctx.build(child)?);
    }
    Ok(match operator {
        LogicalOperator::And => Predicate::And(children),
        LogicalOperator::Or => Predicate::Or(children),
    })
}
