//! Entry points turning a filter tree into a [`CriteriaQuery`].
//!
//! [`CriteriaQueryVisitor`] selects root entities, [`CountQueryVisitor`]
//! counts them. Both run the same compile routine and differ only in the
//! projection they set, so for one filter and one dataset the number of
//! selected rows always equals the count. [`PredicateVisitor`] compiles a
//! bare predicate into a query the caller already owns.
//!
//! Visitors hold configuration only. Each compile starts from a fresh query
//! and therefore a fresh join cache, so `compile` takes `&self`.

use std::sync::Arc;

use tracing::debug;

use crate::config::{CompilerOptions, ConfigError};
use crate::query::ast::Node;
use crate::query::coerce::DefaultArgumentParser;
use crate::query::criteria::{CriteriaQuery, Projection};
use crate::query::dispatch::BuildContext;
use crate::query::errors::{CompileError, CompileResult};
use crate::query::metadata::MetadataProvider;
use crate::query::predicate::{PathRoot, Predicate};
use crate::query::resolve::Origin;
use crate::query::tools::BuilderTools;
use crate::types::EntityId;

fn compile_predicate(
    metadata: &dyn MetadataProvider,
    tools: &BuilderTools,
    options: &CompilerOptions,
    origin: Origin,
    query: &mut CriteriaQuery,
    node: &Node,
) -> CompileResult<Predicate> {
    BuildContext::new(metadata, tools, options, origin, query).build(node)
}

fn compile_query(
    metadata: &dyn MetadataProvider,
    tools: &BuilderTools,
    options: &CompilerOptions,
    mut query: CriteriaQuery,
    projection: Projection,
    node: &Node,
) -> CompileResult<CriteriaQuery> {
    query.set_projection(projection);
    debug!(root = %query.root(), ?projection, "compiling filter");
    let origin = Origin::root(query.root());
    let predicate = compile_predicate(metadata, tools, options, origin, &mut query, node)?;
    query.set_filter(Some(predicate));
    if options.distinct {
        query.distinct(true);
    }
    debug!(joins = query.join_count(), "compiled filter");
    Ok(query)
}

/// Validates `options` and installs a parser for their date formats.
fn configure(
    tools: &mut BuilderTools,
    options: CompilerOptions,
) -> Result<CompilerOptions, ConfigError> {
    options.validate()?;
    let parser = DefaultArgumentParser::from_options(&options)?;
    tools.set_argument_parser(Some(Arc::new(parser)));
    Ok(options)
}

/// Configuration shared by the query visitors.
struct VisitorState<'m> {
    metadata: &'m dyn MetadataProvider,
    root: EntityId,
    tools: BuilderTools,
    options: CompilerOptions,
}

impl<'m> VisitorState<'m> {
    fn new(metadata: &'m dyn MetadataProvider, root: EntityId) -> Self {
        Self {
            metadata,
            root,
            tools: BuilderTools::default(),
            options: CompilerOptions::default(),
        }
    }

    fn apply_options(&mut self, options: CompilerOptions) -> Result<(), ConfigError> {
        self.options = configure(&mut self.tools, options)?;
        Ok(())
    }

    fn compile(
        &self,
        query: CriteriaQuery,
        projection: Projection,
        node: &Node,
    ) -> CompileResult<CriteriaQuery> {
        compile_query(
            self.metadata,
            &self.tools,
            &self.options,
            query,
            projection,
            node,
        )
    }
}

/// Compiles filters into queries selecting root entities.
pub struct CriteriaQueryVisitor<'m> {
    state: VisitorState<'m>,
}

impl<'m> CriteriaQueryVisitor<'m> {
    /// Visitor for filters over `root` with default tools and options.
    pub fn new(metadata: &'m dyn MetadataProvider, root: EntityId) -> Self {
        Self {
            state: VisitorState::new(metadata, root),
        }
    }

    /// Applies options; the argument parser is rebuilt from them.
    pub fn with_options(mut self, options: CompilerOptions) -> Result<Self, ConfigError> {
        self.state.apply_options(options)?;
        Ok(self)
    }

    /// Root entity type.
    pub fn root(&self) -> EntityId {
        self.state.root
    }

    /// Options in effect.
    pub fn options(&self) -> &CompilerOptions {
        &self.state.options
    }

    /// Tools in effect.
    pub fn builder_tools(&self) -> &BuilderTools {
        &self.state.tools
    }

    /// Mutable access for swapping individual tools.
    pub fn builder_tools_mut(&mut self) -> &mut BuilderTools {
        &mut self.state.tools
    }

    /// Replaces the tools; `None` installs defaults.
    pub fn set_builder_tools(&mut self, tools: Option<BuilderTools>) {
        self.state.tools = tools.unwrap_or_default();
    }

    /// Compiles `node` into a fresh selection query.
    pub fn compile(&self, node: &Node) -> CompileResult<CriteriaQuery> {
        self.compile_into(CriteriaQuery::select(self.state.root), node)
    }

    /// Compiles `node` into `query`, reusing joins the caller established.
    pub fn compile_into(&self, query: CriteriaQuery, node: &Node) -> CompileResult<CriteriaQuery> {
        self.state.compile(query, Projection::Entities, node)
    }
}

/// Compiles filters into queries counting root entities.
pub struct CountQueryVisitor<'m> {
    state: VisitorState<'m>,
}

impl<'m> CountQueryVisitor<'m> {
    /// Visitor for filters over `root` with default tools and options.
    pub fn new(metadata: &'m dyn MetadataProvider, root: EntityId) -> Self {
        Self {
            state: VisitorState::new(metadata, root),
        }
    }

    /// Applies options; the argument parser is rebuilt from them.
    pub fn with_options(mut self, options: CompilerOptions) -> Result<Self, ConfigError> {
        self.state.apply_options(options)?;
        Ok(self)
    }

    /// Root entity type.
    pub fn root(&self) -> EntityId {
        self.state.root
    }

    /// Options in effect.
    pub fn options(&self) -> &CompilerOptions {
        &self.state.options
    }

    /// Tools in effect.
    pub fn builder_tools(&self) -> &BuilderTools {
        &self.state.tools
    }

    /// Mutable access for swapping individual tools.
    pub fn builder_tools_mut(&mut self) -> &mut BuilderTools {
        &mut self.state.tools
    }

    /// Replaces the tools; `None` installs defaults.
    pub fn set_builder_tools(&mut self, tools: Option<BuilderTools>) {
        self.state.tools = tools.unwrap_or_default();
    }

    /// Compiles `node` into a fresh count query.
    pub fn compile(&self, node: &Node) -> CompileResult<CriteriaQuery> {
        self.compile_into(CriteriaQuery::count(self.state.root), node)
    }

    /// Compiles `node` into `query`, reusing joins the caller established.
    pub fn compile_into(&self, query: CriteriaQuery, node: &Node) -> CompileResult<CriteriaQuery> {
        self.state.compile(query, Projection::Count, node)
    }
}

/// Compiles a bare predicate against a context of a query the caller owns.
pub struct PredicateVisitor<'m> {
    metadata: &'m dyn MetadataProvider,
    root: Option<PathRoot>,
    tools: BuilderTools,
    options: CompilerOptions,
}

impl<'m> PredicateVisitor<'m> {
    /// Visitor without a root; [`PredicateVisitor::define_root`] must follow.
    pub fn new(metadata: &'m dyn MetadataProvider) -> Self {
        Self {
            metadata,
            root: None,
            tools: BuilderTools::default(),
            options: CompilerOptions::default(),
        }
    }

    /// Applies `options`, replacing the argument parser with one that knows
    /// the configured date formats.
    pub fn with_options(mut self, options: CompilerOptions) -> Result<Self, ConfigError> {
        self.options = configure(&mut self.tools, options)?;
        Ok(self)
    }

    /// Sets the context selectors start from: the query root or one of its
    /// entity joins. The entity type is read from the query at visit time.
    pub fn define_root(&mut self, context: PathRoot) -> &mut Self {
        self.root = Some(context);
        self
    }

    /// Root context defined so far.
    pub fn root(&self) -> Option<PathRoot> {
        self.root
    }

    /// Options in effect.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Tools in effect.
    pub fn builder_tools(&self) -> &BuilderTools {
        &self.tools
    }

    /// Mutable access for swapping individual tools.
    pub fn builder_tools_mut(&mut self) -> &mut BuilderTools {
        &mut self.tools
    }

    /// Replaces the tools; `None` installs defaults.
    pub fn set_builder_tools(&mut self, tools: Option<BuilderTools>) {
        self.tools = tools.unwrap_or_default();
    }

    /// Compiles `node`, registering any joins on `query`.
    ///
    /// Fails with [`CompileError::RootNotInQuery`] when the defined context is
    /// not an entity context of `query`.
    pub fn visit(&self, node: &Node, query: &mut CriteriaQuery) -> CompileResult<Predicate> {
        let context = self.root.ok_or(CompileError::UndefinedRoot)?;
        let entity = query
            .entity_of(context)
            .ok_or_else(|| CompileError::RootNotInQuery {
                context: context.to_string(),
            })?;
        compile_predicate(
            self.metadata,
            &self.tools,
            &self.options,
            Origin { context, entity },
            query,
            node,
        )
    }
}
