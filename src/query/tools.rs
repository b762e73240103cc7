//! Pluggable pieces of the compiler bundled together.

use std::fmt;
use std::sync::Arc;

use crate::config::{CompilerOptions, ConfigError};
use crate::query::coerce::{ArgumentParser, DefaultArgumentParser};
use crate::query::dispatch::PredicateBuilderStrategy;
use crate::query::mapper::{PropertyMapper, SimpleMapper};

/// Mapper, argument parser and custom operator strategy used by a compile.
///
/// Mapper and parser always have a value: clearing them reinstalls the
/// defaults. The predicate-builder strategy is genuinely optional; `None`
/// means unknown operators are rejected.
#[derive(Clone)]
pub struct BuilderTools {
    property_mapper: Arc<dyn PropertyMapper>,
    argument_parser: Arc<dyn ArgumentParser>,
    predicate_builder: Option<Arc<dyn PredicateBuilderStrategy>>,
}

impl Default for BuilderTools {
    fn default() -> Self {
        Self {
            property_mapper: Arc::new(SimpleMapper::default()),
            argument_parser: Arc::new(DefaultArgumentParser::default()),
            predicate_builder: None,
        }
    }
}

impl fmt::Debug for BuilderTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderTools")
            .field("predicate_builder", &self.predicate_builder.is_some())
            .finish_non_exhaustive()
    }
}

impl BuilderTools {
    /// Default tools with the argument parser configured from `options`.
    pub fn from_options(options: &CompilerOptions) -> Result<Self, ConfigError> {
        Ok(Self {
            argument_parser: Arc::new(DefaultArgumentParser::from_options(options)?),
            ..Self::default()
        })
    }

    /// Mapper in effect.
    pub fn property_mapper(&self) -> &dyn PropertyMapper {
        self.property_mapper.as_ref()
    }

    /// Installs a mapper; `None` reinstalls an empty [`SimpleMapper`].
    pub fn set_property_mapper(&mut self, mapper: Option<Arc<dyn PropertyMapper>>) -> &mut Self {
        self.property_mapper = mapper.unwrap_or_else(|| Arc::new(SimpleMapper::default()));
        self
    }

    /// Argument parser in effect.
    pub fn argument_parser(&self) -> &dyn ArgumentParser {
        self.argument_parser.as_ref()
    }

    /// Installs a parser; `None` reinstalls [`DefaultArgumentParser`].
    pub fn set_argument_parser(&mut self, parser: Option<Arc<dyn ArgumentParser>>) -> &mut Self {
        self.argument_parser =
            parser.unwrap_or_else(|| Arc::new(DefaultArgumentParser::default()));
        self
    }

    /// Custom strategy for unknown operators, if one is installed.
    pub fn predicate_builder(&self) -> Option<&dyn PredicateBuilderStrategy> {
        self.predicate_builder.as_deref()
    }

    /// Installs or removes the custom strategy.
    pub fn set_predicate_builder(
        &mut self,
        strategy: Option<Arc<dyn PredicateBuilderStrategy>>,
    ) -> &mut Self {
        self.predicate_builder = strategy;
        self
    }
}
