//! Compiles RSQL-style filter trees into typed criteria queries.
//!
//! A caller hands over a parsed filter (`name==*Course;department.id=in=(1,2)`
//! as a [`query::Node`] tree), a root entity type and a metadata provider, and
//! receives a [`query::CriteriaQuery`] with deduplicated joins and a composed
//! predicate, ready for an execution layer.

#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod query;
pub mod types;
