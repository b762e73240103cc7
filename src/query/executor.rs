//! In-memory executor for compiled [`CriteriaQuery`] values.
//!
//! Storage engines are out of scope for the compiler; this executor exists so
//! callers can check compiled filters against small fixtures. Joins follow
//! inner-join semantics: every root row is expanded into one tuple per
//! reachable join target, tuples with a missing target are dropped, and the
//! filter runs against each tuple. Selection yields the root row of every
//! matching tuple and counting counts the same tuples, so both projections
//! agree by construction.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::query::criteria::{CriteriaQuery, JoinType, Projection};
use crate::query::predicate::{AttributePath, CompareOp, PathRoot, Predicate};
use crate::query::value::Value;
use crate::types::{EntityId, JoinId};

/// Errors raised while executing a query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No table was created for the entity.
    #[error("no table for entity {entity}")]
    UnknownTable {
        /// Entity without a table.
        entity: EntityId,
    },
    /// A reference points past the end of its table.
    #[error("row {row} of entity {entity} does not exist")]
    DanglingRow {
        /// Referenced entity.
        entity: EntityId,
        /// Missing row index.
        row: usize,
    },
    /// A path ended at a collection instead of a single value.
    #[error("attribute path {path} does not end at a single value")]
    NotScalar {
        /// Rendered path.
        path: String,
    },
    /// A join was declared on top of an element join.
    #[error("join {join} has no entity row to navigate from")]
    JoinWithoutRow {
        /// Offending parent join.
        join: JoinId,
    },
}

/// Result alias for the executor.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Address of one stored row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowRef {
    /// Table the row lives in.
    pub entity: EntityId,
    /// Insertion index within the table.
    pub row: usize,
}

/// Content of one field.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    /// Basic value.
    Value(Value),
    /// Inline composite.
    Embedded(Record),
    /// To-one association; `None` when unset.
    Reference(Option<RowRef>),
    /// To-many association.
    References(Vec<RowRef>),
    /// Collection of basic values.
    Elements(Vec<Value>),
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Value(Value::from(value))
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Value(Value::from(value))
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Value(Value::Int(value))
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Value(Value::Float(value))
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Datum::Value(Value::Bool(value))
    }
}

impl From<RowRef> for Datum {
    fn from(row: RowRef) -> Self {
        Datum::Reference(Some(row))
    }
}

impl From<Record> for Datum {
    fn from(record: Record) -> Self {
        Datum::Embedded(record)
    }
}

/// Named fields of a row or embedded composite.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Datum>,
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field.
    pub fn with(mut self, name: impl Into<String>, datum: impl Into<Datum>) -> Self {
        self.fields.insert(name.into(), datum.into());
        self
    }

    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.get(name)
    }
}

struct Table {
    identifier: String,
    rows: Vec<Record>,
}

/// What a query produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    /// Root rows of matching tuples, in row order.
    Entities(Vec<RowRef>),
    /// Number of matching tuples.
    Count(u64),
}

impl QueryResult {
    /// Number of rows, or the count itself.
    pub fn len(&self) -> u64 {
        match self {
            QueryResult::Entities(rows) => rows.len() as u64,
            QueryResult::Count(count) => *count,
        }
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
enum Bound {
    Row(RowRef),
    Element(Value),
    /// Left join without a target.
    Null,
}

#[derive(Clone, Debug)]
struct Tuple {
    root: RowRef,
    joins: SmallVec<[Bound; 4]>,
}

/// Tables of records keyed by entity type.
#[derive(Default)]
pub struct InMemoryStore {
    tables: FxHashMap<EntityId, Table>,
}

impl InMemoryStore {
    /// Store without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or resets) the table of `entity`.
    pub fn create_table(&mut self, entity: EntityId, identifier: impl Into<String>) {
        self.tables.insert(
            entity,
            Table {
                identifier: identifier.into(),
                rows: Vec::new(),
            },
        );
    }

    /// Appends a row and returns its address.
    pub fn insert(&mut self, entity: EntityId, record: Record) -> StoreResult<RowRef> {
        let table = self
            .tables
            .get_mut(&entity)
            .ok_or(StoreError::UnknownTable { entity })?;
        table.rows.push(record);
        Ok(RowRef {
            entity,
            row: table.rows.len() - 1,
        })
    }

    /// Replaces one field of an existing row, e.g. to close a reference cycle.
    pub fn set_field(
        &mut self,
        row: RowRef,
        name: impl Into<String>,
        datum: impl Into<Datum>,
    ) -> StoreResult<()> {
        let record = self
            .tables
            .get_mut(&row.entity)
            .ok_or(StoreError::UnknownTable { entity: row.entity })?
            .rows
            .get_mut(row.row)
            .ok_or(StoreError::DanglingRow {
                entity: row.entity,
                row: row.row,
            })?;
        record.fields.insert(name.into(), datum.into());
        Ok(())
    }

    /// Row by address.
    pub fn record(&self, row: RowRef) -> StoreResult<&Record> {
        self.table(row.entity)?
            .rows
            .get(row.row)
            .ok_or(StoreError::DanglingRow {
                entity: row.entity,
                row: row.row,
            })
    }

    fn table(&self, entity: EntityId) -> StoreResult<&Table> {
        self.tables
            .get(&entity)
            .ok_or(StoreError::UnknownTable { entity })
    }

    /// Runs the query with its own projection.
    pub fn execute(&self, query: &CriteriaQuery) -> StoreResult<QueryResult> {
        Ok(match query.projection() {
            Projection::Entities => QueryResult::Entities(self.select(query)?),
            Projection::Count => QueryResult::Count(self.count(query)?),
        })
    }

    /// Root rows matching the filter, whatever the projection.
    pub fn select(&self, query: &CriteriaQuery) -> StoreResult<Vec<RowRef>> {
        let matched = self.matching_roots(query)?;
        if !query.is_distinct() {
            return Ok(matched);
        }
        let mut seen = FxHashSet::default();
        Ok(matched.into_iter().filter(|row| seen.insert(*row)).collect())
    }

    /// Number of rows [`InMemoryStore::select`] returns.
    pub fn count(&self, query: &CriteriaQuery) -> StoreResult<u64> {
        Ok(self.select(query)?.len() as u64)
    }

    fn matching_roots(&self, query: &CriteriaQuery) -> StoreResult<Vec<RowRef>> {
        let tuples = self.expand(query)?;
        let mut matched = Vec::new();
        for tuple in &tuples {
            let keep = match query.filter() {
                Some(filter) => self.eval(filter, tuple)?,
                None => true,
            };
            if keep {
                matched.push(tuple.root);
            }
        }
        debug!(tuples = tuples.len(), matched = matched.len(), "executed query");
        Ok(matched)
    }

    fn expand(&self, query: &CriteriaQuery) -> StoreResult<Vec<Tuple>> {
        let root = query.root();
        let mut tuples: Vec<Tuple> = (0..self.table(root)?.rows.len())
            .map(|row| Tuple {
                root: RowRef { entity: root, row },
                joins: SmallVec::new(),
            })
            .collect();
        for join in query.joins() {
            let mut next = Vec::with_capacity(tuples.len());
            for tuple in tuples {
                let parent = match join.parent {
                    PathRoot::Root => Some(tuple.root),
                    PathRoot::Join(id) => match tuple.joins.get(id.0 as usize) {
                        Some(Bound::Row(row)) => Some(*row),
                        Some(Bound::Null) => None,
                        _ => return Err(StoreError::JoinWithoutRow { join: id }),
                    },
                };
                let mut targets: Vec<Bound> = match parent {
                    Some(parent) => match navigate(self.record(parent)?, join.path.split('.')) {
                        Some(Datum::Reference(Some(row))) => vec![Bound::Row(*row)],
                        Some(Datum::References(rows)) => {
                            rows.iter().copied().map(Bound::Row).collect()
                        }
                        Some(Datum::Elements(values)) => {
                            values.iter().cloned().map(Bound::Element).collect()
                        }
                        _ => Vec::new(),
                    },
                    None => Vec::new(),
                };
                if targets.is_empty() && join.join_type == JoinType::Left {
                    targets.push(Bound::Null);
                }
                for target in targets {
                    let mut expanded = tuple.clone();
                    expanded.joins.push(target);
                    next.push(expanded);
                }
            }
            tuples = next;
        }
        Ok(tuples)
    }

    fn identifier_of(&self, row: RowRef) -> StoreResult<Value> {
        let identifier = &self.table(row.entity)?.identifier;
        Ok(match self.record(row)?.get(identifier) {
            Some(Datum::Value(value)) => value.clone(),
            _ => Value::Null,
        })
    }

    fn read(&self, path: &AttributePath, tuple: &Tuple) -> StoreResult<Value> {
        let start = match path.root {
            PathRoot::Root => Bound::Row(tuple.root),
            PathRoot::Join(id) => tuple
                .joins
                .get(id.0 as usize)
                .cloned()
                .ok_or(StoreError::JoinWithoutRow { join: id })?,
        };
        let row = match start {
            Bound::Null => return Ok(Value::Null),
            Bound::Element(value) if path.segments.is_empty() => return Ok(value),
            Bound::Row(row) if path.segments.is_empty() => return self.identifier_of(row),
            Bound::Row(row) => row,
            Bound::Element(_) => {
                return Err(StoreError::NotScalar {
                    path: path.to_string(),
                })
            }
        };
        let record = self.record(row)?;
        match navigate(record, path.segments.iter().map(String::as_str)) {
            None | Some(Datum::Embedded(_)) | Some(Datum::Reference(None)) => Ok(Value::Null),
            Some(Datum::Value(value)) => Ok(value.clone()),
            Some(Datum::Reference(Some(target))) => self.identifier_of(*target),
            Some(Datum::References(_)) | Some(Datum::Elements(_)) => Err(StoreError::NotScalar {
                path: path.to_string(),
            }),
        }
    }

    fn eval(&self, predicate: &Predicate, tuple: &Tuple) -> StoreResult<bool> {
        Ok(match predicate {
            Predicate::Compare { path, op, value } => {
                let actual = self.read(path, tuple)?;
                match op {
                    CompareOp::Eq => actual.matches(value),
                    CompareOp::Ne => !actual.is_null() && !value.is_null() && !actual.matches(value),
                    CompareOp::Gt => actual.compare(value).is_some_and(|o| o.is_gt()),
                    CompareOp::Ge => actual.compare(value).is_some_and(|o| o.is_ge()),
                    CompareOp::Lt => actual.compare(value).is_some_and(|o| o.is_lt()),
                    CompareOp::Le => actual.compare(value).is_some_and(|o| o.is_le()),
                }
            }
            Predicate::Like {
                path,
                pattern,
                negated,
            } => match self.read(path, tuple)? {
                Value::String(text) => wildcard_match(&text, pattern) != *negated,
                _ => false,
            },
            Predicate::IsNull { path, negated } => self.read(path, tuple)?.is_null() != *negated,
            Predicate::In {
                path,
                values,
                negated,
            } => {
                let actual = self.read(path, tuple)?;
                let found = values.iter().any(|candidate| actual.matches(candidate));
                if *negated {
                    !actual.is_null() && !found && !values.iter().any(Value::is_null)
                } else {
                    found
                }
            }
            Predicate::And(children) => {
                for child in children {
                    if !self.eval(child, tuple)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Or(children) => {
                for child in children {
                    if self.eval(child, tuple)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }
}

fn navigate<'r, 's>(
    record: &'r Record,
    mut segments: impl Iterator<Item = &'s str>,
) -> Option<&'r Datum> {
    let mut datum = record.get(segments.next()?)?;
    for segment in segments {
        match datum {
            Datum::Embedded(inner) => datum = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(datum)
}

/// Glob match where `*` spans any run of characters, including none.
pub fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
