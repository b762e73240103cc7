//! Structured query produced by the visitors.
//!
//! A [`CriteriaQuery`] owns everything one compile pass creates: the joins
//! (deduplicated through the join cache), the filter predicate and the
//! projection. A fresh query is created per compile, so the cache never
//! outlives the query it belongs to.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::query::errors::{CompileError, CompileResult};
use crate::query::metadata::{AttributeType, MetadataProvider, PropertyKind};
use crate::query::predicate::{PathRoot, Predicate};
use crate::types::{EntityId, JoinId};

/// What the query returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Matching root entities.
    Entities,
    /// Number of matches.
    Count,
}

/// What a join yields per matching parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinTarget {
    /// Rows of an associated entity.
    Entity(EntityId),
    /// Elements of a collection of basic values.
    Elements(AttributeType),
}

/// How parents without a matching target are treated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Parents without targets are dropped.
    #[default]
    Inner,
    /// Parents without targets are kept with a null binding.
    Left,
}

impl JoinType {
    fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// One traversed association step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    /// Handle used by attribute paths.
    pub id: JoinId,
    /// Context the association is read from.
    pub parent: PathRoot,
    /// Dotted path of the association within `parent`, embedded prefix included.
    pub path: String,
    /// What the join produces.
    pub target: JoinTarget,
    /// Inner unless the caller established the join as left.
    pub join_type: JoinType,
    /// Caller-supplied alias usable as a selector prefix.
    pub alias: Option<String>,
}

type JoinKey = (PathRoot, String);

/// Compiled query over one root entity type.
#[derive(Clone, Debug)]
pub struct CriteriaQuery {
    root: EntityId,
    projection: Projection,
    distinct: bool,
    joins: Vec<Join>,
    join_index: FxHashMap<JoinKey, JoinId>,
    filter: Option<Predicate>,
}

impl CriteriaQuery {
    fn new(root: EntityId, projection: Projection) -> Self {
        Self {
            root,
            projection,
            distinct: false,
            joins: Vec::new(),
            join_index: FxHashMap::default(),
            filter: None,
        }
    }

    /// Query selecting root entities.
    pub fn select(root: EntityId) -> Self {
        Self::new(root, Projection::Entities)
    }

    /// Query counting root entities.
    pub fn count(root: EntityId) -> Self {
        Self::new(root, Projection::Count)
    }

    /// Root entity type.
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Current projection.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Switches the projection, keeping joins and filter.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    /// Whether each root row is returned (or counted) once.
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Sets the distinct flag.
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Joins in creation order; parents always precede their children.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Number of joins created so far.
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// Join by handle.
    pub fn join_info(&self, id: JoinId) -> Option<&Join> {
        self.joins.get(id.0 as usize)
    }

    /// Join registered under `alias`.
    pub fn join_by_alias(&self, alias: &str) -> Option<&Join> {
        self.joins
            .iter()
            .find(|join| join.alias.as_deref() == Some(alias))
    }

    /// Compiled filter, if any.
    pub fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    /// Replaces the filter.
    pub fn set_filter(&mut self, filter: Option<Predicate>) {
        self.filter = filter;
    }

    /// Entity type rows of `context` belong to; `None` for element joins.
    pub fn entity_of(&self, context: PathRoot) -> Option<EntityId> {
        match context {
            PathRoot::Root => Some(self.root),
            PathRoot::Join(id) => match &self.join_info(id)?.target {
                JoinTarget::Entity(entity) => Some(*entity),
                JoinTarget::Elements(_) => None,
            },
        }
    }

    /// Returns the join for `(parent, path)`, creating it on first use.
    pub fn fetch_join(&mut self, parent: PathRoot, path: &str, target: JoinTarget) -> JoinId {
        if let Some(id) = self.join_index.get(&(parent, path.to_owned())) {
            trace!(%parent, path, join = %id, "reusing join");
            return *id;
        }
        let id = JoinId(self.joins.len() as u32);
        debug!(%parent, path, join = %id, "creating join");
        self.joins.push(Join {
            id,
            parent,
            path: path.to_owned(),
            target,
            join_type: JoinType::Inner,
            alias: None,
        });
        self.join_index.insert((parent, path.to_owned()), id);
        id
    }

    /// Pre-establishes a join before compiling, optionally under an alias.
    ///
    /// `association` may pass through embedded attributes but must end at an
    /// association or element collection of the parent's entity. Selectors
    /// traversing the same path later reuse this join with its `join_type`.
    pub fn join(
        &mut self,
        metadata: &dyn MetadataProvider,
        parent: PathRoot,
        association: &str,
        join_type: JoinType,
        alias: Option<&str>,
    ) -> CompileResult<JoinId> {
        let mut owner = self
            .entity_of(parent)
            .ok_or_else(|| CompileError::unknown_property(association, parent.to_string()))?;
        let segments: Vec<&str> = association.split('.').collect();
        let mut target = None;
        for (idx, segment) in segments.iter().enumerate() {
            let last = idx + 1 == segments.len();
            match metadata.property(owner, segment) {
                Some(PropertyKind::Embedded(inner)) if !last => owner = inner,
                Some(PropertyKind::Association { target: entity, .. }) if last => {
                    target = Some(JoinTarget::Entity(entity));
                }
                Some(PropertyKind::ElementCollection(element)) if last => {
                    target = Some(JoinTarget::Elements(element));
                }
                _ => {
                    let owner_name = metadata
                        .entity_name(owner)
                        .unwrap_or_else(|| owner.to_string());
                    return Err(CompileError::unknown_property(*segment, owner_name));
                }
            }
        }
        let target = target
            .ok_or_else(|| CompileError::unknown_property(association, parent.to_string()))?;
        let id = self.fetch_join(parent, association, target);
        if let Some(join) = self.joins.get_mut(id.0 as usize) {
            join.join_type = join_type;
            if let Some(alias) = alias {
                join.alias = Some(alias.to_owned());
            }
        }
        Ok(id)
    }

    /// Renders the query as JPQL-like text.
    pub fn explain(&self, metadata: &dyn MetadataProvider) -> String {
        let entity = metadata
            .entity_name(self.root)
            .unwrap_or_else(|| self.root.to_string());
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let mut out = match self.projection {
            Projection::Entities => format!("SELECT {distinct}root FROM {entity} root"),
            Projection::Count => format!("SELECT COUNT({distinct}root) FROM {entity} root"),
        };
        for join in &self.joins {
            let _ = write!(
                out,
                " {} {}.{} {}",
                join.join_type.keyword(),
                join.parent,
                join.path,
                join.id
            );
        }
        if let Some(filter) = &self.filter {
            let _ = write!(out, " WHERE {filter}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::metadata::{Cardinality, InMemoryMetadata};
    use crate::query::predicate::{AttributePath, CompareOp};
    use crate::query::value::Value;

    const PERSON: EntityId = EntityId(1);
    const TITLE: EntityId = EntityId(2);
    const ADDRESS: EntityId = EntityId(3);

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_entity(PERSON, "Person")
            .with_entity(TITLE, "Title")
            .with_entity(ADDRESS, "Address")
            .with_identifier(PERSON, "id", AttributeType::Integer)
            .with_association(PERSON, "titles", TITLE, Cardinality::Collection)
            .with_element_collection(PERSON, "courses", AttributeType::Text)
            .with_embedded(PERSON, "address", ADDRESS)
            .with_association(ADDRESS, "country", TITLE, Cardinality::Single)
            .with_attribute(TITLE, "name", AttributeType::Text)
    }

    #[test]
    fn fetch_join_reuses_same_key() {
        let mut query = CriteriaQuery::select(PERSON);
        let first = query.fetch_join(PathRoot::Root, "titles", JoinTarget::Entity(TITLE));
        let second = query.fetch_join(PathRoot::Root, "titles", JoinTarget::Entity(TITLE));
        assert_eq!(first, second);
        let nested = query.fetch_join(PathRoot::Join(first), "titles", JoinTarget::Entity(TITLE));
        assert_ne!(first, nested);
        assert_eq!(query.join_count(), 2);
    }

    #[test]
    fn explicit_join_registers_alias_and_cache_entry() {
        let meta = metadata();
        let mut query = CriteriaQuery::select(PERSON);
        let id = query
            .join(&meta, PathRoot::Root, "titles", JoinType::Inner, Some("title"))
            .expect("join");
        assert_eq!(query.join_by_alias("title").map(|j| j.id), Some(id));
        let again = query.fetch_join(PathRoot::Root, "titles", JoinTarget::Entity(TITLE));
        assert_eq!(id, again);
        assert_eq!(query.entity_of(PathRoot::Join(id)), Some(TITLE));
    }

    #[test]
    fn explicit_join_walks_embedded_and_elements() {
        let meta = metadata();
        let mut query = CriteriaQuery::select(PERSON);
        let country = query
            .join(&meta, PathRoot::Root, "address.country", JoinType::Inner, None)
            .expect("embedded join");
        assert_eq!(query.join_info(country).map(|j| j.path.as_str()), Some("address.country"));
        let courses = query
            .join(&meta, PathRoot::Root, "courses", JoinType::Inner, None)
            .expect("element join");
        assert_eq!(query.entity_of(PathRoot::Join(courses)), None);
    }

    #[test]
    fn explicit_join_rejects_attributes() {
        let meta = metadata();
        let mut query = CriteriaQuery::select(PERSON);
        let err = query
            .join(&meta, PathRoot::Root, "id", JoinType::Inner, None)
            .expect_err("attribute is not joinable");
        assert_eq!(err, CompileError::unknown_property("id", "Person"));
    }

    #[test]
    fn explain_lists_joins_and_filter() {
        let meta = metadata();
        let mut query = CriteriaQuery::count(PERSON);
        let id = query.fetch_join(PathRoot::Root, "titles", JoinTarget::Entity(TITLE));
        query.distinct(true);
        query.set_filter(Some(Predicate::compare(
            AttributePath::new(PathRoot::Join(id), ["name"]),
            CompareOp::Eq,
            Value::from("Phd"),
        )));
        assert_eq!(
            query.explain(&meta),
            "SELECT COUNT(DISTINCT root) FROM Person root JOIN root.titles j0 WHERE j0.name = 'Phd'"
        );
    }

    #[test]
    fn left_join_is_kept_and_rendered() {
        let meta = metadata();
        let mut query = CriteriaQuery::select(PERSON);
        let id = query
            .join(&meta, PathRoot::Root, "titles", JoinType::Left, Some("title"))
            .expect("left join");
        let reused = query.fetch_join(PathRoot::Root, "titles", JoinTarget::Entity(TITLE));
        assert_eq!(id, reused);
        assert_eq!(query.join_info(id).map(|j| j.join_type), Some(JoinType::Left));
        assert_eq!(
            query.explain(&meta),
            "SELECT root FROM Person root LEFT JOIN root.titles j0"
        );
    }
}
