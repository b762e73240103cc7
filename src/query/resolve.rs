//! Selector resolution against entity metadata.
//!
//! A selector such as `department.head.titles.name` is walked one segment at
//! a time. Before each step the mapper of the current owning entity may
//! rewrite the longest matching dotted prefix of what is left. Associations
//! and element collections become joins on the query (fetched from its join
//! cache, so repeated traversals share one join). Embedded composites only
//! extend the attribute path.

use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::trace;

use crate::query::criteria::{CriteriaQuery, JoinTarget};
use crate::query::errors::{CompileError, CompileResult};
use crate::query::mapper::PropertyMapper;
use crate::query::metadata::{AttributeType, Cardinality, MetadataProvider, PropertyKind};
use crate::query::predicate::{AttributePath, PathRoot};
use crate::types::EntityId;

/// Where resolution starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    /// Query root or a join.
    pub context: PathRoot,
    /// Entity type of `context`.
    pub entity: EntityId,
}

impl Origin {
    /// Origin at the query root.
    pub fn root(entity: EntityId) -> Self {
        Self {
            context: PathRoot::Root,
            entity,
        }
    }
}

/// Leaf attribute reached by a selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeRef {
    /// Real name of the leaf property.
    pub name: String,
    /// Semantic type used for coercion and comparability checks.
    pub ty: AttributeType,
}

/// Attribute path plus the leaf it ends at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path root and embedded segments.
    pub path: AttributePath,
    /// Leaf attribute.
    pub attribute: AttributeRef,
}

/// Resolves a selector against metadata, creating or reusing joins in `query`.
pub struct PathResolver<'a> {
    metadata: &'a dyn MetadataProvider,
    mapper: &'a dyn PropertyMapper,
}

impl<'a> PathResolver<'a> {
    /// Resolver consulting `mapper` before each step.
    pub fn new(metadata: &'a dyn MetadataProvider, mapper: &'a dyn PropertyMapper) -> Self {
        Self { metadata, mapper }
    }

    fn entity_name(&self, entity: EntityId) -> String {
        self.metadata
            .entity_name(entity)
            .unwrap_or_else(|| entity.to_string())
    }

    /// Type of an association used as a leaf: the target's identifier.
    fn reference_type(&self, target: EntityId) -> CompileResult<AttributeType> {
        let identifier = self
            .metadata
            .identifier(target)
            .ok_or_else(|| CompileError::unknown_property("<identifier>", self.entity_name(target)))?;
        match self.metadata.property(target, &identifier) {
            Some(PropertyKind::Attribute(ty)) => Ok(AttributeType::Reference {
                entity: self.entity_name(target),
                identifier: Box::new(ty),
            }),
            _ => Err(CompileError::unknown_property(
                identifier,
                self.entity_name(target),
            )),
        }
    }

    /// Rewrites the longest dotted prefix of `pending` that `owner` maps.
    fn apply_alias(&self, owner: EntityId, pending: &mut VecDeque<String>) {
        for len in (1..=pending.len()).rev() {
            let key = pending
                .iter()
                .take(len)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            if let Some(real) = self.mapper.map(owner, &key) {
                trace!(entity = %owner, alias = %key, path = %real, "applying property alias");
                pending.drain(..len);
                for segment in real.split('.').rev() {
                    pending.push_front(segment.to_owned());
                }
                return;
            }
        }
    }

    /// Resolves `selector` starting at `origin`.
    ///
    /// When starting at the root, a first segment naming a join alias of
    /// `query` continues from that join.
    pub fn resolve(
        &self,
        query: &mut CriteriaQuery,
        origin: Origin,
        selector: &str,
    ) -> CompileResult<ResolvedPath> {
        let mut pending: VecDeque<String> = selector.split('.').map(str::to_owned).collect();
        let mut context = origin.context;
        let mut owner = origin.entity;
        let mut prefix: SmallVec<[String; 4]> = SmallVec::new();

        if context == PathRoot::Root {
            let aliased = pending
                .front()
                .and_then(|first| query.join_by_alias(first))
                .map(|join| (join.id, join.target.clone()));
            if let Some((id, target)) = aliased {
                pending.pop_front();
                context = PathRoot::Join(id);
                match target {
                    JoinTarget::Entity(entity) => {
                        owner = entity;
                        if pending.is_empty() {
                            return Ok(leaf(context, prefix, selector, self.reference_type(entity)?));
                        }
                    }
                    JoinTarget::Elements(ty) => {
                        return match pending.front() {
                            None => Ok(leaf(context, prefix, selector, ty)),
                            Some(next) => Err(CompileError::unknown_property(
                                next.clone(),
                                ty.type_name(),
                            )),
                        };
                    }
                }
            }
        }

        loop {
            self.apply_alias(owner, &mut pending);
            let Some(segment) = pending.pop_front() else {
                return Err(CompileError::unknown_property(
                    selector,
                    self.entity_name(owner),
                ));
            };
            let kind = self
                .metadata
                .property(owner, &segment)
                .ok_or_else(|| CompileError::unknown_property(&segment, self.entity_name(owner)))?;
            let at_leaf = pending.is_empty();
            match kind {
                PropertyKind::Attribute(ty) => {
                    if let Some(next) = pending.front() {
                        return Err(CompileError::unknown_property(next.clone(), ty.type_name()));
                    }
                    prefix.push(segment.clone());
                    return Ok(leaf(context, prefix, &segment, ty));
                }
                PropertyKind::Embedded(inner) => {
                    prefix.push(segment.clone());
                    owner = inner;
                    if at_leaf {
                        let ty = AttributeType::Object {
                            type_name: self.entity_name(inner),
                            comparable: false,
                        };
                        return Ok(leaf(context, prefix, &segment, ty));
                    }
                }
                PropertyKind::Association {
                    target,
                    cardinality,
                } => {
                    prefix.push(segment.clone());
                    if at_leaf && cardinality == Cardinality::Single {
                        let ty = self.reference_type(target)?;
                        return Ok(leaf(context, prefix, &segment, ty));
                    }
                    let join = query.fetch_join(context, &prefix.join("."), JoinTarget::Entity(target));
                    context = PathRoot::Join(join);
                    prefix.clear();
                    owner = target;
                    if at_leaf {
                        let ty = self.reference_type(target)?;
                        return Ok(leaf(context, prefix, &segment, ty));
                    }
                }
                PropertyKind::ElementCollection(ty) => {
                    if let Some(next) = pending.front() {
                        return Err(CompileError::unknown_property(next.clone(), ty.type_name()));
                    }
                    prefix.push(segment.clone());
                    let join =
                        query.fetch_join(context, &prefix.join("."), JoinTarget::Elements(ty.clone()));
                    return Ok(leaf(PathRoot::Join(join), SmallVec::new(), &segment, ty));
                }
            }
        }
    }
}

fn leaf(
    context: PathRoot,
    segments: SmallVec<[String; 4]>,
    name: &str,
    ty: AttributeType,
) -> ResolvedPath {
    ResolvedPath {
        path: AttributePath {
            root: context,
            segments,
        },
        attribute: AttributeRef {
            name: name.to_owned(),
            ty,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::criteria::JoinType;
    use crate::query::mapper::SimpleMapper;
    use crate::query::metadata::InMemoryMetadata;
    use crate::types::JoinId;

    const COURSE: EntityId = EntityId(1);
    const DEPARTMENT: EntityId = EntityId(2);
    const DETAILS: EntityId = EntityId(3);
    const TEACHER: EntityId = EntityId(4);

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_entity(COURSE, "Course")
            .with_entity(DEPARTMENT, "Department")
            .with_entity(DETAILS, "CourseDetails")
            .with_entity(TEACHER, "Teacher")
            .with_identifier(COURSE, "id", AttributeType::Integer)
            .with_attribute(COURSE, "code", AttributeType::Text)
            .with_association(COURSE, "department", DEPARTMENT, Cardinality::Single)
            .with_embedded(COURSE, "details", DETAILS)
            .with_element_collection(COURSE, "tags", AttributeType::Text)
            .with_identifier(DEPARTMENT, "id", AttributeType::Integer)
            .with_attribute(DEPARTMENT, "code", AttributeType::Text)
            .with_attribute(DETAILS, "description", AttributeType::Text)
            .with_association(DETAILS, "teacher", TEACHER, Cardinality::Single)
            .with_identifier(TEACHER, "id", AttributeType::Integer)
            .with_attribute(TEACHER, "specialtyDescription", AttributeType::Text)
    }

    fn resolve(
        mapper: &SimpleMapper,
        query: &mut CriteriaQuery,
        selector: &str,
    ) -> CompileResult<ResolvedPath> {
        let meta = metadata();
        PathResolver::new(&meta, mapper).resolve(query, Origin::root(COURSE), selector)
    }

    #[test]
    fn plain_attribute_resolves_on_root() {
        let mut query = CriteriaQuery::select(COURSE);
        let resolved = resolve(&SimpleMapper::new(), &mut query, "code").expect("resolve");
        assert_eq!(resolved.path, AttributePath::new(PathRoot::Root, ["code"]));
        assert_eq!(resolved.attribute.ty, AttributeType::Text);
        assert_eq!(query.join_count(), 0);
    }

    #[test]
    fn association_steps_share_one_join() {
        let mut query = CriteriaQuery::select(COURSE);
        let mapper = SimpleMapper::new();
        let first = resolve(&mapper, &mut query, "department.id").expect("id");
        let second = resolve(&mapper, &mut query, "department.code").expect("code");
        assert_eq!(first.path.root, PathRoot::Join(JoinId(0)));
        assert_eq!(second.path.root, first.path.root);
        assert_eq!(query.join_count(), 1);
    }

    #[test]
    fn embedded_paths_do_not_join_until_association() {
        let mut query = CriteriaQuery::select(COURSE);
        let mapper = SimpleMapper::new();
        let description = resolve(&mapper, &mut query, "details.description").expect("embedded");
        assert_eq!(
            description.path,
            AttributePath::new(PathRoot::Root, ["details", "description"])
        );
        assert_eq!(query.join_count(), 0);
        let specialty =
            resolve(&mapper, &mut query, "details.teacher.specialtyDescription").expect("nested");
        assert_eq!(specialty.path.segments.as_slice(), ["specialtyDescription".to_owned()]);
        assert_eq!(query.joins()[0].path, "details.teacher");
    }

    #[test]
    fn association_leaf_is_reference_typed() {
        let mut query = CriteriaQuery::select(COURSE);
        let teacher = resolve(&SimpleMapper::new(), &mut query, "details.teacher").expect("leaf");
        assert!(!teacher.attribute.ty.is_orderable());
        assert_eq!(teacher.attribute.ty.type_name(), "Teacher");
        assert_eq!(query.join_count(), 0);
    }

    #[test]
    fn element_collections_join_and_end_the_path() {
        let mut query = CriteriaQuery::select(COURSE);
        let mapper = SimpleMapper::new();
        let tags = resolve(&mapper, &mut query, "tags").expect("elements");
        assert_eq!(tags.path.root, PathRoot::Join(JoinId(0)));
        assert!(tags.path.segments.is_empty());
        let err = resolve(&mapper, &mut query, "tags.name").expect_err("no children");
        assert!(matches!(err, CompileError::UnknownProperty { name, .. } if name == "name"));
    }

    #[test]
    fn unknown_segments_name_their_owner() {
        let mut query = CriteriaQuery::select(COURSE);
        let mapper = SimpleMapper::new();
        let err = resolve(&mapper, &mut query, "invalid").expect_err("unknown");
        assert_eq!(err, CompileError::unknown_property("invalid", "Course"));
        let err = resolve(&mapper, &mut query, "department.invalid").expect_err("unknown");
        assert_eq!(err, CompileError::unknown_property("invalid", "Department"));
    }

    #[test]
    fn aliases_apply_per_owning_entity() {
        let mut mapper = SimpleMapper::new();
        mapper
            .add_mapping(COURSE, "dep", "department")
            .add_mapping(COURSE, "dept_id", "department.id")
            .add_mapping(DEPARTMENT, "d_code", "code");
        let mut query = CriteriaQuery::select(COURSE);
        let nested = resolve(&mapper, &mut query, "dep.d_code").expect("alias chain");
        assert_eq!(nested.attribute.name, "code");
        let direct = resolve(&mapper, &mut query, "dept_id").expect("dotted alias");
        assert_eq!(direct.attribute.name, "id");
        assert_eq!(query.join_count(), 1);
        let err = resolve(&mapper, &mut query, "d_code").expect_err("not a Course alias");
        assert_eq!(err, CompileError::unknown_property("d_code", "Course"));
    }

    #[test]
    fn longest_dotted_alias_wins() {
        let mut mapper = SimpleMapper::new();
        mapper
            .add_mapping(COURSE, "dep", "details")
            .add_mapping(COURSE, "dep.code", "department.code");
        let mut query = CriteriaQuery::select(COURSE);
        let resolved = resolve(&mapper, &mut query, "dep.code").expect("longest alias");
        assert_eq!(resolved.path.root, PathRoot::Join(JoinId(0)));
    }

    #[test]
    fn join_alias_prefix_starts_from_join() {
        let meta = metadata();
        let mut query = CriteriaQuery::select(COURSE);
        let id = query
            .join(&meta, PathRoot::Root, "department", JoinType::Inner, Some("dept"))
            .expect("join");
        let mapper = SimpleMapper::new();
        let resolved = PathResolver::new(&meta, &mapper)
            .resolve(&mut query, Origin::root(COURSE), "dept.code")
            .expect("alias join");
        assert_eq!(resolved.path, AttributePath::new(PathRoot::Join(id), ["code"]));
        assert_eq!(query.join_count(), 1);
    }
}
