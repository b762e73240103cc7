//! Entity metadata consumed by the path resolver and argument coercion.
//!
//! The compiler never inspects entity definitions directly. It asks a
//! [`MetadataProvider`] what a property name means on a given entity type and
//! receives a [`PropertyKind`]: a plain attribute with a semantic type, an
//! embedded composite, an association to another entity, or a collection of
//! basic values.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Provides entity/property resolution for the compiler.
pub trait MetadataProvider {
    /// Display name of an entity type, used in diagnostics.
    fn entity_name(&self, entity: EntityId) -> Option<String>;
    /// Describes `name` on `entity`, or `None` when no such property exists.
    fn property(&self, entity: EntityId, name: &str) -> Option<PropertyKind>;
    /// Name of the identifier attribute of `entity`.
    fn identifier(&self, entity: EntityId) -> Option<String>;
}

/// Number of targets reachable through an association.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// To-one association.
    Single,
    /// To-many association.
    Collection,
}

/// What a property name refers to on its owning entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Basic attribute holding a value of the given type.
    Attribute(AttributeType),
    /// Composite value stored inline; resolved without a join.
    Embedded(EntityId),
    /// Association to another entity.
    Association {
        /// Target entity type.
        target: EntityId,
        /// To-one or to-many.
        cardinality: Cardinality,
    },
    /// Collection of basic values owned by the entity.
    ElementCollection(AttributeType),
}

/// Semantic type of a leaf attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    /// Whole number.
    Integer,
    /// Floating point number.
    Float,
    /// `true` / `false`.
    Boolean,
    /// Free text.
    Text,
    /// Date or date-time; `format` overrides the configured formats.
    Temporal {
        /// `time` format description for this attribute.
        format: Option<String>,
    },
    /// Enumerated constants, ordered by declaration.
    Enum {
        /// Enum type name.
        name: String,
        /// Constants in declaration order.
        variants: Vec<String>,
    },
    /// Opaque value object, stored and compared as text.
    Object {
        /// Value type name.
        type_name: String,
        /// Whether the type defines an ordering.
        comparable: bool,
    },
    /// Association used as a leaf; compared by the target's identifier.
    Reference {
        /// Referenced entity type name.
        entity: String,
        /// Type of the referenced identifier.
        identifier: Box<AttributeType>,
    },
}

impl AttributeType {
    /// Whether ordering operators apply to values of this type.
    pub fn is_orderable(&self) -> bool {
        match self {
            AttributeType::Integer
            | AttributeType::Float
            | AttributeType::Boolean
            | AttributeType::Text
            | AttributeType::Temporal { .. }
            | AttributeType::Enum { .. } => true,
            AttributeType::Object { comparable, .. } => *comparable,
            AttributeType::Reference { .. } => false,
        }
    }

    /// Whether `==` may treat `*` as a wildcard.
    pub fn is_textual(&self) -> bool {
        matches!(self, AttributeType::Text)
    }

    /// Declared type name.
    pub fn type_name(&self) -> &str {
        match self {
            AttributeType::Integer => "Integer",
            AttributeType::Float => "Float",
            AttributeType::Boolean => "Boolean",
            AttributeType::Text => "Text",
            AttributeType::Temporal { .. } => "Temporal",
            AttributeType::Enum { name, .. } => name,
            AttributeType::Object { type_name, .. } => type_name,
            AttributeType::Reference { entity, .. } => entity,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Default)]
struct EntityEntry {
    name: String,
    identifier: Option<String>,
    properties: HashMap<String, PropertyKind>,
}

/// Simple in-memory provider for tests and small embedded schemas.
#[derive(Default)]
pub struct InMemoryMetadata {
    entities: HashMap<EntityId, EntityEntry>,
}

impl InMemoryMetadata {
    /// Creates a new empty in-memory metadata provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity (or embeddable) type.
    pub fn with_entity(mut self, id: EntityId, name: impl Into<String>) -> Self {
        self.entities.entry(id).or_default().name = name.into();
        self
    }

    /// Declares the identifier attribute and registers it as an attribute.
    pub fn with_identifier(
        mut self,
        entity: EntityId,
        name: impl Into<String>,
        ty: AttributeType,
    ) -> Self {
        let name = name.into();
        let entry = self.entities.entry(entity).or_default();
        entry.identifier = Some(name.clone());
        entry.properties.insert(name, PropertyKind::Attribute(ty));
        self
    }

    /// Registers a basic attribute.
    pub fn with_attribute(
        self,
        entity: EntityId,
        name: impl Into<String>,
        ty: AttributeType,
    ) -> Self {
        self.with_property(entity, name, PropertyKind::Attribute(ty))
    }

    /// Registers an embedded composite of type `target`.
    pub fn with_embedded(self, entity: EntityId, name: impl Into<String>, target: EntityId) -> Self {
        self.with_property(entity, name, PropertyKind::Embedded(target))
    }

    /// Registers an association.
    pub fn with_association(
        self,
        entity: EntityId,
        name: impl Into<String>,
        target: EntityId,
        cardinality: Cardinality,
    ) -> Self {
        self.with_property(
            entity,
            name,
            PropertyKind::Association {
                target,
                cardinality,
            },
        )
    }

    /// Registers a collection of basic values.
    pub fn with_element_collection(
        self,
        entity: EntityId,
        name: impl Into<String>,
        element: AttributeType,
    ) -> Self {
        self.with_property(entity, name, PropertyKind::ElementCollection(element))
    }

    /// Registers an arbitrary property kind.
    pub fn with_property(
        mut self,
        entity: EntityId,
        name: impl Into<String>,
        kind: PropertyKind,
    ) -> Self {
        self.entities
            .entry(entity)
            .or_default()
            .properties
            .insert(name.into(), kind);
        self
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn entity_name(&self, entity: EntityId) -> Option<String> {
        self.entities.get(&entity).map(|entry| entry.name.clone())
    }

    fn property(&self, entity: EntityId, name: &str) -> Option<PropertyKind> {
        self.entities
            .get(&entity)
            .and_then(|entry| entry.properties.get(name))
            .cloned()
    }

    fn identifier(&self, entity: EntityId) -> Option<String> {
        self.entities
            .get(&entity)
            .and_then(|entry| entry.identifier.clone())
    }
}
