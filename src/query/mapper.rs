//! Per-entity alias tables for selector segments.

use std::collections::HashMap;

use crate::types::EntityId;

/// Translates aliases to real property paths, scoped to an owning entity.
pub trait PropertyMapper: Send + Sync {
    /// Real dotted path for `alias` on `entity`, or `None` when unmapped.
    fn map(&self, entity: EntityId, alias: &str) -> Option<String>;
}

/// Alias table keyed by entity, then by alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleMapper {
    mapping: Option<HashMap<EntityId, HashMap<String, String>>>,
}

impl Default for SimpleMapper {
    fn default() -> Self {
        Self {
            mapping: Some(HashMap::new()),
        }
    }
}

impl SimpleMapper {
    /// Creates a mapper with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `alias` to `path` for `entity`.
    pub fn add_mapping(
        &mut self,
        entity: EntityId,
        alias: impl Into<String>,
        path: impl Into<String>,
    ) -> &mut Self {
        self.mapping
            .get_or_insert_with(HashMap::new)
            .entry(entity)
            .or_default()
            .insert(alias.into(), path.into());
        self
    }

    /// Replaces the whole alias table of `entity`.
    pub fn add_entity_mapping(
        &mut self,
        entity: EntityId,
        aliases: HashMap<String, String>,
    ) -> &mut Self {
        self.mapping
            .get_or_insert_with(HashMap::new)
            .insert(entity, aliases);
        self
    }

    /// Drops one alias; returns the path it pointed to.
    pub fn remove_mapping(&mut self, entity: EntityId, alias: &str) -> Option<String> {
        self.mapping
            .as_mut()?
            .get_mut(&entity)
            .and_then(|aliases| aliases.remove(alias))
    }

    /// Installs a full table, or clears it with `None`.
    pub fn set_mapping(&mut self, mapping: Option<HashMap<EntityId, HashMap<String, String>>>) {
        self.mapping = mapping;
    }

    /// Current table; `None` after `set_mapping(None)`.
    pub fn mapping(&self) -> Option<&HashMap<EntityId, HashMap<String, String>>> {
        self.mapping.as_ref()
    }
}

impl PropertyMapper for SimpleMapper {
    fn map(&self, entity: EntityId, alias: &str) -> Option<String> {
        self.mapping
            .as_ref()?
            .get(&entity)?
            .get(alias)
            .cloned()
    }
}
