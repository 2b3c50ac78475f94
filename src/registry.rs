use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::schema::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramMode {
    #[default]
    Simple,
    Detailed,
}

/// Working set of entities currently placed on the diagram. Pure data: box
/// and connector cleanup on removal belongs to the rendering orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    mode: DiagramMode,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, schema_name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.schema_name == schema_name)
    }

    pub fn contains(&self, schema_name: &str) -> bool {
        self.entity(schema_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn schema_names(&self) -> BTreeSet<String> {
        self.entities
            .iter()
            .map(|e| e.schema_name.clone())
            .collect()
    }

    pub fn mode(&self) -> DiagramMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DiagramMode) {
        self.mode = mode;
    }

    /// Adds an entity to the working set. Returns false (and changes nothing)
    /// when an entity with the same schema name is already present. With no
    /// explicit selection the default visible-attribute set is computed.
    pub fn add_entity(&mut self, entity: Entity, visible: Option<Vec<String>>) -> bool {
        if self.contains(&entity.schema_name) {
            return false;
        }
        let mut entity = entity;
        entity.visible_attributes = match visible {
            Some(names) => names
                .into_iter()
                .filter(|name| entity.has_attribute(name))
                .collect(),
            None => entity.default_visible_attributes(),
        };
        self.entities.push(entity);
        true
    }

    /// Adds a batch of entities, silently skipping those already present.
    /// Returns only the entities actually added so callers can react to the
    /// delta. `visible` supplies per-entity explicit selections by schema name.
    pub fn add_entity_group(
        &mut self,
        entities: Vec<Entity>,
        visible: Option<&std::collections::BTreeMap<String, Vec<String>>>,
    ) -> Vec<Entity> {
        let mut added = Vec::new();
        for entity in entities {
            let selection = visible
                .and_then(|m| m.get(&entity.schema_name))
                .cloned();
            if self.add_entity(entity, selection) {
                added.push(self.entities.last().unwrap().clone());
            }
        }
        added
    }

    pub fn remove_entity(&mut self, schema_name: &str) -> bool {
        let before = self.entities.len();
        self.entities.retain(|e| e.schema_name != schema_name);
        self.entities.len() != before
    }

    /// Marks an attribute visible. Returns whether anything changed, so the
    /// caller knows whether a redraw is needed.
    pub fn set_attribute_visible(&mut self, entity: &str, attribute: &str) -> bool {
        let Some(entity) = self.entities.iter_mut().find(|e| e.schema_name == entity) else {
            return false;
        };
        if !entity.has_attribute(attribute) {
            return false;
        }
        entity.visible_attributes.insert(attribute.to_string())
    }

    pub fn set_attribute_hidden(&mut self, entity: &str, attribute: &str) -> bool {
        let Some(entity) = self.entities.iter_mut().find(|e| e.schema_name == entity) else {
            return false;
        };
        entity.visible_attributes.remove(attribute)
    }

    /// Replaces the working set wholesale (document load path). Visible sets
    /// are re-validated against each entity's attribute list.
    pub fn replace_all(&mut self, entities: Vec<Entity>) {
        self.entities = entities
            .into_iter()
            .map(|mut entity| {
                let valid: BTreeSet<String> = entity
                    .visible_attributes
                    .iter()
                    .filter(|name| entity.has_attribute(name))
                    .cloned()
                    .collect();
                entity.visible_attributes = valid;
                entity
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
