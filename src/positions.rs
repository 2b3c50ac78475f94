use std::collections::{BTreeMap, BTreeSet};

use crate::scene::{Point, Scene};

/// Single source of truth for where each entity is currently drawn. The
/// diagram is cleared and rebuilt on every entity-set change, so dragged
/// positions only survive because they are recorded here first.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    positions: BTreeMap<String, Point>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the live position of every entity box in the scene,
    /// overwriting prior values. Called before every re-render.
    pub fn capture(&mut self, scene: &Scene) {
        for (entity, position) in scene.entity_positions() {
            self.positions.insert(entity, position);
        }
    }

    /// Drops tracked positions for entities no longer in the working set.
    /// Must run before layout so obstacle lists never include ghost entities.
    pub fn prune(&mut self, current: &BTreeSet<String>) {
        self.positions.retain(|name, _| current.contains(name));
    }

    /// Absence means "never placed": the entity goes through layout.
    pub fn get(&self, entity: &str) -> Option<Point> {
        self.positions.get(entity).copied()
    }

    pub fn set(&mut self, entity: impl Into<String>, position: Point) {
        self.positions.insert(entity.into(), position);
    }

    pub fn remove(&mut self, entity: &str) -> bool {
        self.positions.remove(entity).is_some()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Point> {
        self.positions.clone()
    }

    pub fn restore(&mut self, positions: BTreeMap<String, Point>) {
        self.positions = positions;
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cell, CellBody, Size};

    fn scene_with(entities: &[(&str, f64, f64)]) -> Scene {
        let mut scene = Scene::new();
        for (name, x, y) in entities {
            scene.add_cell(Cell {
                id: format!("entity:{name}"),
                position: Point::new(*x, *y),
                size: Size::new(120.0, 80.0),
                body: CellBody::EntityBox {
                    entity: name.to_string(),
                    detailed: false,
                },
            });
        }
        scene
    }

    #[test]
    fn capture_overwrites_previous_positions() {
        let mut tracker = PositionTracker::new();
        tracker.capture(&scene_with(&[("account", 10.0, 20.0)]));
        tracker.capture(&scene_with(&[("account", 50.0, 60.0)]));
        assert_eq!(tracker.get("account"), Some(Point::new(50.0, 60.0)));
    }

    #[test]
    fn prune_drops_entities_outside_the_working_set() {
        let mut tracker = PositionTracker::new();
        tracker.capture(&scene_with(&[("account", 0.0, 0.0), ("contact", 5.0, 5.0)]));

        let current: BTreeSet<String> = ["account".to_string()].into_iter().collect();
        tracker.prune(&current);

        assert!(tracker.get("account").is_some());
        assert!(tracker.get("contact").is_none());
        assert_eq!(tracker.len(), 1);
    }
}
