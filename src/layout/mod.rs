mod force;
mod hierarchical;
mod smart;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::Config;
use crate::scene::{Point, Rect, Size};
use crate::schema::Entity;

pub use force::compute_force_layout;
pub use hierarchical::compute_hierarchical_layout;
pub use smart::compute_smart_layout;

/// An entity awaiting placement. `position` carries the current top-left
/// corner when the entity is already drawn somewhere (used as the physics
/// starting point); `relationship_count` is the entity's full, unrestricted
/// relationship count.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub size: Size,
    pub position: Option<Point>,
    pub relationship_count: usize,
}

/// De-duplicated undirected edge between two nodes (indices into the node
/// list). `weight` counts the schema relationships collapsed into it.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEdge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

/// Connectivity over the current node set. Directed edges preserve the
/// orientation of the first schema relationship seen for each pair;
/// self-loops and edges to entities outside the set are dropped.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub edges: Vec<LayoutEdge>,
    pub directed: Vec<(usize, usize)>,
}

impl LayoutGraph {
    pub fn from_entities(entities: &[Entity], nodes: &[LayoutNode]) -> Self {
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        let mut directed = Vec::new();
        let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();

        for entity in entities {
            for relationship in &entity.relationships {
                let (Some(&src), Some(&dst)) = (
                    index.get(relationship.source_entity_schema_name.as_str()),
                    index.get(relationship.target_entity_schema_name.as_str()),
                ) else {
                    continue;
                };
                if src == dst {
                    continue;
                }
                let key = (src.min(dst), src.max(dst));
                *weights.entry(key).or_insert(0.0) += 1.0;
                if seen_pairs.insert(key) {
                    directed.push((src, dst));
                }
            }
        }

        // Relationships appear on both endpoint entities; halve the double
        // counting but never below one per pair.
        let edges = weights
            .into_iter()
            .map(|((a, b), w)| LayoutEdge {
                a,
                b,
                weight: (w / 2.0).max(1.0).round(),
            })
            .collect();

        Self { edges, directed }
    }

    /// Weighted degree per node over the de-duplicated edges.
    pub fn degrees(&self, node_count: usize) -> Vec<f64> {
        let mut degrees = vec![0.0; node_count];
        for edge in &self.edges {
            degrees[edge.a] += edge.weight;
            degrees[edge.b] += edge.weight;
        }
        degrees
    }
}

pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

/// Dispatchable placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutAlgorithm {
    /// Sequential scan-grid placement avoiding obstacle rectangles.
    #[default]
    Grid,
    Hierarchical,
    Force,
    Smart,
}

impl LayoutAlgorithm {
    /// Computes a top-left position for every node. Obstacles (already
    /// placed entities) are never moved; the result contains exactly the
    /// input node ids.
    pub fn compute(
        self,
        nodes: &[LayoutNode],
        graph: &LayoutGraph,
        obstacles: &[Rect],
        config: &Config,
    ) -> BTreeMap<String, Point> {
        if nodes.is_empty() {
            return BTreeMap::new();
        }
        match self {
            LayoutAlgorithm::Grid => compute_grid_layout(nodes, obstacles, config),
            LayoutAlgorithm::Hierarchical => {
                compute_hierarchical_layout(nodes, graph, obstacles, config)
            }
            LayoutAlgorithm::Force => compute_force_layout(nodes, graph, obstacles, config),
            LayoutAlgorithm::Smart => compute_smart_layout(nodes, graph, obstacles, config),
        }
    }
}

/// Row/column scan placement: starts after the right/bottom-most obstacle,
/// skips any slot overlapping an obstacle (with a small buffer), wraps rows
/// at the canvas width, and falls back deterministically when the scan
/// budget runs out.
pub fn compute_grid_layout(
    nodes: &[LayoutNode],
    obstacles: &[Rect],
    config: &Config,
) -> BTreeMap<String, Point> {
    let placement = &config.placement;
    let canvas = &config.canvas;
    let width = placement.entity_width;
    let height = placement.entity_height;
    let padding = placement.padding;
    let margin = placement.margin;

    let max_columns = (((canvas.width - margin * 2.0 + padding) / (width + padding)).floor()
        as usize)
        .max(1);

    let mut column = 0usize;
    let mut row = 0usize;
    if !obstacles.is_empty() {
        let max_x = obstacles.iter().map(Rect::right).fold(f64::MIN, f64::max);
        let max_y = obstacles.iter().map(Rect::bottom).fold(f64::MIN, f64::max);
        column = (((max_x + padding - margin) / (width + padding)).floor()).max(0.0) as usize;
        if column as f64 * (width + padding) + margin + width > canvas.width {
            column = 0;
            row = (((max_y + padding - margin) / (height + padding)).floor()).max(0.0) as usize + 1;
        }
    }

    let buffer = padding / 4.0;
    let mut positions = BTreeMap::new();
    let max_attempts = max_columns * 10;

    for node in nodes {
        let mut placed = false;
        let mut attempts = 0;
        while !placed && attempts < max_attempts {
            if column >= max_columns {
                column = 0;
                row += 1;
            }
            let x = margin + column as f64 * (width + padding);
            let y = margin + row as f64 * (height + padding);
            let slot = Rect::new(x, y, node.size.width, node.size.height);

            let occupied = obstacles.iter().any(|o| slot.overlaps(o, buffer));
            if !occupied {
                positions.insert(node.id.clone(), Point::new(x, y));
                placed = true;
            }
            column += 1;
            attempts += 1;
        }
        if !placed {
            let x = margin + column as f64 * (width + padding);
            let y = margin + row as f64 * (height + padding);
            positions.insert(node.id.clone(), Point::new(x, y));
            column += 1;
        }
    }

    // Slots assume the default entity footprint; oversized boxes (detailed
    // mode) can still collide, so clear any residue.
    separate_overlaps(&mut positions, nodes, obstacles, 0.0);
    positions
}

/// Shifts a computed arrangement below every obstacle so algorithms that lay
/// out on a clean plane still respect already-placed entities.
pub(crate) fn offset_below_obstacles(
    positions: &mut BTreeMap<String, Point>,
    obstacles: &[Rect],
    spacing: f64,
) {
    if obstacles.is_empty() || positions.is_empty() {
        return;
    }
    let obstacle_bottom = obstacles.iter().map(Rect::bottom).fold(f64::MIN, f64::max);
    let arrangement_top = positions
        .iter()
        .map(|(_, p)| p.y)
        .fold(f64::MAX, f64::min);
    let shift = obstacle_bottom + spacing - arrangement_top;
    if shift <= 0.0 {
        return;
    }
    for position in positions.values_mut() {
        position.y += shift;
    }
}

/// Deterministic post-pass separating any residual overlapping pairs along
/// their center axis. Obstacles are immovable; only `positions` entries move.
pub(crate) fn separate_overlaps(
    positions: &mut BTreeMap<String, Point>,
    nodes: &[LayoutNode],
    obstacles: &[Rect],
    spacing: f64,
) {
    const MAX_PASSES: usize = 50;
    let sizes: HashMap<&str, Size> = nodes.iter().map(|n| (n.id.as_str(), n.size)).collect();
    let ids: Vec<String> = positions.keys().cloned().collect();

    for _ in 0..MAX_PASSES {
        let mut moved = false;

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (ra, rb) = {
                    let sa = sizes[ids[i].as_str()];
                    let sb = sizes[ids[j].as_str()];
                    (
                        Rect::from_parts(positions[&ids[i]], sa),
                        Rect::from_parts(positions[&ids[j]], sb),
                    )
                };
                if let Some((dx, dy)) = separation_vector(&ra, &rb, spacing) {
                    let a = positions.get_mut(&ids[i]).unwrap();
                    a.x -= dx / 2.0;
                    a.y -= dy / 2.0;
                    let b = positions.get_mut(&ids[j]).unwrap();
                    b.x += dx / 2.0;
                    b.y += dy / 2.0;
                    moved = true;
                }
            }
        }

        for id in &ids {
            let size = sizes[id.as_str()];
            for obstacle in obstacles {
                let rect = Rect::from_parts(positions[id], size);
                if let Some((dx, dy)) = separation_vector(obstacle, &rect, spacing) {
                    let p = positions.get_mut(id).unwrap();
                    p.x += dx;
                    p.y += dy;
                    moved = true;
                }
            }
        }

        if !moved {
            return;
        }
    }
}

/// Minimum translation pushing `b` away from `a` so their gap is at least
/// `spacing`, or None when they are already separated.
fn separation_vector(a: &Rect, b: &Rect, spacing: f64) -> Option<(f64, f64)> {
    let gap_x = (b.x - a.right()).max(a.x - b.right());
    let gap_y = (b.y - a.bottom()).max(a.y - b.bottom());
    if gap_x >= spacing || gap_y >= spacing {
        return None;
    }

    let push_x = spacing - gap_x;
    let push_y = spacing - gap_y;
    let ac = a.center();
    let bc = b.center();
    if push_x <= push_y {
        let dir = if bc.x >= ac.x { 1.0 } else { -1.0 };
        Some((dir * push_x, 0.0))
    } else {
        let dir = if bc.y >= ac.y { 1.0 } else { -1.0 };
        Some((0.0, dir * push_y))
    }
}

#[cfg(test)]
pub(crate) fn rects_of(
    positions: &BTreeMap<String, Point>,
    nodes: &[LayoutNode],
) -> Vec<Rect> {
    nodes
        .iter()
        .map(|n| Rect::from_parts(positions[&n.id], n.size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Relationship, RelationshipKind};

    pub(crate) fn node(id: &str) -> LayoutNode {
        LayoutNode {
            id: id.to_string(),
            size: Size::new(120.0, 80.0),
            position: None,
            relationship_count: 0,
        }
    }

    fn relationship(source: &str, target: &str, name: &str) -> Relationship {
        Relationship {
            schema_name: name.to_string(),
            source_entity_schema_name: source.to_string(),
            target_entity_schema_name: target.to_string(),
            relationship_type: RelationshipKind::OneToMany,
        }
    }

    #[test]
    fn edges_are_deduplicated_and_weighted() {
        let mut a = Entity::new("a", "A");
        a.relationships.push(relationship("a", "b", "a_b_1"));
        a.relationships.push(relationship("a", "b", "a_b_2"));
        let mut b = Entity::new("b", "B");
        b.relationships.push(relationship("a", "b", "a_b_1"));
        b.relationships.push(relationship("a", "b", "a_b_2"));

        let nodes = vec![node("a"), node("b")];
        let graph = LayoutGraph::from_entities(&[a, b], &nodes);

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].weight, 2.0);
        assert_eq!(graph.directed.len(), 1);
    }

    #[test]
    fn self_loops_and_external_edges_are_ignored() {
        let mut a = Entity::new("a", "A");
        a.relationships.push(relationship("a", "a", "self"));
        a.relationships.push(relationship("a", "offstage", "ext"));

        let nodes = vec![node("a")];
        let graph = LayoutGraph::from_entities(&[a], &nodes);
        assert!(graph.edges.is_empty());
        assert!(graph.directed.is_empty());
    }

    #[test]
    fn grid_scan_avoids_obstacles() {
        let config = Config::default();
        let nodes = vec![node("a"), node("b"), node("c")];
        let obstacles = vec![Rect::new(40.0, 40.0, 200.0, 80.0)];
        let positions = compute_grid_layout(&nodes, &obstacles, &config);

        assert_eq!(positions.len(), 3);
        for rect in rects_of(&positions, &nodes) {
            for obstacle in &obstacles {
                assert!(!rect.overlaps(obstacle, 0.0), "{rect:?} hits {obstacle:?}");
            }
        }
    }

    #[test]
    fn separate_overlaps_clears_collisions() {
        let nodes = vec![node("a"), node("b")];
        let mut positions = BTreeMap::new();
        positions.insert("a".to_string(), Point::new(0.0, 0.0));
        positions.insert("b".to_string(), Point::new(10.0, 10.0));

        separate_overlaps(&mut positions, &nodes, &[], 20.0);

        let rects = rects_of(&positions, &nodes);
        assert!(!rects[0].overlaps(&rects[1], 19.0));
    }
}
