use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::config::Config;
use crate::scene::{Point, Rect};

use super::{separate_overlaps, LayoutGraph, LayoutNode};

/// Cheap heuristic for small entity counts: the most-connected entity goes
/// dead-center, the rest fill a square grid radiating outward, and anything
/// displaced by the reserved center cells lands on a surrounding ring.
pub fn compute_smart_layout(
    nodes: &[LayoutNode],
    graph: &LayoutGraph,
    obstacles: &[Rect],
    config: &Config,
) -> BTreeMap<String, Point> {
    let options = &config.smart;
    let center = Point::new(config.canvas.width / 2.0, config.canvas.height / 2.0);
    let mut positions = BTreeMap::new();

    if nodes.len() == 1 {
        positions.insert(nodes[0].id.clone(), top_left(&nodes[0], center));
        separate_overlaps(&mut positions, nodes, obstacles, 0.0);
        return positions;
    }

    let anchor = most_connected(nodes, graph);
    positions.insert(nodes[anchor].id.clone(), top_left(&nodes[anchor], center));

    let remaining: Vec<usize> = (0..nodes.len()).filter(|&i| i != anchor).collect();
    let spacing = options.grid_spacing;
    let grid_size = (remaining.len() as f64).sqrt().ceil() as usize;

    let total_grid = (grid_size.saturating_sub(1)) as f64 * spacing;
    let start_x = center.x - total_grid / 2.0;
    let start_y = center.y - total_grid / 2.0 - options.center_offset;

    let mut placed = 0usize;
    'grid: for row in 0..grid_size {
        for col in 0..grid_size {
            if placed >= remaining.len() {
                break 'grid;
            }
            let cell = Point::new(
                start_x + col as f64 * spacing,
                start_y + row as f64 * spacing,
            );
            // Cells this close to the center are reserved for the anchor.
            if cell.distance_to(center) < spacing * options.center_exclusion {
                continue;
            }
            let index = remaining[placed];
            positions.insert(nodes[index].id.clone(), top_left(&nodes[index], cell));
            placed += 1;
        }
    }

    // Whatever the reserved center cells displaced goes on an even-angle ring.
    if placed < remaining.len() {
        let overflow = &remaining[placed..];
        let radius = (grid_size as f64 + 1.0) * spacing / 2.0;
        let angle_step = 2.0 * PI / overflow.len() as f64;
        for (i, &index) in overflow.iter().enumerate() {
            let angle = i as f64 * angle_step;
            let spot = Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            );
            positions.insert(nodes[index].id.clone(), top_left(&nodes[index], spot));
        }
    }

    separate_overlaps(&mut positions, nodes, obstacles, 0.0);
    positions
}

fn most_connected(nodes: &[LayoutNode], graph: &LayoutGraph) -> usize {
    let degrees = graph.degrees(nodes.len());
    let mut best = 0usize;
    let mut best_count = -1.0;
    for (index, node) in nodes.iter().enumerate() {
        let count = node.relationship_count as f64 + degrees[index];
        if count > best_count {
            best_count = count;
            best = index;
        }
    }
    best
}

fn top_left(node: &LayoutNode, center: Point) -> Point {
    Point::new(
        center.x - node.size.width / 2.0,
        center.y - node.size.height / 2.0,
    )
}
