use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::config::Config;
use crate::scene::{Point, Rect};

use super::{separate_overlaps, snap_to_grid, LayoutGraph, LayoutNode};

/// d3-style cooling: alpha decays so it reaches ALPHA_MIN after the
/// configured iteration count.
const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.6;
/// Golden-angle spiral used to seed nodes with no prior position.
const PHYLLOTAXIS_ANGLE: f64 = 2.399_963_229_728_653;
const PHYLLOTAXIS_RADIUS: f64 = 10.0;

struct Body {
    /// Index into the node list, or None for an immovable obstacle.
    node: Option<usize>,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    radius: f64,
}

impl Body {
    fn fixed(&self) -> bool {
        self.node.is_none()
    }
}

/// Physics relaxation: springs on relationships (scaled by weight),
/// uniform repulsion, weak centering, collision avoidance against both
/// peers and obstacles, and an optional grid-snap bias for orthogonal
/// routing. Runs a fixed iteration budget; positions are validated every
/// `validity_check_interval` iterations and the simulation aborts to the
/// last valid state on numeric blow-up.
pub fn compute_force_layout(
    nodes: &[LayoutNode],
    graph: &LayoutGraph,
    obstacles: &[Rect],
    config: &Config,
) -> BTreeMap<String, Point> {
    let options = &config.force;
    let center = Point::new(config.canvas.width / 2.0, config.canvas.height / 2.0);

    let mut bodies: Vec<Body> = Vec::with_capacity(nodes.len() + obstacles.len());
    let mut seeded = 0usize;
    for (index, node) in nodes.iter().enumerate() {
        let (x, y) = match node.position {
            Some(p) if p.is_finite() => {
                (p.x + node.size.width / 2.0, p.y + node.size.height / 2.0)
            }
            _ => {
                // Deterministic phyllotaxis seeding around the canvas center.
                let radius = PHYLLOTAXIS_RADIUS * (seeded as f64).sqrt();
                let angle = seeded as f64 * PHYLLOTAXIS_ANGLE;
                seeded += 1;
                (
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            }
        };
        bodies.push(Body {
            node: Some(index),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius: collision_radius(node, options.entity_spacing),
        });
    }
    for obstacle in obstacles {
        let c = obstacle.center();
        bodies.push(Body {
            node: None,
            x: c.x,
            y: c.y,
            vx: 0.0,
            vy: 0.0,
            radius: obstacle.width.max(obstacle.height) / 2.0 + options.entity_spacing / 2.0,
        });
    }

    let iterations = options.iterations.max(1);
    let alpha_decay = 1.0 - ALPHA_MIN.powf(1.0 / iterations as f64);
    let mut alpha = 1.0;
    let mut last_valid: Vec<(f64, f64)> = bodies.iter().map(|b| (b.x, b.y)).collect();

    for iteration in 0..iterations {
        alpha += (0.0 - alpha) * alpha_decay;

        apply_link_force(&mut bodies, graph, options.link_distance, options.link_strength, alpha);
        apply_charge_force(&mut bodies, options.charge_strength, alpha);
        apply_center_force(&mut bodies, center, options.center_strength, alpha);
        apply_collide_force(&mut bodies, options.collide_strength);
        if options.orthogonal_bias {
            apply_grid_bias(&mut bodies, options.grid_size, options.orthogonal_bias_strength, alpha);
        }

        for body in &mut bodies {
            if body.fixed() {
                body.vx = 0.0;
                body.vy = 0.0;
                continue;
            }
            body.vx *= VELOCITY_DECAY;
            body.vy *= VELOCITY_DECAY;
            body.x += body.vx;
            body.y += body.vy;
        }

        if options.validity_check_interval > 0 && iteration % options.validity_check_interval == 0 {
            if bodies.iter().any(|b| !b.x.is_finite() || !b.y.is_finite()) {
                error!(iteration, "force simulation produced non-finite positions, aborting early");
                for (body, &(x, y)) in bodies.iter_mut().zip(&last_valid) {
                    body.x = x;
                    body.y = y;
                }
                break;
            }
            for (slot, body) in last_valid.iter_mut().zip(&bodies) {
                *slot = (body.x, body.y);
            }
        }
    }

    debug!(nodes = nodes.len(), iterations, "force simulation finished");

    // Snap to the routing grid and convert center coordinates to top-left.
    let mut positions = BTreeMap::new();
    for body in &bodies {
        let Some(index) = body.node else { continue };
        let node = &nodes[index];
        let cx = snap_to_grid(body.x, options.grid_size);
        let cy = snap_to_grid(body.y, options.grid_size);
        positions.insert(
            node.id.clone(),
            Point::new(cx - node.size.width / 2.0, cy - node.size.height / 2.0),
        );
    }

    separate_overlaps(&mut positions, nodes, obstacles, options.entity_spacing);
    positions
}

fn collision_radius(node: &LayoutNode, spacing: f64) -> f64 {
    let radius = node.size.width.max(node.size.height) / 2.0 + spacing / 2.0;
    if radius.is_finite() { radius } else { 100.0 }
}

fn apply_link_force(
    bodies: &mut [Body],
    graph: &LayoutGraph,
    distance: f64,
    strength: f64,
    alpha: f64,
) {
    for edge in &graph.edges {
        let (ax, ay) = (bodies[edge.a].x, bodies[edge.a].y);
        let (bx, by) = (bodies[edge.b].x, bodies[edge.b].y);
        let dx = bx - ax;
        let dy = by - ay;
        let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
        let k = (dist - distance) / dist * (strength * edge.weight).min(1.0) * alpha;
        let fx = dx * k / 2.0;
        let fy = dy * k / 2.0;
        bodies[edge.a].vx += fx;
        bodies[edge.a].vy += fy;
        bodies[edge.b].vx -= fx;
        bodies[edge.b].vy -= fy;
    }
}

fn apply_charge_force(bodies: &mut [Body], strength: f64, alpha: f64) {
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let dx = bodies[j].x - bodies[i].x;
            let dy = bodies[j].y - bodies[i].y;
            let dist_sq = (dx * dx + dy * dy).max(1.0);
            let dist = dist_sq.sqrt();
            // Negative strength repels.
            let k = strength * alpha / dist_sq;
            let fx = dx / dist * k;
            let fy = dy / dist * k;
            bodies[i].vx += fx;
            bodies[i].vy += fy;
            bodies[j].vx -= fx;
            bodies[j].vy -= fy;
        }
    }
}

fn apply_center_force(bodies: &mut [Body], center: Point, strength: f64, alpha: f64) {
    for body in bodies.iter_mut() {
        if body.fixed() {
            continue;
        }
        body.vx += (center.x - body.x) * strength * alpha;
        body.vy += (center.y - body.y) * strength * alpha;
    }
}

fn apply_collide_force(bodies: &mut [Body], strength: f64) {
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let dx = bodies[j].x - bodies[i].x;
            let dy = bodies[j].y - bodies[i].y;
            let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
            let min_dist = bodies[i].radius + bodies[j].radius;
            if dist >= min_dist {
                continue;
            }
            let push = (min_dist - dist) / dist * strength;
            let fx = dx * push / 2.0;
            let fy = dy * push / 2.0;
            if !bodies[i].fixed() {
                bodies[i].vx -= fx;
                bodies[i].vy -= fy;
            }
            if !bodies[j].fixed() {
                bodies[j].vx += fx;
                bodies[j].vy += fy;
            }
        }
    }
}

/// Nudges velocities toward the nearest grid point so the final snap costs
/// little and connectors route orthogonally with fewer bends.
fn apply_grid_bias(bodies: &mut [Body], grid: f64, strength: f64, alpha: f64) {
    for body in bodies.iter_mut() {
        if body.fixed() {
            continue;
        }
        let nearest_x = snap_to_grid(body.x, grid);
        let nearest_y = snap_to_grid(body.y, grid);
        body.vx += (nearest_x - body.x) * strength * alpha;
        body.vy += (nearest_y - body.y) * strength * alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{rects_of, LayoutEdge};
    use crate::scene::Size;

    fn nodes(count: usize) -> Vec<LayoutNode> {
        (0..count)
            .map(|i| LayoutNode {
                id: format!("e{i}"),
                size: Size::new(120.0, 80.0),
                position: None,
                relationship_count: 0,
            })
            .collect()
    }

    fn chain_graph(count: usize) -> LayoutGraph {
        LayoutGraph {
            edges: (0..count.saturating_sub(1))
                .map(|i| LayoutEdge {
                    a: i,
                    b: i + 1,
                    weight: 1.0,
                })
                .collect(),
            directed: (0..count.saturating_sub(1)).map(|i| (i, i + 1)).collect(),
        }
    }

    #[test]
    fn positions_stay_finite() {
        let nodes = nodes(8);
        let graph = chain_graph(8);
        let config = Config::default();

        let positions = compute_force_layout(&nodes, &graph, &[], &config);
        assert_eq!(positions.len(), 8);
        for position in positions.values() {
            assert!(position.is_finite());
        }
    }

    #[test]
    fn no_residual_overlap_between_nodes_or_obstacles() {
        let nodes = nodes(6);
        let graph = chain_graph(6);
        let config = Config::default();
        let obstacles = vec![Rect::new(900.0, 500.0, 200.0, 120.0)];

        let positions = compute_force_layout(&nodes, &graph, &obstacles, &config);
        let rects = rects_of(&positions, &nodes);
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!rects[i].overlaps(&rects[j], 0.0), "nodes {i} and {j} overlap");
            }
            for obstacle in &obstacles {
                assert!(!rects[i].overlaps(obstacle, 0.0), "node {i} hits obstacle");
            }
        }
    }

    #[test]
    fn connected_pairs_keep_at_least_the_configured_spacing() {
        let nodes = nodes(4);
        let graph = chain_graph(4);
        let config = Config::default();

        let positions = compute_force_layout(&nodes, &graph, &[], &config);
        let rects = rects_of(&positions, &nodes);
        let spacing = config.force.entity_spacing;
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                // Separated by at least the spacing along one axis.
                assert!(
                    !rects[i].overlaps(&rects[j], spacing - 1.0),
                    "nodes {i} and {j} closer than spacing"
                );
            }
        }
    }

    #[test]
    fn single_entity_lands_near_canvas_center() {
        let nodes = nodes(1);
        let graph = LayoutGraph::default();
        let config = Config::default();

        let positions = compute_force_layout(&nodes, &graph, &[], &config);
        let p = positions.values().next().unwrap();
        let center = Point::new(
            p.x + 60.0,
            p.y + 40.0,
        );
        assert!((center.x - config.canvas.width / 2.0).abs() < config.force.grid_size + 1.0);
        assert!((center.y - config.canvas.height / 2.0).abs() < config.force.grid_size + 1.0);
    }
}
