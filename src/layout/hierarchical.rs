use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::config::Config;
use crate::scene::{Point, Rect};

use super::{offset_below_obstacles, separate_overlaps, snap_to_grid, LayoutGraph, LayoutNode};

#[derive(Debug, Clone)]
struct LayeredNode {
    index: usize,
    layer: usize,
    in_degree: usize,
    total_degree: f64,
}

/// Layered DAG layout for ER diagrams: longest-path layering, center-out
/// degree ordering with weighted barycenter sweeps, and weight-proportional
/// horizontal allocation so hub entities get more breathing room.
pub fn compute_hierarchical_layout(
    nodes: &[LayoutNode],
    graph: &LayoutGraph,
    obstacles: &[Rect],
    config: &Config,
) -> BTreeMap<String, Point> {
    let options = &config.hierarchical;
    let degrees = graph.degrees(nodes.len());

    let mut in_degree = vec![0usize; nodes.len()];
    for &(_, dst) in &graph.directed {
        in_degree[dst] += 1;
    }

    let mut layered: Vec<LayeredNode> = nodes
        .iter()
        .enumerate()
        .map(|(index, _)| LayeredNode {
            index,
            layer: 0,
            in_degree: in_degree[index],
            total_degree: degrees[index],
        })
        .collect();

    let mut layers = if layered.iter().any(|n| n.in_degree == 0) {
        longest_path_layers(&mut layered, graph)
    } else {
        debug!(nodes = nodes.len(), "no source nodes, using degree-chunk fallback");
        fallback_layers(&mut layered)
    };

    minimize_crossings(&mut layers, &layered, graph, options.max_barycenter_passes);

    let mut positions = assign_coordinates(&layers, &layered, nodes, config);
    offset_below_obstacles(&mut positions, obstacles, options.vertical_spacing);
    separate_overlaps(&mut positions, nodes, obstacles, 0.0);
    positions
}

/// Longest-path layering seeded from zero-in-degree nodes; each directed
/// edge relaxes `target = max(target, source + 1)` during a breadth-first
/// sweep. Spreads entities over more layers than a plain topological sort.
fn longest_path_layers(layered: &mut [LayeredNode], graph: &LayoutGraph) -> Vec<Vec<usize>> {
    let mut queue: VecDeque<usize> = layered
        .iter()
        .filter(|n| n.in_degree == 0)
        .map(|n| n.index)
        .collect();
    let mut visited = vec![false; layered.len()];

    while let Some(index) = queue.pop_front() {
        if visited[index] {
            continue;
        }
        visited[index] = true;

        let source_layer = layered[index].layer;
        for &(src, dst) in &graph.directed {
            if src == index {
                if layered[dst].layer < source_layer + 1 {
                    layered[dst].layer = source_layer + 1;
                }
                queue.push_back(dst);
            }
        }
    }

    group_by_layer(layered)
}

/// Fully-cyclic fallback: degree-descending order chunked into
/// ceil(sqrt(n))-sized layers, a degenerate square grid.
fn fallback_layers(layered: &mut [LayeredNode]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..layered.len()).collect();
    order.sort_by(|&a, &b| {
        layered[b]
            .total_degree
            .partial_cmp(&layered[a].total_degree)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let per_layer = (layered.len() as f64).sqrt().ceil() as usize;
    let mut layers = Vec::new();
    for chunk in order.chunks(per_layer.max(1)) {
        for &index in chunk {
            layered[index].layer = layers.len();
        }
        layers.push(chunk.to_vec());
    }
    layers
}

fn group_by_layer(layered: &[LayeredNode]) -> Vec<Vec<usize>> {
    let max_layer = layered.iter().map(|n| n.layer).max().unwrap_or(0);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_layer + 1];
    for node in layered {
        layers[node.layer].push(node.index);
    }
    layers.retain(|layer| !layer.is_empty());
    layers
}

fn connection_weight(graph: &LayoutGraph, a: usize, b: usize) -> f64 {
    graph
        .edges
        .iter()
        .filter(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a))
        .map(|e| e.weight)
        .sum()
}

fn minimize_crossings(
    layers: &mut [Vec<usize>],
    layered: &[LayeredNode],
    graph: &LayoutGraph,
    max_passes: usize,
) {
    if layers.len() < 2 {
        return;
    }

    for layer in layers.iter_mut() {
        sort_layer_center_out(layer, layered);
    }

    for _ in 0..max_passes {
        let mut improved = false;

        for i in 1..layers.len() {
            let adjacent = layers[i - 1].clone();
            if order_by_barycenter(&mut layers[i], &adjacent, layered, graph) {
                improved = true;
            }
        }
        for i in (0..layers.len() - 1).rev() {
            let adjacent = layers[i + 1].clone();
            if order_by_barycenter(&mut layers[i], &adjacent, layered, graph) {
                improved = true;
            }
        }

        if !improved {
            break;
        }
    }
}

/// Degree-descending sort interleaved left/right so the best-connected
/// entities land centrally.
fn sort_layer_center_out(layer: &mut Vec<usize>, layered: &[LayeredNode]) {
    layer.sort_by(|&a, &b| {
        layered[b]
            .total_degree
            .partial_cmp(&layered[a].total_degree)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut reordered: VecDeque<usize> = VecDeque::with_capacity(layer.len());
    let mut left = true;
    for &index in layer.iter() {
        if left {
            reordered.push_back(index);
        } else {
            reordered.push_front(index);
        }
        left = !left;
    }
    *layer = reordered.into_iter().collect();
}

/// Weighted barycenter ordering against an adjacent layer. Connections to
/// high-degree neighbors pull harder: weight = count * (1 + 0.1 * degree).
/// Returns whether the ordering changed.
fn order_by_barycenter(
    layer: &mut Vec<usize>,
    adjacent: &[usize],
    layered: &[LayeredNode],
    graph: &LayoutGraph,
) -> bool {
    if layer.len() < 2 {
        return false;
    }

    let mut keyed: Vec<(f64, usize)> = layer
        .iter()
        .enumerate()
        .map(|(current_pos, &index)| {
            let mut weighted_sum = 0.0;
            let mut total_weight = 0.0;
            for (adj_pos, &adj_index) in adjacent.iter().enumerate() {
                let count = connection_weight(graph, index, adj_index);
                if count > 0.0 {
                    let weight = count * (1.0 + layered[adj_index].total_degree * 0.1);
                    weighted_sum += adj_pos as f64 * weight;
                    total_weight += weight;
                }
            }
            let barycenter = if total_weight > 0.0 {
                weighted_sum / total_weight
            } else {
                current_pos as f64
            };
            (barycenter, index)
        })
        .collect();

    keyed.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let reordered: Vec<usize> = keyed.into_iter().map(|(_, index)| index).collect();
    let changed = reordered != *layer;
    *layer = reordered;
    changed
}

/// Each layer sits at `top_padding + layer * vertical_spacing`. Within a
/// layer every entity gets the minimum allocation plus a share of leftover
/// width proportional to its degree; centers are snapped to the grid cell.
fn assign_coordinates(
    layers: &[Vec<usize>],
    layered: &[LayeredNode],
    nodes: &[LayoutNode],
    config: &Config,
) -> BTreeMap<String, Point> {
    let options = &config.hierarchical;
    let mut positions = BTreeMap::new();

    for (layer_index, layer) in layers.iter().enumerate() {
        if layer.is_empty() {
            continue;
        }
        let base_y = options.top_padding + layer_index as f64 * options.vertical_spacing;

        let total_weight: f64 = layer
            .iter()
            .map(|&i| layered[i].total_degree.max(1.0))
            .sum();
        let available_width = (config.canvas.width - options.left_padding * 2.0)
            .max(layer.len() as f64 * options.horizontal_spacing);
        let total_min_width = layer.len() as f64 * options.min_spacing;
        let extra_space = (available_width - total_min_width).max(0.0);

        let mut current_x = options.left_padding;
        for &index in layer {
            let weight = layered[index].total_degree.max(1.0);
            let mut allocated = options.min_spacing;
            if total_weight > 0.0 && extra_space > 0.0 {
                allocated += extra_space * weight / total_weight;
            }

            let center_x = snap_to_grid(current_x + allocated / 2.0, options.grid_cell_size);
            let center_y = snap_to_grid(base_y, options.grid_cell_size);

            let size = nodes[index].size;
            let final_x = center_x - size.width / 2.0;
            let final_y = center_y - size.height / 2.0;
            if final_x.is_finite() && final_y.is_finite() {
                positions.insert(nodes[index].id.clone(), Point::new(final_x, final_y));
            } else {
                debug!(node = %nodes[index].id, "skipping non-finite hierarchical position");
            }

            current_x += allocated;
        }
    }

    positions
}
