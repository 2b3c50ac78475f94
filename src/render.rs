use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::config::Config;
use crate::layout::{LayoutAlgorithm, LayoutGraph, LayoutNode};
use crate::positions::PositionTracker;
use crate::registry::{DiagramMode, EntityRegistry};
use crate::scene::{Cell, CellBody, ConnectorRouter, Point, Rect, Scene, Size};
use crate::schema::Entity;
use crate::viewport::Viewport;

pub fn entity_cell_id(schema_name: &str) -> String {
    format!("entity:{schema_name}")
}

pub fn connector_cell_id(a: &str, b: &str) -> String {
    format!("link:{a}--{b}")
}

/// Box dimensions for an entity before placement. Simple mode is a fixed
/// box; detailed mode grows with the display name and the visible attribute
/// count, both capped so one wide entity cannot distort the whole layout.
pub fn estimate_entity_dimensions(entity: &Entity, mode: DiagramMode, config: &Config) -> Size {
    let placement = &config.placement;
    match mode {
        DiagramMode::Simple => Size::new(placement.entity_width, placement.entity_height),
        DiagramMode::Detailed => {
            let name_len = entity.display_name.chars().count() as f64;
            let width = placement.detailed_base_width
                + (name_len * placement.width_per_name_char).min(placement.max_width_adjustment);
            let height = placement.detailed_base_height
                + (entity.visible_attributes.len() as f64 * placement.height_per_attribute)
                    .min(placement.max_height_adjustment);
            Size::new(width, height)
        }
    }
}

/// Rebuilds the scene from the registry. The scene is a derived artifact:
/// every call clears it and reconstructs boxes, decorations and connectors,
/// with dragged positions surviving through the tracker.
pub fn render(
    registry: &EntityRegistry,
    tracker: &mut PositionTracker,
    scene: &mut Scene,
    viewport: &mut Viewport,
    router: &dyn ConnectorRouter,
    algorithm: LayoutAlgorithm,
    config: &Config,
) {
    // Decorations are free-floating; carry them across the rebuild verbatim.
    let squares: Vec<Cell> = scene
        .decorations()
        .filter(|c| matches!(c.body, CellBody::Square(_)))
        .cloned()
        .collect();
    let texts: Vec<Cell> = scene
        .decorations()
        .filter(|c| matches!(c.body, CellBody::Text(_)))
        .cloned()
        .collect();

    tracker.capture(scene);
    tracker.prune(&registry.schema_names());
    scene.clear();

    for square in squares {
        scene.add_cell(square);
    }

    let mode = registry.mode();
    let mut placed: Vec<(&Entity, Point, Size)> = Vec::new();
    let mut pending: Vec<(&Entity, Size)> = Vec::new();
    for entity in registry.entities() {
        let size = estimate_entity_dimensions(entity, mode, config);
        match tracker.get(&entity.schema_name) {
            Some(position) => placed.push((entity, position, size)),
            None => pending.push((entity, size)),
        }
    }

    // Already-drawn boxes and manual squares constrain where layout may put
    // the newcomers.
    let mut obstacles: Vec<Rect> = placed
        .iter()
        .map(|(_, position, size)| Rect::from_parts(*position, *size))
        .collect();
    obstacles.extend(scene.decorations().map(Cell::rect));

    let nodes: Vec<LayoutNode> = pending
        .iter()
        .map(|(entity, size)| LayoutNode {
            id: entity.schema_name.clone(),
            size: *size,
            position: None,
            relationship_count: entity.relationship_count(),
        })
        .collect();
    let graph = LayoutGraph::from_entities(registry.entities(), &nodes);
    let layout = algorithm.compute(&nodes, &graph, &obstacles, config);
    debug!(new = nodes.len(), kept = placed.len(), "placed entities");

    let detailed = mode == DiagramMode::Detailed;
    for (entity, position, size) in &placed {
        scene.add_cell(Cell {
            id: entity_cell_id(&entity.schema_name),
            position: *position,
            size: *size,
            body: CellBody::EntityBox {
                entity: entity.schema_name.clone(),
                detailed,
            },
        });
    }
    for (entity, size) in &pending {
        let Some(position) = layout.get(&entity.schema_name).copied() else {
            warn!(entity = %entity.schema_name, "layout returned no position");
            continue;
        };
        tracker.set(&entity.schema_name, position);
        scene.add_cell(Cell {
            id: entity_cell_id(&entity.schema_name),
            position,
            size: *size,
            body: CellBody::EntityBox {
                entity: entity.schema_name.clone(),
                detailed,
            },
        });
    }

    for text in texts {
        scene.add_cell(text);
    }

    connect_entities(registry, scene);
    scene.reroute(router);
    viewport.fit(scene.bbox());
}

/// One connector per entity pair, labelled with every schema relationship
/// collapsed into it. Relationships to entities outside the working set are
/// skipped.
fn connect_entities(registry: &EntityRegistry, scene: &mut Scene) {
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    let mut oriented: BTreeMap<(String, String), (String, String)> = BTreeMap::new();
    let mut seen_relationships: BTreeSet<String> = BTreeSet::new();

    for entity in registry.entities() {
        for relationship in &entity.relationships {
            let source = &relationship.source_entity_schema_name;
            let target = &relationship.target_entity_schema_name;
            if !registry.contains(source) || !registry.contains(target) {
                continue;
            }
            // Relationships are listed on both endpoint entities.
            if !seen_relationships.insert(relationship.schema_name.clone()) {
                continue;
            }
            let key = if source <= target {
                (source.clone(), target.clone())
            } else {
                (target.clone(), source.clone())
            };
            oriented
                .entry(key.clone())
                .or_insert_with(|| (source.clone(), target.clone()));
            grouped
                .entry(key)
                .or_default()
                .push(relationship.schema_name.clone());
        }
    }

    for (key, relationships) in grouped {
        let (source, target) = oriented[&key].clone();
        scene.add_cell(Cell {
            id: connector_cell_id(&key.0, &key.1),
            position: Point::default(),
            size: Size::new(0.0, 0.0),
            body: CellBody::Connector {
                source,
                target,
                relationships,
                route: Vec::new(),
            },
        });
    }
}

/// Static SVG export of the current scene, cells in scene order.
pub fn render_svg(scene: &Scene, registry: &EntityRegistry) -> String {
    let bbox = scene
        .bbox()
        .unwrap_or_else(|| Rect::new(0.0, 0.0, 400.0, 300.0));
    let pad = 20.0;
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{} {} {} {}\">\n",
        bbox.x - pad,
        bbox.y - pad,
        bbox.width + pad * 2.0,
        bbox.height + pad * 2.0,
    ));

    for cell in scene.cells() {
        match &cell.body {
            CellBody::Connector { route, .. } => {
                if route.len() < 2 {
                    continue;
                }
                let points: Vec<String> =
                    route.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
                svg.push_str(&format!(
                    "  <polyline points=\"{}\" fill=\"none\" stroke=\"#555\" stroke-width=\"1.5\"/>\n",
                    points.join(" ")
                ));
            }
            CellBody::EntityBox { entity, detailed } => {
                let r = cell.rect();
                svg.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"4\" fill=\"#fff\" stroke=\"#333\"/>\n",
                    r.x, r.y, r.width, r.height
                ));
                let title = registry
                    .entity(entity)
                    .map(|e| e.display_name.as_str())
                    .filter(|name| !name.is_empty())
                    .unwrap_or(entity);
                svg.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\" font-weight=\"bold\">{}</text>\n",
                    r.center().x,
                    r.y + 22.0,
                    escape_xml(title)
                ));
                if *detailed {
                    if let Some(entity) = registry.entity(entity) {
                        for (i, name) in entity.visible_attributes.iter().enumerate() {
                            let label = entity
                                .attribute(name)
                                .map(|a| a.display_name.as_str())
                                .filter(|d| !d.is_empty())
                                .unwrap_or(name);
                            svg.push_str(&format!(
                                "  <text x=\"{}\" y=\"{}\" font-size=\"11\">{}</text>\n",
                                r.x + 12.0,
                                r.y + 44.0 + i as f64 * 16.0,
                                escape_xml(label)
                            ));
                        }
                    }
                }
            }
            CellBody::Square(style) => {
                let r = cell.rect();
                svg.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\" stroke-dasharray=\"6 4\" opacity=\"{}\"/>\n",
                    r.x,
                    r.y,
                    r.width,
                    r.height,
                    escape_xml(&style.fill_color),
                    escape_xml(&style.border_color),
                    style.border_width,
                    style.opacity,
                ));
            }
            CellBody::Text(style) => {
                svg.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>\n",
                    cell.position.x,
                    cell.position.y + style.font_size,
                    style.font_size,
                    escape_xml(&style.color),
                    escape_xml(&style.text)
                ));
            }
            CellBody::Generic { .. } => {
                let r = cell.rect();
                svg.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"#aaa\" stroke-dasharray=\"2 2\"/>\n",
                    r.x, r.y, r.width, r.height
                ));
            }
        }
    }

    svg.push_str("</svg>\n");
    svg
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
