use std::collections::BTreeMap;

use erdiag::config::Config;
use erdiag::document::{parse_document, restore, snapshot, DocumentError};
use erdiag::elements::ElementRegistry;
use erdiag::layout::LayoutAlgorithm;
use erdiag::positions::PositionTracker;
use erdiag::registry::{DiagramMode, EntityRegistry};
use erdiag::render::{entity_cell_id, render, render_svg};
use erdiag::scene::{CellBody, OrthogonalRouter, Point, Rect, Scene, Size};
use erdiag::schema::{Attribute, AttributeKind, Entity, Relationship, RelationshipKind};
use erdiag::viewport::Viewport;

fn attribute(name: &str, kind: AttributeKind, primary: bool, custom: bool) -> Attribute {
    Attribute {
        schema_name: name.to_string(),
        display_name: name.to_string(),
        attribute_type: kind,
        is_primary_id: primary,
        is_custom_attribute: custom,
    }
}

fn entity(name: &str) -> Entity {
    let mut entity = Entity::new(name, name.to_uppercase());
    entity
        .attributes
        .push(attribute(&format!("{name}id"), AttributeKind::String, true, false));
    entity
}

fn relate(a: &mut Entity, b: &mut Entity, kind: RelationshipKind) {
    let relationship = Relationship {
        schema_name: format!("{}_{}", a.schema_name, b.schema_name),
        source_entity_schema_name: a.schema_name.clone(),
        target_entity_schema_name: b.schema_name.clone(),
        relationship_type: kind,
    };
    a.relationships.push(relationship.clone());
    b.relationships.push(relationship);
}

/// Entities a->b, a->c, b->d, c->d plus one isolated entity.
fn diamond_schema() -> Vec<Entity> {
    let mut a = entity("alpha");
    let mut b = entity("beta");
    let mut c = entity("gamma");
    let mut d = entity("delta");
    relate(&mut a, &mut b, RelationshipKind::OneToMany);
    relate(&mut a, &mut c, RelationshipKind::OneToMany);
    relate(&mut b, &mut d, RelationshipKind::OneToMany);
    relate(&mut c, &mut d, RelationshipKind::ManyToOne);
    vec![a, b, c, d, entity("solo")]
}

struct Workbench {
    registry: EntityRegistry,
    tracker: PositionTracker,
    scene: Scene,
    viewport: Viewport,
    config: Config,
}

impl Workbench {
    fn new(entities: Vec<Entity>) -> Self {
        let mut registry = EntityRegistry::new();
        for e in entities {
            registry.add_entity(e, None);
        }
        Self {
            registry,
            tracker: PositionTracker::new(),
            scene: Scene::new(),
            viewport: Viewport::default(),
            config: Config::default(),
        }
    }

    fn render(&mut self, algorithm: LayoutAlgorithm) {
        render(
            &self.registry,
            &mut self.tracker,
            &mut self.scene,
            &mut self.viewport,
            &OrthogonalRouter,
            algorithm,
            &self.config,
        );
    }

    fn entity_rects(&self) -> BTreeMap<String, Rect> {
        self.scene
            .entity_boxes()
            .map(|c| (c.entity_name().unwrap().to_string(), c.rect()))
            .collect()
    }
}

#[test]
fn default_visible_attributes_are_primary_plus_custom_lookups() {
    let mut account = entity("account");
    account
        .attributes
        .push(attribute("new_regionid", AttributeKind::Lookup, false, true));
    account
        .attributes
        .push(attribute("new_ownerid", AttributeKind::Lookup, false, true));
    account
        .attributes
        .push(attribute("parentid", AttributeKind::Lookup, false, false));

    let mut registry = EntityRegistry::new();
    registry.add_entity(account, None);

    let visible = &registry.entity("account").unwrap().visible_attributes;
    assert_eq!(visible.len(), 3);
    assert!(visible.contains("accountid"));
    assert!(visible.contains("new_regionid"));
    assert!(visible.contains("new_ownerid"));
    assert!(!visible.contains("parentid"));
}

#[test]
fn hierarchical_layout_layers_a_diamond_top_down() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Hierarchical);

    let rects = bench.entity_rects();
    assert_eq!(rects.len(), 5);
    assert!(rects["alpha"].y < rects["beta"].y);
    assert!(rects["alpha"].y < rects["gamma"].y);
    assert_eq!(rects["beta"].y, rects["gamma"].y);
    assert!(rects["beta"].y < rects["delta"].y);
}

#[test]
fn cyclic_schema_still_gets_layered() {
    let mut a = entity("a");
    let mut b = entity("b");
    let mut c = entity("c");
    relate(&mut a, &mut b, RelationshipKind::OneToMany);
    relate(&mut b, &mut c, RelationshipKind::OneToMany);
    relate(&mut c, &mut a, RelationshipKind::OneToMany);

    let mut bench = Workbench::new(vec![a, b, c]);
    bench.render(LayoutAlgorithm::Hierarchical);

    let rects = bench.entity_rects();
    let mut ys: Vec<i64> = rects.values().map(|r| r.y.round() as i64).collect();
    ys.sort_unstable();
    ys.dedup();
    // ceil(sqrt(3)) = 2 entities per fallback layer.
    assert_eq!(ys.len(), 2);
}

#[test]
fn every_algorithm_produces_non_overlapping_boxes() {
    for algorithm in [
        LayoutAlgorithm::Grid,
        LayoutAlgorithm::Hierarchical,
        LayoutAlgorithm::Force,
        LayoutAlgorithm::Smart,
    ] {
        let mut bench = Workbench::new(diamond_schema());
        bench.render(algorithm);

        let rects: Vec<(String, Rect)> = bench.entity_rects().into_iter().collect();
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(
                    !rects[i].1.overlaps(&rects[j].1, -0.5),
                    "{algorithm:?}: {} overlaps {}",
                    rects[i].0,
                    rects[j].0,
                );
            }
        }
    }
}

#[test]
fn new_entities_avoid_already_placed_ones() {
    for algorithm in [
        LayoutAlgorithm::Grid,
        LayoutAlgorithm::Hierarchical,
        LayoutAlgorithm::Force,
        LayoutAlgorithm::Smart,
    ] {
        let mut bench = Workbench::new(vec![entity("anchor1"), entity("anchor2")]);
        bench.render(algorithm);

        // Simulate two dragged entities sitting mid-canvas.
        bench
            .scene
            .cell_mut(&entity_cell_id("anchor1"))
            .unwrap()
            .position = Point::new(700.0, 400.0);
        bench
            .scene
            .cell_mut(&entity_cell_id("anchor2"))
            .unwrap()
            .position = Point::new(1000.0, 420.0);

        let late = diamond_schema();
        for e in late {
            bench.registry.add_entity(e, None);
        }
        bench.render(algorithm);

        let rects = bench.entity_rects();
        assert_eq!(rects["anchor1"].x, 700.0);
        assert_eq!(rects["anchor2"].x, 1000.0);
        let anchors = [rects["anchor1"], rects["anchor2"]];
        for (name, rect) in &rects {
            if name.starts_with("anchor") {
                continue;
            }
            for anchor in &anchors {
                assert!(
                    !rect.overlaps(anchor, -0.5),
                    "{algorithm:?}: {name} overlaps a pre-placed entity"
                );
            }
        }
    }
}

#[test]
fn force_layout_positions_are_always_finite() {
    let mut entities = Vec::new();
    for i in 0..12 {
        entities.push(entity(&format!("n{i}")));
    }
    // Dense connectivity to stress the simulation.
    for i in 0..12 {
        for j in (i + 1)..12 {
            if (i + j) % 3 == 0 {
                let (left, right) = entities.split_at_mut(j);
                relate(&mut left[i], &mut right[0], RelationshipKind::ManyToMany);
            }
        }
    }

    let mut bench = Workbench::new(entities);
    bench.render(LayoutAlgorithm::Force);

    for (name, rect) in bench.entity_rects() {
        assert!(rect.x.is_finite() && rect.y.is_finite(), "{name} is not finite");
    }
}

#[test]
fn dragged_positions_survive_entity_removal_and_readdition() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Grid);

    let dragged = Point::new(900.0, 700.0);
    bench
        .scene
        .cell_mut(&entity_cell_id("alpha"))
        .unwrap()
        .position = dragged;

    // Removing beta must not disturb alpha's dragged spot.
    bench.registry.remove_entity("beta");
    bench.render(LayoutAlgorithm::Grid);
    assert_eq!(bench.entity_rects()["alpha"].x, dragged.x);
    assert!(bench.tracker.get("beta").is_none());

    // Re-adding beta sends it through layout again; alpha still holds.
    let mut beta = entity("beta");
    let mut alpha_clone = entity("alpha");
    relate(&mut alpha_clone, &mut beta, RelationshipKind::OneToMany);
    bench.registry.add_entity(beta, None);
    bench.render(LayoutAlgorithm::Grid);

    let rects = bench.entity_rects();
    assert_eq!(rects["alpha"].x, dragged.x);
    assert_eq!(rects["alpha"].y, dragged.y);
    assert!(rects.contains_key("beta"));
}

#[test]
fn mode_switch_changes_box_dimensions() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Grid);
    let simple_height = bench.entity_rects()["alpha"].height;

    bench.registry.set_mode(DiagramMode::Detailed);
    bench.tracker.clear();
    bench.render(LayoutAlgorithm::Grid);
    let detailed_height = bench.entity_rects()["alpha"].height;

    assert_eq!(simple_height, 80.0);
    assert!(detailed_height > simple_height);
}

#[test]
fn document_round_trip_preserves_entities_view_and_decorations() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Hierarchical);

    let mut elements = ElementRegistry::new();
    let square_id = elements.add_square(&mut bench.scene);
    let text_id = elements.add_text(&mut bench.scene, "release scope");
    bench.viewport.load(Point::new(12.0, 34.0), 0.75);

    let document = snapshot(
        &bench.registry,
        &bench.scene,
        &bench.viewport,
        "2024-06-12T08:30:00Z",
    );
    let json = serde_json::to_string_pretty(&document).unwrap();
    let reloaded = parse_document(&json).unwrap();

    let mut registry = EntityRegistry::new();
    let mut scene = Scene::new();
    let mut tracker = PositionTracker::new();
    let mut viewport = Viewport::default();
    restore(&reloaded, &mut registry, &mut scene, &mut tracker, &mut viewport).unwrap();

    assert_eq!(registry.len(), bench.registry.len());
    assert_eq!(scene.len(), bench.scene.len());
    assert_eq!(viewport.zoom, 0.75);
    assert_eq!(viewport.pan, Point::new(12.0, 34.0));
    assert_eq!(reloaded.timestamp, "2024-06-12T08:30:00Z");

    let square = scene.cell(&square_id).expect("square survived");
    assert_eq!(square.size, Size::new(200.0, 150.0));
    assert!(matches!(square.body, CellBody::Square(_)));
    assert!(scene.cell(&text_id).is_some());

    // Positions restored cell-for-cell.
    for cell in bench.scene.entity_boxes() {
        assert_eq!(scene.cell(&cell.id).unwrap().position, cell.position);
    }
}

#[test]
fn restored_document_rerenders_without_moving_anything() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Force);
    let before = bench.entity_rects();

    let document = snapshot(&bench.registry, &bench.scene, &bench.viewport, "t");
    let json = serde_json::to_string(&document).unwrap();
    let reloaded = parse_document(&json).unwrap();

    let mut registry = EntityRegistry::new();
    let mut scene = Scene::new();
    let mut tracker = PositionTracker::new();
    let mut viewport = Viewport::default();
    restore(&reloaded, &mut registry, &mut scene, &mut tracker, &mut viewport).unwrap();

    render(
        &registry,
        &mut tracker,
        &mut scene,
        &mut viewport,
        &OrthogonalRouter,
        LayoutAlgorithm::Grid,
        &bench.config,
    );

    for (name, rect) in &before {
        let restored = scene
            .entity_box(name)
            .expect("entity restored")
            .rect();
        assert_eq!(restored.x, rect.x, "{name} moved on reload");
        assert_eq!(restored.y, rect.y, "{name} moved on reload");
    }
}

#[test]
fn malformed_documents_fail_loudly() {
    assert!(matches!(
        parse_document("{ definitely not json"),
        Err(DocumentError::Parse(_))
    ));
    assert!(matches!(
        parse_document(r#"{ "version": "1.0", "timestamp": "t", "currentEntities": [] }"#),
        Err(DocumentError::MissingGraph)
    ));
}

#[test]
fn unknown_cells_are_carried_through_resave() {
    let json = r#"{
        "version": "1.0",
        "timestamp": "t",
        "diagramType": "simple",
        "currentEntities": [],
        "graph": { "cells": [
            { "type": "erd.portal", "id": "p1",
              "position": { "x": 5.0, "y": 6.0 },
              "size": { "width": 70.0, "height": 40.0 } }
        ] }
    }"#;
    let document = parse_document(json).unwrap();

    let mut registry = EntityRegistry::new();
    let mut scene = Scene::new();
    let mut tracker = PositionTracker::new();
    let mut viewport = Viewport::default();
    restore(&document, &mut registry, &mut scene, &mut tracker, &mut viewport).unwrap();

    let resaved = snapshot(&registry, &scene, &viewport, "t");
    let cells = &resaved.graph.as_ref().unwrap().cells;
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].cell_type, "erd.portal");
    assert_eq!(cells[0].position.unwrap(), Point::new(5.0, 6.0));
}

#[test]
fn svg_export_contains_every_entity_title() {
    let mut bench = Workbench::new(diamond_schema());
    bench.render(LayoutAlgorithm::Grid);

    let svg = render_svg(&bench.scene, &bench.registry);
    for entity in bench.registry.entities() {
        assert!(
            svg.contains(&entity.display_name),
            "missing {} in SVG output",
            entity.display_name
        );
    }
    assert!(svg.contains("<polyline"));
}
