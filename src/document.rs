use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::positions::PositionTracker;
use crate::registry::{DiagramMode, EntityRegistry};
use crate::scene::{
    Cell, CellBody, Point, Scene, Size, SquareStyle, TextStyle, CONNECTOR_CELL, ENTITY_CELL,
    SIMPLE_ENTITY_CELL, SQUARE_CELL, TEXT_CELL,
};
use crate::schema::Entity;
use crate::viewport::Viewport;

pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read or write diagram file: {0}")]
    Io(#[from] std::io::Error),
    #[error("diagram file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("diagram file has no graph section")]
    MissingGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(rename = "panPosition")]
    pub pan_position: Point,
    pub zoom: f64,
}

/// One serialized scene cell. Only the fields a given cell kind needs are
/// written; everything unknown rides along in `attrs` so resaving a document
/// from a newer version does not silently strip data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub cells: Vec<RawCell>,
}

/// On-disk diagram format. `timestamp` is whatever the caller supplies and
/// is preserved verbatim on load/save cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramDocument {
    pub version: String,
    pub timestamp: String,
    #[serde(rename = "diagramType", default)]
    pub diagram_type: DiagramMode,
    #[serde(rename = "currentEntities", default)]
    pub current_entities: Vec<Entity>,
    #[serde(default)]
    pub graph: Option<RawGraph>,
    #[serde(rename = "viewState", default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ViewState>,
}

pub fn load_document(path: &Path) -> Result<DiagramDocument, DocumentError> {
    let contents = fs::read_to_string(path)?;
    parse_document(&contents)
}

pub fn parse_document(contents: &str) -> Result<DiagramDocument, DocumentError> {
    let document: DiagramDocument = serde_json::from_str(contents)?;
    if document.graph.is_none() {
        return Err(DocumentError::MissingGraph);
    }
    Ok(document)
}

pub fn save_document(path: &Path, document: &DiagramDocument) -> Result<(), DocumentError> {
    let contents = serde_json::to_string_pretty(document)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Captures the full diagram state into a document.
pub fn snapshot(
    registry: &EntityRegistry,
    scene: &Scene,
    viewport: &Viewport,
    timestamp: impl Into<String>,
) -> DiagramDocument {
    let cells = scene.cells().iter().map(raw_cell).collect();
    DiagramDocument {
        version: DOCUMENT_VERSION.to_string(),
        timestamp: timestamp.into(),
        diagram_type: registry.mode(),
        current_entities: registry.entities().to_vec(),
        graph: Some(RawGraph { cells }),
        view_state: Some(ViewState {
            pan_position: viewport.pan,
            zoom: viewport.zoom,
        }),
    }
}

/// Rebuilds registry, scene, tracker and viewport from a document. Cell-level
/// problems degrade that one cell (or drop it with a warning); they never
/// fail the whole load.
pub fn restore(
    document: &DiagramDocument,
    registry: &mut EntityRegistry,
    scene: &mut Scene,
    tracker: &mut PositionTracker,
    viewport: &mut Viewport,
) -> Result<(), DocumentError> {
    let graph = document.graph.as_ref().ok_or(DocumentError::MissingGraph)?;

    registry.replace_all(document.current_entities.clone());
    registry.set_mode(document.diagram_type);

    scene.clear();
    let detailed = document.diagram_type == DiagramMode::Detailed;
    for (index, raw) in graph.cells.iter().enumerate() {
        if let Some(cell) = revive_cell(raw, index, detailed) {
            scene.add_cell(cell);
        }
    }

    tracker.clear();
    tracker.capture(scene);
    tracker.prune(&registry.schema_names());

    match &document.view_state {
        Some(view) => viewport.load(view.pan_position, view.zoom),
        None => viewport.reset(),
    }
    Ok(())
}

fn raw_cell(cell: &Cell) -> RawCell {
    let mut raw = RawCell {
        cell_type: cell.type_tag().to_string(),
        id: Some(cell.id.clone()),
        entity: None,
        position: Some(cell.position),
        size: Some(cell.size),
        source: None,
        target: None,
        relationships: None,
        route: None,
        attrs: None,
    };
    match &cell.body {
        CellBody::EntityBox { entity, .. } => raw.entity = Some(entity.clone()),
        CellBody::Connector {
            source,
            target,
            relationships,
            route,
        } => {
            raw.position = None;
            raw.size = None;
            raw.source = Some(source.clone());
            raw.target = Some(target.clone());
            raw.relationships = Some(relationships.clone());
            raw.route = Some(route.clone());
        }
        CellBody::Square(style) => {
            raw.attrs = serde_json::to_value(style).ok();
        }
        CellBody::Text(style) => {
            raw.attrs = serde_json::to_value(style).ok();
        }
        CellBody::Generic { .. } => raw.attrs = None,
    }
    raw
}

fn revive_cell(raw: &RawCell, index: usize, detailed: bool) -> Option<Cell> {
    let id = raw
        .id
        .clone()
        .unwrap_or_else(|| format!("cell:{index}"));
    let position = raw.position.unwrap_or_default();
    let size = raw.size.unwrap_or_default();

    let body = match raw.cell_type.as_str() {
        ENTITY_CELL | SIMPLE_ENTITY_CELL => match &raw.entity {
            Some(entity) => CellBody::EntityBox {
                entity: entity.clone(),
                detailed,
            },
            None => {
                warn!(cell = %id, "entity cell without an entity name, dropped");
                return None;
            }
        },
        SQUARE_CELL => CellBody::Square(style_from_attrs(raw, &id)),
        TEXT_CELL => CellBody::Text(style_from_attrs(raw, &id)),
        CONNECTOR_CELL => connector_body(raw, &id)?,
        other if other.contains("link") => {
            warn!(cell = %id, cell_type = other, "unknown link type, treating as connector");
            connector_body(raw, &id)?
        }
        other => {
            warn!(cell = %id, cell_type = other, "unknown cell type, keeping as generic box");
            CellBody::Generic {
                original_type: other.to_string(),
            }
        }
    };

    Some(Cell {
        id,
        position,
        size,
        body,
    })
}

fn connector_body(raw: &RawCell, id: &str) -> Option<CellBody> {
    let (Some(source), Some(target)) = (&raw.source, &raw.target) else {
        warn!(cell = %id, "connector without endpoints, dropped");
        return None;
    };
    Some(CellBody::Connector {
        source: source.clone(),
        target: target.clone(),
        relationships: raw.relationships.clone().unwrap_or_default(),
        route: raw.route.clone().unwrap_or_default(),
    })
}

fn style_from_attrs<T: Default + for<'de> Deserialize<'de>>(raw: &RawCell, id: &str) -> T {
    match &raw.attrs {
        Some(attrs) => serde_json::from_value(attrs.clone()).unwrap_or_else(|error| {
            warn!(cell = %id, %error, "unreadable cell style, using defaults");
            T::default()
        }),
        None => T::default(),
    }
}
