use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Cell type tags as written into diagram documents.
pub const ENTITY_CELL: &str = "erd.entity";
pub const SIMPLE_ENTITY_CELL: &str = "erd.simple-entity";
pub const SQUARE_CELL: &str = "erd.square";
pub const TEXT_CELL: &str = "erd.text";
pub const CONNECTOR_CELL: &str = "erd.relationship-link";
pub const GENERIC_CELL: &str = "erd.box";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 120.0,
            height: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_parts(position: Point, size: Size) -> Self {
        Self::new(position.x, position.y, size.width, size.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlap test with an extra buffer around `other`.
    pub fn overlaps(&self, other: &Rect, buffer: f64) -> bool {
        !(self.right() + buffer < other.x
            || self.x > other.right() + buffer
            || self.bottom() + buffer < other.y
            || self.y > other.bottom() + buffer)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareStyle {
    pub border_color: String,
    pub fill_color: String,
    pub border_width: f64,
    pub border_type: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub text: String,
    pub font_size: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellBody {
    /// Box for a schema entity; `entity` is the schema name, `detailed`
    /// selects the attribute-listing box style.
    EntityBox { entity: String, detailed: bool },
    Square(SquareStyle),
    Text(TextStyle),
    Connector {
        source: String,
        target: String,
        /// Schema names of every relationship aggregated into this connector.
        relationships: Vec<String>,
        route: Vec<Point>,
    },
    /// Forward-compatibility fallback for cell kinds this version does not
    /// recognize; the original type tag is preserved for resaving.
    Generic { original_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: String,
    pub position: Point,
    pub size: Size,
    pub body: CellBody,
}

impl Cell {
    pub fn type_tag(&self) -> &str {
        match &self.body {
            CellBody::EntityBox { detailed: true, .. } => ENTITY_CELL,
            CellBody::EntityBox {
                detailed: false, ..
            } => SIMPLE_ENTITY_CELL,
            CellBody::Square(_) => SQUARE_CELL,
            CellBody::Text(_) => TEXT_CELL,
            CellBody::Connector { .. } => CONNECTOR_CELL,
            CellBody::Generic { original_type } => original_type,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }

    pub fn entity_name(&self) -> Option<&str> {
        match &self.body {
            CellBody::EntityBox { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

/// A batch of position updates applied as a single operation so connector
/// rerouting happens once, not once per moved cell.
#[derive(Debug, Clone, Default)]
pub struct SceneDiff {
    moves: Vec<(String, Point)>,
}

impl SceneDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_cell(&mut self, id: impl Into<String>, to: Point) -> &mut Self {
        self.moves.push((id.into(), to));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }
}

/// Strategy for computing connector paths. Injected into the scene rather
/// than registered globally, so per-diagram router state lives here.
pub trait ConnectorRouter {
    fn route(&self, source: Rect, target: Rect, obstacles: &[Rect]) -> Vec<Point>;
}

/// Default router: picks facing sides by center-delta dominance and bends
/// through a mid channel, nudging the channel off any obstacle it would cut
/// through.
#[derive(Debug, Clone, Default)]
pub struct OrthogonalRouter;

impl ConnectorRouter for OrthogonalRouter {
    fn route(&self, source: Rect, target: Rect, obstacles: &[Rect]) -> Vec<Point> {
        let sc = source.center();
        let tc = target.center();

        // Self-loop: short orthogonal loop off the right edge.
        if (sc.x - tc.x).abs() < f64::EPSILON && (sc.y - tc.y).abs() < f64::EPSILON {
            let pad = 30.0;
            return vec![
                Point::new(source.right(), sc.y - 10.0),
                Point::new(source.right() + pad, sc.y - 10.0),
                Point::new(source.right() + pad, sc.y + 10.0),
                Point::new(source.right(), sc.y + 10.0),
            ];
        }

        let dx = tc.x - sc.x;
        let dy = tc.y - sc.y;

        if dx.abs() >= dy.abs() {
            let (start, end) = if dx >= 0.0 {
                (Point::new(source.right(), sc.y), Point::new(target.x, tc.y))
            } else {
                (Point::new(source.x, sc.y), Point::new(target.right(), tc.y))
            };
            let mut mid_x = (start.x + end.x) / 2.0;
            for obstacle in obstacles {
                if mid_x > obstacle.x
                    && mid_x < obstacle.right()
                    && span_overlaps(start.y.min(end.y), start.y.max(end.y), obstacle.y, obstacle.bottom())
                {
                    mid_x = if dx >= 0.0 {
                        obstacle.right() + 10.0
                    } else {
                        obstacle.x - 10.0
                    };
                }
            }
            vec![
                start,
                Point::new(mid_x, start.y),
                Point::new(mid_x, end.y),
                end,
            ]
        } else {
            let (start, end) = if dy >= 0.0 {
                (Point::new(sc.x, source.bottom()), Point::new(tc.x, target.y))
            } else {
                (Point::new(sc.x, source.y), Point::new(tc.x, target.bottom()))
            };
            let mut mid_y = (start.y + end.y) / 2.0;
            for obstacle in obstacles {
                if mid_y > obstacle.y
                    && mid_y < obstacle.bottom()
                    && span_overlaps(start.x.min(end.x), start.x.max(end.x), obstacle.x, obstacle.right())
                {
                    mid_y = if dy >= 0.0 {
                        obstacle.bottom() + 10.0
                    } else {
                        obstacle.y - 10.0
                    };
                }
            }
            vec![
                start,
                Point::new(start.x, mid_y),
                Point::new(end.x, mid_y),
                end,
            ]
        }
    }
}

fn span_overlaps(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    a_min < b_max && b_min < a_max
}

/// The drawable scene: an ordered cell list (back to front). This is a plain
/// value description; a renderer adapter consumes it to draw boxes and
/// routed connectors.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    cells: Vec<Cell>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn add_cell(&mut self, cell: Cell) -> &Cell {
        self.cells.push(cell);
        self.cells.last().unwrap()
    }

    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    pub fn cell_mut(&mut self, id: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.id == id)
    }

    /// Removes a cell. Removing an entity box cascades to every connector
    /// referencing that entity.
    pub fn remove_cell(&mut self, id: &str) -> bool {
        let Some(index) = self.cells.iter().position(|c| c.id == id) else {
            return false;
        };
        let removed = self.cells.remove(index);
        if let CellBody::EntityBox { entity, .. } = &removed.body {
            let entity = entity.clone();
            self.cells.retain(|c| match &c.body {
                CellBody::Connector { source, target, .. } => {
                    *source != entity && *target != entity
                }
                _ => true,
            });
        }
        true
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn to_back(&mut self, id: &str) {
        if let Some(index) = self.cells.iter().position(|c| c.id == id) {
            let cell = self.cells.remove(index);
            self.cells.insert(0, cell);
        }
    }

    pub fn to_front(&mut self, id: &str) {
        if let Some(index) = self.cells.iter().position(|c| c.id == id) {
            let cell = self.cells.remove(index);
            self.cells.push(cell);
        }
    }

    pub fn entity_boxes(&self) -> impl Iterator<Item = &Cell> {
        self.cells
            .iter()
            .filter(|c| matches!(c.body, CellBody::EntityBox { .. }))
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Cell> {
        self.cells
            .iter()
            .filter(|c| matches!(c.body, CellBody::Connector { .. }))
    }

    pub fn decorations(&self) -> impl Iterator<Item = &Cell> {
        self.cells
            .iter()
            .filter(|c| matches!(c.body, CellBody::Square(_) | CellBody::Text(_)))
    }

    pub fn entity_box(&self, entity: &str) -> Option<&Cell> {
        self.entity_boxes()
            .find(|c| c.entity_name() == Some(entity))
    }

    /// Live entity positions keyed by schema name.
    pub fn entity_positions(&self) -> BTreeMap<String, Point> {
        self.entity_boxes()
            .filter_map(|c| c.entity_name().map(|e| (e.to_string(), c.position)))
            .collect()
    }

    pub fn bbox(&self) -> Option<Rect> {
        let mut iter = self
            .cells
            .iter()
            .filter(|c| !matches!(c.body, CellBody::Connector { .. }));
        let first = iter.next()?.rect();
        Some(iter.fold(first, |acc, c| acc.union(&c.rect())))
    }

    /// Applies every queued move, then recomputes all connector routes once.
    pub fn apply(&mut self, diff: &SceneDiff, router: &dyn ConnectorRouter) {
        for (id, to) in &diff.moves {
            if let Some(cell) = self.cell_mut(id) {
                cell.position = *to;
            }
        }
        self.reroute(router);
    }

    /// Recomputes connector routes against current entity-box geometry.
    pub fn reroute(&mut self, router: &dyn ConnectorRouter) {
        let boxes: BTreeMap<String, Rect> = self
            .entity_boxes()
            .filter_map(|c| c.entity_name().map(|e| (e.to_string(), c.rect())))
            .collect();
        let all_rects: Vec<(String, Rect)> =
            boxes.iter().map(|(k, v)| (k.clone(), *v)).collect();

        for cell in &mut self.cells {
            if let CellBody::Connector {
                source,
                target,
                route,
                ..
            } = &mut cell.body
            {
                let (Some(src), Some(dst)) = (boxes.get(source), boxes.get(target)) else {
                    continue;
                };
                let obstacles: Vec<Rect> = all_rects
                    .iter()
                    .filter(|(name, _)| name != source && name != target)
                    .map(|(_, r)| *r)
                    .collect();
                *route = router.route(*src, *dst, &obstacles);
            }
        }
    }
}
