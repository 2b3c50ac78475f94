use crate::scene::{Cell, CellBody, Point, Scene, Size, SquareStyle, TextStyle};

const SQUARE_BORDER_COLORS: [&str; 4] = ["#6b7280", "#2563eb", "#16a34a", "#dc2626"];
const SQUARE_FILL_COLORS: [&str; 4] = ["#f3f4f6", "#dbeafe", "#dcfce7", "#fee2e2"];

/// Stacking margin below the bottom-most element for new decorations.
const NEW_ELEMENT_MARGIN: f64 = 30.0;
const NEW_ELEMENT_X: f64 = 100.0;
const NEW_ELEMENT_MIN_Y: f64 = 50.0;

/// Creates decoration elements (rectangles, text labels) independent of
/// schema entities. Decorations are preserved verbatim across layout
/// re-renders.
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    next_square: u64,
    next_text: u64,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// New decorations land below everything currently drawn.
    fn next_free_y(scene: &Scene) -> f64 {
        let mut lowest = NEW_ELEMENT_MIN_Y;
        for cell in scene.cells() {
            let bottom = cell.rect().bottom();
            if bottom > lowest {
                lowest = bottom + NEW_ELEMENT_MARGIN;
            }
        }
        lowest
    }

    /// Adds a decoration rectangle behind all other cells. Returns its id.
    pub fn add_square(&mut self, scene: &mut Scene) -> String {
        let id = format!("square-{}", self.next_square);
        self.next_square += 1;

        let y = Self::next_free_y(scene);
        scene.add_cell(Cell {
            id: id.clone(),
            position: Point::new(NEW_ELEMENT_X, y),
            size: Size::new(200.0, 150.0),
            body: CellBody::Square(SquareStyle {
                border_color: SQUARE_BORDER_COLORS[0].to_string(),
                fill_color: SQUARE_FILL_COLORS[0].to_string(),
                border_width: 2.0,
                border_type: "dashed".to_string(),
                opacity: 0.7,
            }),
        });
        scene.to_back(&id);
        id
    }

    /// Adds a text label in front of all other cells. Returns its id.
    pub fn add_text(&mut self, scene: &mut Scene, text: impl Into<String>) -> String {
        let id = format!("text-{}", self.next_text);
        self.next_text += 1;

        let y = Self::next_free_y(scene);
        scene.add_cell(Cell {
            id: id.clone(),
            position: Point::new(NEW_ELEMENT_X, y),
            size: Size::new(120.0, 25.0),
            body: CellBody::Text(TextStyle {
                text: text.into(),
                font_size: 14.0,
                color: "black".to_string(),
            }),
        });
        id
    }

    pub fn remove(&self, scene: &mut Scene, id: &str) -> bool {
        scene.remove_cell(id)
    }
}
