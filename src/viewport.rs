use serde::{Deserialize, Serialize};

use crate::scene::{Point, Rect};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 3.0;
const ZOOM_IN_STEP: f64 = 1.1;
const ZOOM_OUT_STEP: f64 = 0.9;
const FIT_MARGIN: f64 = 100.0;
const FIT_MAX_SCALE: f64 = 2.0;

/// Pan/zoom state over an unbounded canvas. `pan` is the translation applied
/// before scaling, so a scene point `p` lands at `(p + pan) * zoom` on screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
    #[serde(skip)]
    pub view_width: f64,
    #[serde(skip)]
    pub view_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::new(0.0, 0.0),
            zoom: 1.0,
            view_width: 1920.0,
            view_height: 1080.0,
        }
    }
}

impl Viewport {
    pub fn with_view(width: f64, height: f64) -> Self {
        Self {
            view_width: width,
            view_height: height,
            ..Self::default()
        }
    }

    /// Scene coordinates of the screen point `screen`.
    pub fn to_scene(&self, screen: Point) -> Point {
        Point::new(
            screen.x / self.zoom - self.pan.x,
            screen.y / self.zoom - self.pan.y,
        )
    }

    pub fn to_screen(&self, scene: Point) -> Point {
        Point::new(
            (scene.x + self.pan.x) * self.zoom,
            (scene.y + self.pan.y) * self.zoom,
        )
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    pub fn zoom_in(&mut self, focal: Point) {
        self.zoom_about(focal, self.zoom * ZOOM_IN_STEP);
    }

    pub fn zoom_out(&mut self, focal: Point) {
        self.zoom_about(focal, self.zoom * ZOOM_OUT_STEP);
    }

    /// Sets the zoom level, keeping the scene point under `focal` (a screen
    /// coordinate) stationary. The level is clamped to [MIN_ZOOM, MAX_ZOOM].
    pub fn zoom_about(&mut self, focal: Point, level: f64) {
        let level = level.clamp(MIN_ZOOM, MAX_ZOOM);
        let anchor = self.to_scene(focal);
        self.zoom = level;
        self.pan.x = focal.x / self.zoom - anchor.x;
        self.pan.y = focal.y / self.zoom - anchor.y;
    }

    pub fn set_zoom(&mut self, level: f64) {
        self.zoom = level.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn reset(&mut self) {
        self.pan = Point::new(0.0, 0.0);
        self.zoom = 1.0;
    }

    /// Restores a persisted pan/zoom pair, clamping the zoom so documents
    /// written by hand cannot push the view out of range.
    pub fn load(&mut self, pan: Point, zoom: f64) {
        self.pan = pan;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Fits `content` into the view with a fixed margin, centered, never
    /// zooming in past FIT_MAX_SCALE. An empty bounding box resets the view.
    pub fn fit(&mut self, content: Option<Rect>) {
        let Some(content) = content else {
            self.reset();
            return;
        };
        if content.width <= 0.0 || content.height <= 0.0 {
            self.reset();
            return;
        }

        let scale_x = (self.view_width - 2.0 * FIT_MARGIN) / content.width;
        let scale_y = (self.view_height - 2.0 * FIT_MARGIN) / content.height;
        let scale = scale_x
            .min(scale_y)
            .min(FIT_MAX_SCALE)
            .clamp(MIN_ZOOM, MAX_ZOOM);

        self.zoom = scale;
        let center = content.center();
        self.pan.x = self.view_width / (2.0 * scale) - center.x;
        self.pan.y = self.view_height / (2.0 * scale) - center.y;
    }
}

/// In-progress rubber-band selection, tracked in scene coordinates.
#[derive(Debug, Clone, Default)]
pub struct RubberBand {
    origin: Option<Point>,
    current: Option<Point>,
}

impl RubberBand {
    pub fn begin(&mut self, at: Point) {
        self.origin = Some(at);
        self.current = Some(at);
    }

    pub fn update(&mut self, at: Point) {
        if self.origin.is_some() {
            self.current = Some(at);
        }
    }

    pub fn is_active(&self) -> bool {
        self.origin.is_some()
    }

    /// Normalized selection rectangle, regardless of drag direction.
    pub fn rect(&self) -> Option<Rect> {
        let (a, b) = (self.origin?, self.current?);
        Some(Rect::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        ))
    }

    /// Ends the drag and returns the final rectangle, if any.
    pub fn finish(&mut self) -> Option<Rect> {
        let rect = self.rect();
        self.origin = None;
        self.current = None;
        rect
    }

    /// Selection uses full containment, not intersection.
    pub fn hits(&self, target: Rect) -> bool {
        self.rect().is_some_and(|band| band.contains_rect(&target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut viewport = Viewport::default();
        viewport.set_zoom(0.01);
        assert_eq!(viewport.zoom, MIN_ZOOM);
        viewport.set_zoom(50.0);
        assert_eq!(viewport.zoom, MAX_ZOOM);
    }

    #[test]
    fn zoom_about_keeps_the_focal_point_fixed() {
        let mut viewport = Viewport::default();
        viewport.pan_by(30.0, -12.0);
        let focal = Point::new(400.0, 250.0);
        let before = viewport.to_scene(focal);

        viewport.zoom_in(focal);
        let after = viewport.to_scene(focal);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        assert!((viewport.zoom - 1.1).abs() < 1e-9);
    }

    #[test]
    fn fit_centers_content_within_the_margin() {
        let mut viewport = Viewport::with_view(1920.0, 1080.0);
        viewport.fit(Some(Rect::new(0.0, 0.0, 800.0, 400.0)));

        let center = viewport.to_screen(Point::new(400.0, 200.0));
        assert!((center.x - 960.0).abs() < 1e-6);
        assert!((center.y - 540.0).abs() < 1e-6);
        assert!(viewport.zoom <= FIT_MAX_SCALE);
    }

    #[test]
    fn fit_without_content_resets_the_view() {
        let mut viewport = Viewport::default();
        viewport.pan_by(500.0, 500.0);
        viewport.set_zoom(2.5);
        viewport.fit(None);
        assert_eq!(viewport.zoom, 1.0);
        assert_eq!(viewport.pan.x, 0.0);
    }

    #[test]
    fn rubber_band_normalizes_a_reverse_drag() {
        let mut band = RubberBand::default();
        band.begin(Point::new(300.0, 200.0));
        band.update(Point::new(100.0, 50.0));

        let rect = band.finish().unwrap();
        assert_eq!(rect.x, 100.0);
        assert_eq!(rect.y, 50.0);
        assert_eq!(rect.width, 200.0);
        assert_eq!(rect.height, 150.0);
        assert!(!band.is_active());
    }

    #[test]
    fn rubber_band_hits_only_fully_contained_rects() {
        let mut band = RubberBand::default();
        band.begin(Point::new(0.0, 0.0));
        band.update(Point::new(500.0, 500.0));

        assert!(band.hits(Rect::new(100.0, 100.0, 120.0, 80.0)));
        assert!(!band.hits(Rect::new(450.0, 450.0, 120.0, 80.0)));
    }
}
