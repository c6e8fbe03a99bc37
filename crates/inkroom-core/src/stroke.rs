//! Stroke data model.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stroke thicknesses offered at authoring time.
pub const STROKE_WIDTHS: [f64; 4] = [5.0, 10.0, 20.0, 30.0];

/// Canvas background color; eraser strokes paint with this.
pub const CANVAS_BACKGROUND: &str = "#ffffff";

/// Semantic brush color.
///
/// Serialized as the lowercase color word, so logs written by older
/// canvases (`"red"`, `"eraser"`, ...) stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrushColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    White,
    /// Erases by painting with the canvas background color.
    Eraser,
}

impl BrushColor {
    /// Colors selectable from the palette (the eraser is a mode, not a swatch).
    pub const PALETTE: [BrushColor; 5] = [
        BrushColor::Red,
        BrushColor::Green,
        BrushColor::Blue,
        BrushColor::Yellow,
        BrushColor::White,
    ];

    /// The color a renderer should actually paint with.
    pub fn render_color(&self) -> &'static str {
        match self {
            BrushColor::Red => "red",
            BrushColor::Green => "green",
            BrushColor::Blue => "blue",
            BrushColor::Yellow => "yellow",
            BrushColor::White => "white",
            BrushColor::Eraser => CANVAS_BACKGROUND,
        }
    }
}

/// One continuous pointer-down-to-pointer-up drawing gesture.
///
/// Mutated by point appends while the gesture is live, frozen once the
/// gesture ends, and never edited after it reaches the shared log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Client-generated id, assigned before the stroke is sent anywhere.
    /// The reconciler uses it to recognize echoes of this client's own
    /// appends.
    pub id: Uuid,
    /// Ordered gesture points.
    pub points: Vec<Point>,
    pub color: BrushColor,
    /// Thickness, one of [`STROKE_WIDTHS`].
    pub stroke_width: f64,
    /// Author's local clock at gesture start, in milliseconds. Used for
    /// sequencing and display only, never for merge decisions.
    pub created_at: u64,
    /// Author display name.
    pub created_by: String,
}

impl Stroke {
    /// Create a candidate stroke seeded with the gesture's first point.
    pub fn new(
        first: Point,
        color: BrushColor,
        stroke_width: f64,
        created_at: u64,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: vec![first],
            color,
            stroke_width,
            created_at,
            created_by: created_by.into(),
        }
    }

    /// Append a point to the gesture.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Number of recorded points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if no points have been recorded.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A stroke needs at least two points to be rendered or persisted.
    /// Shorter gestures are kept locally but never sent or drawn.
    pub fn is_renderable(&self) -> bool {
        self.points.len() >= 2
    }
}

/// Delivery state of a stroke known to the local timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Rendered optimistically; the shared log has not echoed it yet.
    Pending,
    /// Present in the shared log (echo observed, or remote origin).
    Confirmed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stroke_has_one_point() {
        let stroke = Stroke::new(Point::new(1.0, 2.0), BrushColor::Red, 5.0, 0, "ada");
        assert_eq!(stroke.len(), 1);
        assert!(!stroke.is_renderable());
    }

    #[test]
    fn test_two_points_renderable() {
        let mut stroke = Stroke::new(Point::new(0.0, 0.0), BrushColor::Blue, 10.0, 0, "ada");
        stroke.add_point(Point::new(5.0, 5.0));
        assert!(stroke.is_renderable());
    }

    #[test]
    fn test_eraser_renders_as_background() {
        assert_eq!(BrushColor::Eraser.render_color(), CANVAS_BACKGROUND);
        assert_eq!(BrushColor::Red.render_color(), "red");
    }

    #[test]
    fn test_color_wire_format() {
        let json = serde_json::to_string(&BrushColor::Eraser).unwrap();
        assert_eq!(json, "\"eraser\"");
        let back: BrushColor = serde_json::from_str("\"yellow\"").unwrap();
        assert_eq!(back, BrushColor::Yellow);
    }

    #[test]
    fn test_stroke_roundtrip() {
        let mut stroke = Stroke::new(Point::new(0.0, 0.0), BrushColor::Green, 20.0, 1234, "ada");
        stroke.add_point(Point::new(3.0, 4.0));

        let json = serde_json::to_string(&stroke).unwrap();
        let back: Stroke = serde_json::from_str(&json).unwrap();

        assert_eq!(back, stroke);
        assert_eq!(back.points.len(), 2);
    }
}
