//! Smooth path construction from stroke points.

use kurbo::{BezPath, Point};

/// Build a renderable path from an ordered point sequence.
///
/// Each interior point becomes the control point of a quadratic segment
/// ending at the midpoint of that point and its successor, which smooths
/// raw polyline input; the final segment runs straight to the last point.
/// Two points degenerate to a line, fewer produce an empty path.
///
/// Stateless and safe to call every frame, on in-progress strokes as well
/// as completed ones.
pub fn smooth_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if points.len() < 2 {
        return path;
    }

    path.move_to(points[0]);
    if points.len() == 2 {
        path.line_to(points[1]);
        return path;
    }

    for window in points[1..].windows(2) {
        let ctrl = window[0];
        let next = window[1];
        let mid = Point::new((ctrl.x + next.x) / 2.0, (ctrl.y + next.y) / 2.0);
        path.quad_to(ctrl, mid);
    }
    path.line_to(points[points.len() - 1]);

    path
}
