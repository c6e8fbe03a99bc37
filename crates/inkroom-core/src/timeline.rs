//! The local timeline: one client's ordered view of strokes plus an
//! undo/redo cursor.
//!
//! Undo and redo only move the cursor that bounds the visible prefix.
//! Nothing is retracted from or re-appended to the shared log, so one
//! client's undo is never seen by other participants.

use crate::stroke::{Delivery, Stroke};
use kurbo::Point;
use uuid::Uuid;

/// A stroke as known to this client, with its delivery state.
#[derive(Debug, Clone)]
pub struct TimelineStroke {
    pub stroke: Stroke,
    pub delivery: Delivery,
}

/// Ordered stroke sequence with a cursor `curr` (0 ≤ curr ≤ len).
/// Strokes below the cursor are visible; strokes at or above it are
/// redo-available but hidden.
#[derive(Debug, Clone, Default)]
pub struct LocalTimeline {
    strokes: Vec<TimelineStroke>,
    curr: usize,
    /// Index of the in-progress stroke while a gesture is live.
    drafting: Option<usize>,
}

impl LocalTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total strokes known, visible or not.
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.curr
    }

    /// The visible prefix, in draw order.
    pub fn visible(&self) -> &[TimelineStroke] {
        &self.strokes[..self.curr]
    }

    /// All known strokes, including the hidden redo branch.
    pub fn strokes(&self) -> &[TimelineStroke] {
        &self.strokes
    }

    // --- Local stroke lifecycle ---

    /// Begin a new local stroke. Any redo branch beyond the cursor is
    /// discarded first: a new edit invalidates redo history.
    pub fn start_stroke(&mut self, candidate: Stroke) {
        self.strokes.truncate(self.curr);
        self.drafting = Some(self.curr);
        self.strokes.push(TimelineStroke {
            stroke: candidate,
            delivery: Delivery::Pending,
        });
        self.curr += 1;
    }

    /// Append a point to the in-progress stroke. Ignored when no gesture
    /// is live, so a completed stroke can never be mutated.
    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(idx) = self.drafting {
            self.strokes[idx].stroke.add_point(point);
        }
    }

    /// Freeze the in-progress stroke. Returns a copy for transmission when
    /// the stroke is renderable; shorter gestures stay local and hidden.
    pub fn finalize_stroke(&mut self) -> Option<Stroke> {
        let idx = self.drafting.take()?;
        let entry = &self.strokes[idx];
        entry.stroke.is_renderable().then(|| entry.stroke.clone())
    }

    // --- Cursor movement ---

    /// Hide the most recent visible stroke. No-op at the start.
    pub fn undo(&mut self) {
        self.curr = self.curr.saturating_sub(1);
    }

    /// Reveal the next hidden stroke. No-op at the end.
    pub fn redo(&mut self) {
        if self.curr < self.strokes.len() {
            self.curr += 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.curr > 0
    }

    pub fn can_redo(&self) -> bool {
        self.curr < self.strokes.len()
    }

    // --- Shared-log integration ---

    /// Insert a remote stroke at the cursor boundary: immediately visible,
    /// already confirmed, and the new undo boundary. Strokes before the
    /// cursor and any hidden redo branch are left untouched, as is an
    /// in-progress local stroke.
    pub fn merge_remote(&mut self, stroke: Stroke) {
        self.strokes.insert(
            self.curr,
            TimelineStroke {
                stroke,
                delivery: Delivery::Confirmed,
            },
        );
        self.curr += 1;
    }

    /// Mark the pending stroke with this id as present in the shared log.
    /// Returns false if no pending stroke matches.
    pub fn confirm(&mut self, id: Uuid) -> bool {
        for entry in &mut self.strokes {
            if entry.stroke.id == id && entry.delivery == Delivery::Pending {
                entry.delivery = Delivery::Confirmed;
                return true;
            }
        }
        false
    }

    /// Drop everything: strokes, cursor, and any in-progress gesture.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.curr = 0;
        self.drafting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::BrushColor;

    fn stroke(points: &[(f64, f64)]) -> Stroke {
        let mut s = Stroke::new(
            Point::new(points[0].0, points[0].1),
            BrushColor::Red,
            5.0,
            0,
            "ada",
        );
        for &(x, y) in &points[1..] {
            s.add_point(Point::new(x, y));
        }
        s
    }

    fn draw(timeline: &mut LocalTimeline, points: &[(f64, f64)]) -> Option<Stroke> {
        timeline.start_stroke(stroke(&points[..1]));
        for &(x, y) in &points[1..] {
            timeline.extend_stroke(Point::new(x, y));
        }
        timeline.finalize_stroke()
    }

    #[test]
    fn test_initial_state() {
        let timeline = LocalTimeline::new();
        assert_eq!(timeline.len(), 0);
        assert_eq!(timeline.cursor(), 0);
        assert!(timeline.visible().is_empty());
    }

    #[test]
    fn test_undo_then_redo_restores_visible_prefix() {
        let mut timeline = LocalTimeline::new();
        let completed = draw(&mut timeline, &[(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)]);
        assert!(completed.is_some());
        assert_eq!(timeline.cursor(), 1);

        timeline.undo();
        assert_eq!(timeline.visible().len(), 0);
        timeline.redo();
        assert_eq!(timeline.visible().len(), 1);
        assert_eq!(timeline.visible()[0].stroke.points.len(), 3);
    }

    #[test]
    fn test_undo_at_zero_is_noop() {
        let mut timeline = LocalTimeline::new();
        timeline.undo();
        assert_eq!(timeline.cursor(), 0);

        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        draw(&mut timeline, &[(2.0, 2.0), (3.0, 3.0)]);

        // Pressing undo three times from curr = 2 bottoms out at 0.
        timeline.undo();
        timeline.undo();
        timeline.undo();
        assert_eq!(timeline.cursor(), 0);
    }

    #[test]
    fn test_redo_at_end_is_noop() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        timeline.redo();
        assert_eq!(timeline.cursor(), 1);
    }

    #[test]
    fn test_new_stroke_discards_redo_branch() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        draw(&mut timeline, &[(2.0, 2.0), (3.0, 3.0)]);
        draw(&mut timeline, &[(4.0, 4.0), (5.0, 5.0)]);

        timeline.undo();
        timeline.undo();
        assert_eq!(timeline.cursor(), 1);
        assert_eq!(timeline.len(), 3);

        // Starting a fresh gesture truncates to the visible prefix plus
        // the new candidate.
        draw(&mut timeline, &[(9.0, 9.0), (8.0, 8.0)]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.cursor(), 2);
        assert!(!timeline.can_redo());
    }

    #[test]
    fn test_short_gesture_not_transmitted() {
        let mut timeline = LocalTimeline::new();
        let completed = draw(&mut timeline, &[(0.0, 0.0)]);
        assert!(completed.is_none());
        // The dot still occupies a timeline slot, as the drawing screens
        // have always kept it; rendering filters it out.
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_extend_after_finalize_ignored() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        timeline.extend_stroke(Point::new(99.0, 99.0));
        assert_eq!(timeline.visible()[0].stroke.points.len(), 2);
    }

    #[test]
    fn test_merge_remote_becomes_visible_and_undo_boundary() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        let before: Vec<_> = timeline.visible()[0].stroke.points.clone();

        timeline.merge_remote(stroke(&[(5.0, 5.0), (6.0, 6.0)]));
        assert_eq!(timeline.cursor(), 2);
        assert_eq!(timeline.visible().len(), 2);
        assert_eq!(timeline.visible()[1].delivery, Delivery::Confirmed);
        // Existing strokes are untouched.
        assert_eq!(timeline.visible()[0].stroke.points, before);

        // Undo after a merge hides the remote stroke first.
        timeline.undo();
        assert_eq!(timeline.visible().len(), 1);
    }

    #[test]
    fn test_merge_remote_preserves_redo_branch() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        draw(&mut timeline, &[(2.0, 2.0), (3.0, 3.0)]);
        timeline.undo();

        timeline.merge_remote(stroke(&[(5.0, 5.0), (6.0, 6.0)]));
        assert_eq!(timeline.cursor(), 2);
        assert_eq!(timeline.len(), 3);
        // The undone local stroke is still redoable behind the merge.
        timeline.redo();
        assert_eq!(timeline.visible().len(), 3);
    }

    #[test]
    fn test_merge_during_live_gesture_keeps_draft_growing() {
        let mut timeline = LocalTimeline::new();
        timeline.start_stroke(stroke(&[(0.0, 0.0)]));
        timeline.merge_remote(stroke(&[(5.0, 5.0), (6.0, 6.0)]));
        timeline.extend_stroke(Point::new(1.0, 1.0));
        let completed = timeline.finalize_stroke().unwrap();
        assert_eq!(completed.points.len(), 2);
        assert_eq!(timeline.cursor(), 2);
    }

    #[test]
    fn test_confirm_marks_pending() {
        let mut timeline = LocalTimeline::new();
        let completed = draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]).unwrap();
        assert_eq!(timeline.visible()[0].delivery, Delivery::Pending);

        assert!(timeline.confirm(completed.id));
        assert_eq!(timeline.visible()[0].delivery, Delivery::Confirmed);
        // A second confirmation finds nothing pending.
        assert!(!timeline.confirm(completed.id));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut timeline = LocalTimeline::new();
        draw(&mut timeline, &[(0.0, 0.0), (1.0, 1.0)]);
        timeline.undo();
        timeline.clear();
        assert_eq!(timeline.len(), 0);
        assert_eq!(timeline.cursor(), 0);
        assert!(!timeline.can_undo());
        assert!(!timeline.can_redo());
    }
}
