//! Gesture sampling into candidate strokes.

use crate::stroke::{BrushColor, Stroke};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Phase of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Start,
    Move,
    End,
}

/// One pointer motion sample from the platform's gesture layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub phase: GesturePhase,
    pub x: f64,
    pub y: f64,
}

impl GestureEvent {
    pub fn new(phase: GesturePhase, x: f64, y: f64) -> Self {
        Self { phase, x, y }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Stroke operation produced from one gesture sample.
#[derive(Debug, Clone)]
pub enum Sample {
    /// A new candidate stroke, seeded with the gesture's first point.
    Begin(Stroke),
    /// One more point for the in-progress stroke.
    Extend(Point),
    /// The gesture ended; the in-progress stroke is complete.
    Finish,
}

/// Converts raw gesture samples into ordered stroke operations.
///
/// Tracks whether a gesture is live so stray Move/End samples (delivered
/// after a cancel, or before any Start) are dropped instead of corrupting
/// the in-progress stroke.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrokeSampler {
    active: bool,
}

impl StrokeSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a gesture is currently live.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one gesture sample, capturing the brush settings at gesture
    /// start. A Start while a gesture is already live restarts it.
    pub fn sample(
        &mut self,
        event: GestureEvent,
        color: BrushColor,
        stroke_width: f64,
        author: &str,
        now_ms: u64,
    ) -> Option<Sample> {
        match event.phase {
            GesturePhase::Start => {
                self.active = true;
                Some(Sample::Begin(Stroke::new(
                    event.point(),
                    color,
                    stroke_width,
                    now_ms,
                    author,
                )))
            }
            GesturePhase::Move => self.active.then(|| Sample::Extend(event.point())),
            GesturePhase::End => {
                if self.active {
                    self.active = false;
                    Some(Sample::Finish)
                } else {
                    None
                }
            }
        }
    }

    /// Abandon the in-progress gesture without completing a stroke.
    pub fn cancel(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(x: f64, y: f64) -> GestureEvent {
        GestureEvent::new(GesturePhase::Start, x, y)
    }

    fn mv(x: f64, y: f64) -> GestureEvent {
        GestureEvent::new(GesturePhase::Move, x, y)
    }

    fn end(x: f64, y: f64) -> GestureEvent {
        GestureEvent::new(GesturePhase::End, x, y)
    }

    #[test]
    fn test_full_gesture() {
        let mut sampler = StrokeSampler::new();

        let begin = sampler.sample(start(0.0, 0.0), BrushColor::Red, 5.0, "ada", 100);
        let candidate = match begin {
            Some(Sample::Begin(s)) => s,
            other => panic!("expected Begin, got {:?}", other),
        };
        assert_eq!(candidate.points, vec![Point::new(0.0, 0.0)]);
        assert_eq!(candidate.color, BrushColor::Red);
        assert_eq!(candidate.created_at, 100);
        assert_eq!(candidate.created_by, "ada");
        assert!(sampler.is_active());

        match sampler.sample(mv(3.0, 4.0), BrushColor::Red, 5.0, "ada", 101) {
            Some(Sample::Extend(p)) => assert_eq!(p, Point::new(3.0, 4.0)),
            other => panic!("expected Extend, got {:?}", other),
        }

        assert!(matches!(
            sampler.sample(end(3.0, 4.0), BrushColor::Red, 5.0, "ada", 102),
            Some(Sample::Finish)
        ));
        assert!(!sampler.is_active());
    }

    #[test]
    fn test_stray_samples_ignored() {
        let mut sampler = StrokeSampler::new();
        assert!(sampler
            .sample(mv(1.0, 1.0), BrushColor::Red, 5.0, "ada", 0)
            .is_none());
        assert!(sampler
            .sample(end(1.0, 1.0), BrushColor::Red, 5.0, "ada", 0)
            .is_none());
    }

    #[test]
    fn test_cancel_drops_gesture() {
        let mut sampler = StrokeSampler::new();
        sampler.sample(start(0.0, 0.0), BrushColor::Red, 5.0, "ada", 0);
        sampler.cancel();
        assert!(sampler
            .sample(mv(1.0, 1.0), BrushColor::Red, 5.0, "ada", 0)
            .is_none());
    }

    #[test]
    fn test_gesture_event_serde() {
        let event = GestureEvent::new(GesturePhase::Start, 1.5, 2.5);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"start\""));
        let back: GestureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
