//! Canvas session orchestration.
//!
//! One `CanvasSession` per mounted canvas, whether the canvas stands
//! alone or is embedded in a room — only the canvas id differs. The
//! session owns the gesture sampler, the local timeline, the reconciler,
//! and the brush state, and queues completed strokes for the shared log.

use crate::log::{BoxFuture, LogResult, StrokeLog, Subscription};
use crate::path::smooth_path;
use crate::reconcile::{MergeOutcome, Reconciler};
use crate::sampler::{GestureEvent, Sample, StrokeSampler};
use crate::stroke::{BrushColor, Stroke, STROKE_WIDTHS};
use crate::timeline::LocalTimeline;
use kurbo::BezPath;
use uuid::Uuid;

/// Brush state for new strokes.
#[derive(Debug, Clone, Copy)]
pub struct Brush {
    /// Active palette color.
    pub color: BrushColor,
    /// Eraser mode paints with the canvas background instead.
    pub eraser: bool,
    /// Thickness, one of [`STROKE_WIDTHS`].
    pub width: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: BrushColor::Red,
            eraser: false,
            width: STROKE_WIDTHS[0],
        }
    }
}

/// One visible stroke, ready for a 2D surface.
#[derive(Debug, Clone)]
pub struct RenderedStroke {
    pub path: BezPath,
    pub color: BrushColor,
    pub width: f64,
}

/// Drawing state for one mounted canvas.
pub struct CanvasSession {
    canvas_id: String,
    author: String,
    brush: Brush,
    sampler: StrokeSampler,
    timeline: LocalTimeline,
    reconciler: Reconciler,
    /// Completed strokes waiting to be appended to the shared log.
    outgoing: Vec<Stroke>,
}

impl CanvasSession {
    pub fn new(canvas_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            author: author.into(),
            brush: Brush::default(),
            sampler: StrokeSampler::new(),
            timeline: LocalTimeline::new(),
            reconciler: Reconciler::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timeline(&self) -> &LocalTimeline {
        &self.timeline
    }

    // --- Brush state ---

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    /// Pick a palette color.
    pub fn set_color(&mut self, color: BrushColor) {
        self.brush.color = color;
    }

    /// Pick a thickness. Values outside the offered set are ignored.
    pub fn set_width(&mut self, width: f64) {
        if STROKE_WIDTHS.contains(&width) {
            self.brush.width = width;
        }
    }

    /// Toggle eraser mode. Mirrors the palette juggling the drawing
    /// screens do: entering eraser mode parks the palette on white,
    /// leaving it restores red.
    pub fn toggle_eraser(&mut self) {
        self.brush.eraser = !self.brush.eraser;
        self.brush.color = if self.brush.eraser {
            BrushColor::White
        } else {
            BrushColor::Red
        };
    }

    fn effective_color(&self) -> BrushColor {
        if self.brush.eraser {
            BrushColor::Eraser
        } else {
            self.brush.color
        }
    }

    // --- Gesture input ---

    /// Feed one gesture sample. On gesture end, a renderable stroke is
    /// queued for the shared log; the local render does not wait for the
    /// append to be acknowledged.
    pub fn handle_gesture(&mut self, event: GestureEvent, now_ms: u64) {
        let color = self.effective_color();
        let width = self.brush.width;
        let sample = self
            .sampler
            .sample(event, color, width, &self.author, now_ms);
        match sample {
            Some(Sample::Begin(candidate)) => self.timeline.start_stroke(candidate),
            Some(Sample::Extend(point)) => self.timeline.extend_stroke(point),
            Some(Sample::Finish) => {
                if let Some(stroke) = self.timeline.finalize_stroke() {
                    self.reconciler.track_send(stroke.id);
                    self.outgoing.push(stroke);
                }
            }
            None => {}
        }
    }

    /// Take the strokes queued for appending (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<Stroke> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Note that an append failed. The stroke stays visible locally;
    /// the reconciler just stops waiting for its echo.
    pub fn append_failed(&mut self, id: Uuid) {
        self.reconciler.forget_send(id);
    }

    // --- Undo / redo / clear ---

    /// Hide the most recent visible stroke on this client only. Other
    /// participants keep seeing every appended stroke.
    pub fn undo(&mut self) {
        self.timeline.undo();
    }

    pub fn redo(&mut self) {
        self.timeline.redo();
    }

    /// Erase the canvas: reset local state immediately and issue the
    /// shared-log clear. The returned future reports the clear's outcome;
    /// a failure leaves other participants' logs intact and is the
    /// caller's to surface.
    pub fn clear<'a>(&mut self, log: &'a dyn StrokeLog) -> BoxFuture<'a, LogResult<()>> {
        self.timeline.clear();
        self.reconciler = Reconciler::new();
        self.outgoing.clear();
        log.clear(&self.canvas_id)
    }

    // --- Shared-log integration ---

    /// Apply one log event (remote merge, own echo, or clear).
    pub fn apply_event(&mut self, event: crate::log::LogEvent) -> MergeOutcome {
        self.reconciler.apply(event, &mut self.timeline)
    }

    /// Drain a subscription into the timeline. Returns the number of
    /// events applied.
    pub fn pump(&mut self, subscription: &mut Subscription) -> usize {
        let mut applied = 0;
        while let Some(event) = subscription.try_next() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    // --- Rendering ---

    /// Smooth paths for the visible prefix, in draw order. Strokes with
    /// fewer than two points are skipped.
    pub fn visible_paths(&self) -> Vec<RenderedStroke> {
        self.timeline
            .visible()
            .iter()
            .filter(|entry| entry.stroke.is_renderable())
            .map(|entry| RenderedStroke {
                path: smooth_path(&entry.stroke.points),
                color: entry.stroke.color,
                width: entry.stroke.stroke_width,
            })
            .collect()
    }
}
