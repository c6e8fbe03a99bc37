//! Shared stroke-log abstraction.
//!
//! Every participant viewing the same canvas id shares one append-only
//! stroke log. The log is the only shared mutable resource: strokes are
//! never edited or individually removed, so concurrent appends need no
//! locking discipline beyond the backend's own append order.

use crate::stroke::Stroke;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Stroke-log errors.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("subscription failure: {0}")]
    Subscription(String),
}

/// Result type for stroke-log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A change observed on a canvas's shared stroke log.
#[derive(Debug, Clone)]
pub enum LogEvent {
    /// A stroke was appended by some participant, the subscriber's own
    /// appends included.
    StrokeAdded(Stroke),
    /// The whole log was removed by an erase-all action.
    Cleared,
}

/// Trait for shared stroke-log backends.
///
/// Implementations perform at most one attempt per operation; retry,
/// backoff, and user-visible failure handling belong to the caller.
pub trait StrokeLog: Send + Sync {
    /// Append a completed stroke to the canvas's log.
    fn append(&self, canvas_id: &str, stroke: Stroke) -> BoxFuture<'_, LogResult<()>>;

    /// Subscribe to the canvas's append stream. Delivery begins with a
    /// replay of the stored history, then continues with live appends in
    /// store order.
    fn subscribe(&self, canvas_id: &str) -> LogResult<Subscription>;

    /// Remove every stroke for the canvas. Not undoable; subsequent
    /// subscribers replay an empty history.
    fn clear(&self, canvas_id: &str) -> BoxFuture<'_, LogResult<()>>;
}

/// Handle on an append-stream subscription.
///
/// Dropping (or canceling) the handle releases the underlying listener,
/// so a torn-down screen stops receiving events deterministically.
pub struct Subscription {
    rx: Receiver<LogEvent>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(rx: Receiver<LogEvent>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Take one pending event without blocking.
    pub fn try_next(&mut self) -> Option<LogEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain all pending events without blocking.
    pub fn drain(&mut self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Release the underlying listener.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Default)]
struct CanvasLog {
    strokes: Vec<Stroke>,
    subscribers: Vec<(u64, Sender<LogEvent>)>,
}

#[derive(Default)]
struct Shared {
    canvases: RwLock<HashMap<String, CanvasLog>>,
    next_subscriber: AtomicU64,
}

/// In-process stroke log for tests and offline canvases.
///
/// Clones share the same underlying logs, so one instance can stand in
/// for the shared medium between several sessions.
#[derive(Clone, Default)]
pub struct MemoryStrokeLog {
    shared: Arc<Shared>,
}

impl MemoryStrokeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strokes currently stored for a canvas, in append order.
    pub fn history(&self, canvas_id: &str) -> Vec<Stroke> {
        self.shared
            .canvases
            .read()
            .ok()
            .and_then(|canvases| canvases.get(canvas_id).map(|log| log.strokes.clone()))
            .unwrap_or_default()
    }

    fn fan_out(log: &mut CanvasLog, event: &LogEvent) {
        // Senders whose receiver is gone are pruned as we go.
        log.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}

impl StrokeLog for MemoryStrokeLog {
    fn append(&self, canvas_id: &str, stroke: Stroke) -> BoxFuture<'_, LogResult<()>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            let mut canvases = self
                .shared
                .canvases
                .write()
                .map_err(|e| LogError::Persistence(format!("lock error: {}", e)))?;
            let log = canvases.entry(canvas_id).or_default();
            log.strokes.push(stroke.clone());
            Self::fan_out(log, &LogEvent::StrokeAdded(stroke));
            Ok(())
        })
    }

    fn subscribe(&self, canvas_id: &str) -> LogResult<Subscription> {
        let mut canvases = self
            .shared
            .canvases
            .write()
            .map_err(|e| LogError::Subscription(format!("lock error: {}", e)))?;
        let log = canvases.entry(canvas_id.to_string()).or_default();

        let (tx, rx) = channel();
        // Catch-up replay: history first, then live appends on the same
        // channel, so the subscriber sees one ordered stream.
        for stroke in &log.strokes {
            let _ = tx.send(LogEvent::StrokeAdded(stroke.clone()));
        }

        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        log.subscribers.push((id, tx));

        let shared = Arc::clone(&self.shared);
        let canvas = canvas_id.to_string();
        Ok(Subscription::new(rx, move || {
            if let Ok(mut canvases) = shared.canvases.write() {
                if let Some(log) = canvases.get_mut(&canvas) {
                    log.subscribers.retain(|(sub_id, _)| *sub_id != id);
                }
            }
        }))
    }

    fn clear(&self, canvas_id: &str) -> BoxFuture<'_, LogResult<()>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            let mut canvases = self
                .shared
                .canvases
                .write()
                .map_err(|e| LogError::Persistence(format!("lock error: {}", e)))?;
            if let Some(log) = canvases.get_mut(&canvas_id) {
                log.strokes.clear();
                Self::fan_out(log, &LogEvent::Cleared);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    // Simple blocking executor for tests
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
