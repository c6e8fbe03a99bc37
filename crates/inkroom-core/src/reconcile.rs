//! Merging remote strokes into the local timeline.
//!
//! The append stream delivers every stroke stored for the canvas,
//! including echoes of this client's own appends. Each locally-originated
//! stroke carries a client-generated id recorded here before the send, so
//! an echo is recognized by id match regardless of arrival timing — two
//! strokes in flight at once each confirm exactly once, and a historical
//! replay of this author's strokes from an earlier session merges
//! normally because those ids were never tracked.

use crate::log::LogEvent;
use crate::timeline::LocalTimeline;
use std::collections::HashSet;
use uuid::Uuid;

/// What became of one log event offered to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Foreign stroke inserted at the cursor boundary.
    Merged,
    /// Echo of a stroke this client sent; the pending local copy was
    /// confirmed instead of being inserted twice.
    Confirmed,
    /// The shared log was cleared; the timeline was reset.
    Cleared,
}

/// Integrates append-stream events into the local timeline.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    /// Ids of this client's sends whose echo is still outstanding.
    outstanding: HashSet<Uuid>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stroke this client is about to append, so its echo is
    /// suppressed rather than merged a second time.
    pub fn track_send(&mut self, id: Uuid) {
        self.outstanding.insert(id);
    }

    /// Stop waiting for an echo, after a failed append. The optimistic
    /// local copy stays visible; it just can no longer be confirmed.
    pub fn forget_send(&mut self, id: Uuid) {
        self.outstanding.remove(&id);
    }

    /// Number of sends with no echo yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Apply one log event to the timeline.
    pub fn apply(&mut self, event: LogEvent, timeline: &mut LocalTimeline) -> MergeOutcome {
        match event {
            LogEvent::StrokeAdded(stroke) => {
                if self.outstanding.remove(&stroke.id) {
                    log::debug!("confirmed own stroke {}", stroke.id);
                    timeline.confirm(stroke.id);
                    MergeOutcome::Confirmed
                } else {
                    log::debug!("merging remote stroke {} by {}", stroke.id, stroke.created_by);
                    timeline.merge_remote(stroke);
                    MergeOutcome::Merged
                }
            }
            LogEvent::Cleared => {
                self.outstanding.clear();
                timeline.clear();
                MergeOutcome::Cleared
            }
        }
    }
}
