//! Persistent track record for a single tracked face.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackStatus;

/// Global track ID counter for unique ID generation.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reset the global track ID counter (useful for testing).
pub fn reset_track_id_counter() {
    TRACK_ID_COUNTER.store(0, Ordering::SeqCst);
}

/// Get the next unique track ID.
fn next_track_id() -> u64 {
    TRACK_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

/// A face followed across consecutive frames.
///
/// Created when an unmatched detection appears, updated by the
/// association pass every frame it is matched, and dropped once it goes
/// unmatched for longer than the configured absence window.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier, stable for the track's lifetime
    pub track_id: u64,
    /// Current lifecycle status
    pub status: TrackStatus,
    /// Most recent matched bounding box
    pub bbox: Rect,
    /// Most recent detection confidence
    pub score: f32,
    /// Consecutive matched frames while accumulating
    pub stability: u32,
    /// Timestamp of the most recent successful match
    pub last_seen: Instant,
    /// Stamped when the confirmation event is emitted; cleared on re-arm
    pub processed_at: Option<Instant>,
}

impl Track {
    /// Create a new track from an unclaimed detection.
    pub fn new(detection: &Detection, now: Instant) -> Self {
        Self {
            track_id: next_track_id(),
            status: TrackStatus::Tracking,
            bbox: detection.bbox,
            score: detection.score,
            stability: 1,
            last_seen: now,
            processed_at: None,
        }
    }

    /// Carry a matched detection forward.
    ///
    /// Stability accumulates only while the track is not frozen by a
    /// completed confirmation; the box and recency update regardless.
    pub fn apply_match(&mut self, detection: &Detection, now: Instant) {
        self.bbox = detection.bbox;
        self.score = detection.score;
        self.last_seen = now;
        if !self.status.freezes_stability() {
            self.stability += 1;
        }
    }

    /// Cross the stability threshold: emit-confirmation point.
    pub fn confirm(&mut self, now: Instant) {
        self.status = TrackStatus::Confirmed;
        self.processed_at = Some(now);
    }

    /// Confirmation pipeline finished for this track, whatever the outcome.
    pub fn mark_processed(&mut self) {
        self.status = TrackStatus::Processed;
    }

    /// Cooldown elapsed: start accumulating stability from scratch.
    pub fn rearm(&mut self) {
        self.status = TrackStatus::Tracking;
        self.stability = 0;
        self.processed_at = None;
    }

    /// Whether the track has gone unmatched for longer than `max_absence`.
    pub fn is_expired(&self, now: Instant, max_absence: Duration) -> bool {
        now.duration_since(self.last_seen) > max_absence
    }

    /// Whether the cooldown window that started at `processed_at` is over.
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.processed_at {
            Some(at) => now.duration_since(at) > cooldown,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn test_new_track_starts_tracking() {
        let now = Instant::now();
        let track = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        assert_eq!(track.status, TrackStatus::Tracking);
        assert_eq!(track.stability, 1);
        assert_eq!(track.last_seen, now);
        assert!(track.processed_at.is_none());
    }

    #[test]
    fn test_ids_are_unique_after_reset() {
        reset_track_id_counter();
        let now = Instant::now();
        let a = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        let b = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        assert_ne!(a.track_id, b.track_id);
        // Other tests allocate ids concurrently, so only the lower
        // bound is stable here.
        assert!(a.track_id >= 1);
    }

    #[test]
    fn test_match_accumulates_stability() {
        let now = Instant::now();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        track.apply_match(&det(1.0, 1.0, 11.0, 11.0), now + Duration::from_millis(150));
        assert_eq!(track.stability, 2);
        assert_eq!(track.bbox, Rect::from_tlbr(1.0, 1.0, 11.0, 11.0));
    }

    #[test]
    fn test_match_frozen_after_processing() {
        let now = Instant::now();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        track.confirm(now);
        track.mark_processed();
        track.apply_match(&det(0.0, 0.0, 10.0, 10.0), now + Duration::from_millis(150));
        assert_eq!(track.stability, 1);
        // Recency still carried forward while frozen.
        assert_eq!(track.last_seen, now + Duration::from_millis(150));
    }

    #[test]
    fn test_rearm_resets_stability() {
        let now = Instant::now();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        track.stability = 12;
        track.confirm(now);
        track.mark_processed();
        track.rearm();
        assert_eq!(track.status, TrackStatus::Tracking);
        assert_eq!(track.stability, 0);
        assert!(track.processed_at.is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let track = Track::new(&det(0.0, 0.0, 10.0, 10.0), now);
        let max_absence = Duration::from_millis(1000);
        assert!(!track.is_expired(now + Duration::from_millis(1000), max_absence));
        assert!(track.is_expired(now + Duration::from_millis(1001), max_absence));
    }
}
