//! Main face tracking engine: per-frame association and track lifecycle.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::ConfigError;
use crate::tracker::matching::{self, Detection};
use crate::tracker::rect::{self, Rect};
use crate::tracker::track::Track;
use crate::tracker::track_state::TrackStatus;

/// Configuration for the face tracker.
///
/// Durations are given in milliseconds so the struct deserializes
/// cleanly from application config files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU a detection must exceed to match an existing track
    pub match_thresh: f32,
    /// Consecutive matched frames required before a track is confirmed
    pub stability_thresh: u32,
    /// How long a track may go unmatched before it is dropped
    pub max_absence_ms: u64,
    /// Minimum cooldown after a confirmation
    pub cooldown_floor_ms: u64,
    /// Scale factor applied to the last embedding latency when computing
    /// the cooldown window; zero disables latency scaling
    pub cooldown_latency_factor: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_thresh: 0.8,
            stability_thresh: 12,
            max_absence_ms: 1000,
            cooldown_floor_ms: 2000,
            cooldown_latency_factor: 2.0,
        }
    }
}

impl TrackerConfig {
    pub fn max_absence(&self) -> Duration {
        Duration::from_millis(self.max_absence_ms)
    }

    /// Cooldown window for the current tick.
    ///
    /// Slower embedding pipelines get proportionally longer cooldowns:
    /// `max(floor, factor x last_latency)`.
    pub fn cooldown_period(&self, last_latency: Option<Duration>) -> Duration {
        let floor = Duration::from_millis(self.cooldown_floor_ms);
        match last_latency {
            Some(latency) if self.cooldown_latency_factor > 0.0 => {
                floor.max(latency.mul_f32(self.cooldown_latency_factor))
            }
            _ => floor,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_thresh > 0.0 && self.match_thresh < 1.0) {
            return Err(ConfigError::MatchThreshold(self.match_thresh));
        }
        if self.stability_thresh == 0 {
            return Err(ConfigError::StabilityThreshold);
        }
        Ok(())
    }
}

/// A track that crossed the stability threshold this frame.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub track_id: u64,
    pub bbox: Rect,
}

/// Result of one tracker update.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    /// Snapshot of the live track store after this frame
    pub tracks: Vec<Track>,
    /// Confirmation events emitted this frame
    pub confirmations: Vec<Confirmation>,
    /// Whether the multi-subject guard cleared the store this frame
    pub store_flushed: bool,
}

/// Single-subject face tracker.
///
/// Maintains identity continuity across detection frames and emits a
/// confirmation event once a track has been stable for the configured
/// number of consecutive frames. Matching is greedy and
/// order-dependent on purpose; no global-optimal assignment is used.
pub struct FaceTracker {
    tracks: Vec<Track>,
    config: TrackerConfig,
    last_embedding_latency: Option<Duration>,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            config,
            last_embedding_latency: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Drop all tracks, e.g. on a user-triggered counter reset.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    /// Record the latency of the most recent embedding call; feeds the
    /// dynamic cooldown window.
    pub fn note_embedding_latency(&mut self, latency: Duration) {
        self.last_embedding_latency = Some(latency);
    }

    /// Confirmation pipeline finished for `track_id`; flip the track
    /// from `Confirmed` to `Processed`. Returns false if the track is
    /// gone or was not awaiting completion.
    pub fn mark_processed(&mut self, track_id: u64) -> bool {
        match self
            .tracks
            .iter_mut()
            .find(|t| t.track_id == track_id && t.status == TrackStatus::Confirmed)
        {
            Some(track) => {
                track.mark_processed();
                true
            }
            None => false,
        }
    }

    /// Run one frame of association and lifecycle transitions.
    pub fn update(&mut self, detections: &[Detection], now: Instant) -> FrameUpdate {
        // Single-subject attendance capture: more than one face in
        // frame drops everything until the frame is unambiguous again.
        if detections.len() > 1 {
            debug!(
                "{} faces in frame, flushing track store",
                detections.len()
            );
            self.tracks.clear();
            return FrameUpdate {
                tracks: Vec::new(),
                confirmations: Vec::new(),
                store_flushed: true,
            };
        }

        // Greedy association against each track's last matched box.
        let track_boxes: Vec<Rect> = self.tracks.iter().map(|t| t.bbox).collect();
        let det_boxes: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        let ious = rect::iou_batch(&track_boxes, &det_boxes);
        let assignment = matching::greedy_assignment(&ious, self.config.match_thresh);

        for &(i, j) in &assignment.matches {
            self.tracks[i].apply_match(&detections[j], now);
        }

        // Unmatched tracks age out once past the absence window;
        // matched tracks were just refreshed and always survive.
        let max_absence = self.config.max_absence();
        self.tracks.retain(|t| {
            let expired = t.is_expired(now, max_absence);
            if expired {
                debug!("dropping track {} after absence", t.track_id);
            }
            !expired
        });

        // Every unclaimed detection starts a brand-new track.
        for &j in &assignment.unmatched_detections {
            let track = Track::new(&detections[j], now);
            debug!("new track {}", track.track_id);
            self.tracks.push(track);
        }

        // Cooldown pass: re-arm processed tracks whose window elapsed.
        let cooldown = self.config.cooldown_period(self.last_embedding_latency);
        for track in &mut self.tracks {
            if track.status.freezes_stability() {
                if track.cooldown_elapsed(now, cooldown) {
                    debug!("track {} cooldown elapsed, re-arming", track.track_id);
                    track.rearm();
                } else if track.status == TrackStatus::Processed {
                    track.status = TrackStatus::Cooldown;
                }
            }
        }

        // Confirmation pass: fires exactly once per stability crossing.
        let mut confirmations = Vec::new();
        for track in &mut self.tracks {
            if track.status == TrackStatus::Tracking
                && track.stability >= self.config.stability_thresh
            {
                track.confirm(now);
                debug!(
                    "track {} confirmed at stability {}",
                    track.track_id, track.stability
                );
                confirmations.push(Confirmation {
                    track_id: track.track_id,
                    bbox: track.bbox,
                });
            }
        }

        FrameUpdate {
            tracks: self.tracks.clone(),
            confirmations,
            store_flushed: false,
        }
    }
}
