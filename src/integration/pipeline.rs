//! Attendance pipeline combining detection, tracking, and duplicate
//! suppression in front of the submission backend.

use std::collections::HashSet;
use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::ConfigError;
use crate::identity::{IdentityRegistry, RegistryConfig};
use crate::tracker::{Confirmation, FaceTracker, Track, TrackerConfig};

use super::{DetectionSource, EmbeddingSource, SubmissionMetadata, SubmissionSink};

/// Combined configuration for a capture pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub registry: RegistryConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.registry.validate()
    }
}

/// What became of one confirmation event.
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    /// Accepted and handed to the submission sink
    Submitted { track_id: u64, identity_id: String },
    /// Suppressed: a sufficiently similar subject is already registered
    Duplicate {
        track_id: u64,
        identity_id: String,
        similarity: f32,
    },
    /// Suppressed: this track id already submitted once this session
    AlreadySubmitted { track_id: u64 },
    /// Embedding call failed; submission aborted for this cycle
    EmbeddingFailed { track_id: u64, error: String },
    /// The submission sink rejected the payload
    SubmissionFailed {
        track_id: u64,
        identity_id: String,
        error: String,
    },
}

/// Everything that happened during one pipeline tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Snapshot of the track store after the tick
    pub tracks: Vec<Track>,
    /// One outcome per confirmation event this tick
    pub outcomes: Vec<ConfirmationOutcome>,
    /// Detector failure, reported alongside the untouched track store
    pub detector_error: Option<String>,
    /// Whether the multi-subject guard cleared the store this tick
    pub store_flushed: bool,
}

/// The attendance confirmation engine for one capture session.
///
/// Bundles the face tracker and identity registry with the three
/// external collaborators (detector, embedder, submission sink). All
/// state is owned here; construct one per capture session and drive
/// it with `process_frame` once per tick.
pub struct AttendancePipeline<D, E, S> {
    detector: D,
    embedder: E,
    sink: S,
    tracker: FaceTracker,
    registry: IdentityRegistry,
    submitted_tracks: HashSet<u64>,
}

impl<D, E, S> AttendancePipeline<D, E, S>
where
    D: DetectionSource,
    E: EmbeddingSource,
    S: SubmissionSink,
{
    /// Create a new pipeline with the given collaborators and config.
    pub fn new(detector: D, embedder: E, sink: S, config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector,
            embedder,
            sink,
            tracker: FaceTracker::new(config.tracker),
            registry: IdentityRegistry::new(config.registry),
            submitted_tracks: HashSet::new(),
        })
    }

    /// Create a new pipeline with default configuration.
    pub fn with_default_config(detector: D, embedder: E, sink: S) -> Result<Self, ConfigError> {
        Self::new(detector, embedder, sink, PipelineConfig::default())
    }

    /// Process a single frame through the full pipeline.
    ///
    /// Runs detection, association, and the confirmation policy for
    /// every track that crossed the stability threshold this tick.
    /// Collaborator failures degrade the tick, never abort it: a
    /// detector error leaves the track store untouched and is reported
    /// in the returned `TickReport`.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        now: Instant,
    ) -> TickReport {
        let detections = match self.detector.detect(input, width, height) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("detector failed: {}", e);
                return TickReport {
                    tracks: self.tracker.tracks().to_vec(),
                    outcomes: Vec::new(),
                    detector_error: Some(e.to_string()),
                    store_flushed: false,
                };
            }
        };

        let update = self.tracker.update(&detections, now);

        let mut outcomes = Vec::with_capacity(update.confirmations.len());
        for confirmation in &update.confirmations {
            outcomes.push(self.handle_confirmation(confirmation, input, width, height, now));
        }

        TickReport {
            tracks: self.tracker.tracks().to_vec(),
            outcomes,
            detector_error: None,
            store_flushed: update.store_flushed,
        }
    }

    /// Run the confirmation policy for one confirmed track: embed,
    /// check for duplicates, guard against double submission, then
    /// register and submit. Every path leaves the track processed so
    /// the cooldown window applies regardless of outcome.
    fn handle_confirmation(
        &mut self,
        confirmation: &Confirmation,
        input: &[u8],
        width: u32,
        height: u32,
        now: Instant,
    ) -> ConfirmationOutcome {
        let track_id = confirmation.track_id;

        let output = match self.embedder.embed(input, width, height, &confirmation.bbox) {
            Ok(output) => output,
            Err(e) => {
                warn!("embedding failed for track {}: {}", track_id, e);
                self.tracker.mark_processed(track_id);
                return ConfirmationOutcome::EmbeddingFailed {
                    track_id,
                    error: e.to_string(),
                };
            }
        };
        self.tracker.note_embedding_latency(output.latency);

        let threshold = self.registry.config().similarity_thresh;
        if let Some(known) = self.registry.find_match(&output.embedding, threshold) {
            info!(
                "duplicate subject for track {}: {} (similarity {:.3})",
                track_id, known.identity_id, known.similarity
            );
            self.tracker.mark_processed(track_id);
            return ConfirmationOutcome::Duplicate {
                track_id,
                identity_id: known.identity_id,
                similarity: known.similarity,
            };
        }

        if self.submitted_tracks.contains(&track_id) {
            warn!("track {} already submitted this session, skipping", track_id);
            self.tracker.mark_processed(track_id);
            return ConfirmationOutcome::AlreadySubmitted { track_id };
        }

        let identity_id = track_id.to_string();
        self.registry
            .add_entry(output.embedding.clone(), identity_id.clone(), now);
        self.submitted_tracks.insert(track_id);

        let metadata = SubmissionMetadata {
            track_id,
            bbox: confirmation.bbox,
            identity_id: identity_id.clone(),
        };
        let outcome = match self.sink.submit(&output.embedding, &metadata) {
            Ok(()) => {
                info!("attendance submitted for track {}", track_id);
                ConfirmationOutcome::Submitted {
                    track_id,
                    identity_id,
                }
            }
            Err(e) => {
                warn!("submission failed for track {}: {}", track_id, e);
                ConfirmationOutcome::SubmissionFailed {
                    track_id,
                    identity_id,
                    error: e.to_string(),
                }
            }
        };
        self.tracker.mark_processed(track_id);
        outcome
    }

    /// Clear track store, identity registry, and the per-session
    /// submitted-id set. Starts a fresh capture session.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.registry.clear();
        self.submitted_tracks.clear();
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get a reference to the underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &FaceTracker {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut FaceTracker {
        &mut self.tracker
    }

    /// Get a reference to the identity registry.
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Get a mutable reference to the identity registry.
    pub fn registry_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.registry
    }
}
