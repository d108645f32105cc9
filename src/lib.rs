//! Live face-tracking and attendance-confirmation engine.
//!
//! Maintains identity continuity across detection frames with greedy
//! IoU association, confirms presence once a track has been stable
//! for a configured number of consecutive frames, suppresses
//! duplicate subjects via embedding similarity, and throttles repeat
//! submissions with per-track cooldown windows.
//!
//! The face detector, embedding model, and submission backend are
//! external collaborators behind the traits in [`integration`]; the
//! engine itself is synchronous and in-memory, driven one tick at a
//! time by [`integration::CaptureSession`] or directly by the caller.

pub mod identity;
pub mod integration;
pub mod tracker;

pub use identity::{Embedding, IdentityMatch, IdentityRegistry, RegistryConfig};
pub use integration::{
    AttendancePipeline, CaptureSession, ConfirmationOutcome, DetectionBuilder, DetectionSource,
    EmbeddingOutput, EmbeddingSource, Frame, FrameSource, PipelineConfig, SessionConfig,
    SessionStats, SubmissionMetadata, SubmissionSink, TickReport,
};
pub use tracker::{
    Confirmation, Detection, FaceTracker, FrameUpdate, Rect, Track, TrackStatus, TrackerConfig,
};

use thiserror::Error;

/// Configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("match threshold must be within (0, 1), got {0}")]
    MatchThreshold(f32),
    #[error("stability threshold must be at least 1")]
    StabilityThreshold,
    #[error("similarity threshold must be within (0, 1), got {0}")]
    SimilarityThreshold(f32),
    #[error("registry cap must be at least 1")]
    RegistryCap,
    #[error("registry retain size {retain} exceeds cap {max}")]
    RegistryRetain { retain: usize, max: usize },
    #[error("tick interval must be non-zero")]
    TickInterval,
}
