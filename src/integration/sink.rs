//! Trait for the external attendance submission backend.

use crate::identity::Embedding;
use crate::tracker::Rect;

/// Context attached to a submission.
#[derive(Debug, Clone)]
pub struct SubmissionMetadata {
    /// Track that produced the confirmation
    pub track_id: u64,
    /// Bounding box at confirmation time
    pub bbox: Rect,
    /// Identity the embedding was registered under
    pub identity_id: String,
}

/// Trait for the external submission backend.
///
/// Fire-and-forget-with-result: failures are surfaced in the tick
/// report, never retried by the engine. Retry policy, if any, belongs
/// to the implementation.
pub trait SubmissionSink {
    /// Error type for submission failures.
    type Error: std::fmt::Display;

    /// Submit a confirmed, non-duplicate subject.
    fn submit(
        &mut self,
        embedding: &Embedding,
        metadata: &SubmissionMetadata,
    ) -> Result<(), Self::Error>;
}
