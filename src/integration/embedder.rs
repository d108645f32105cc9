//! Trait for face embedding inference backends.

use std::time::Duration;

use crate::identity::Embedding;
use crate::tracker::Rect;

/// Embedding call result: the vector plus how long inference took.
///
/// The latency feeds the dynamic cooldown window, so slower embedding
/// pipelines automatically back off repeat confirmations.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embedding: Embedding,
    pub latency: Duration,
}

/// Trait for face embedding inference backends.
///
/// The embedder maps a face region of a frame to a fixed-length
/// vector. The crate never inspects vector components, only computes
/// similarity and distance over them.
pub trait EmbeddingSource {
    /// Error type for embedding failures.
    type Error: std::fmt::Display;

    /// Generate an embedding for the given region of a frame.
    fn embed(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        region: &Rect,
    ) -> Result<EmbeddingOutput, Self::Error>;
}
