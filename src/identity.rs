//! Embedding-based identity comparison and duplicate suppression.

mod embedding;
mod registry;

pub use embedding::{Embedding, EmbeddingComparison};
pub use registry::{IdentityMatch, IdentityRegistry, RegistryConfig};
