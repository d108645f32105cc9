//! Session-wide registry of previously confirmed face embeddings.

use std::time::Instant;

use serde::Deserialize;
use tracing::debug;

use crate::ConfigError;
use crate::identity::embedding::Embedding;

/// Configuration for the identity registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Cosine similarity a match must strictly exceed; deliberately
    /// strict to minimize false-duplicate rejection
    pub similarity_thresh: f32,
    /// Entry count that triggers eviction
    pub max_entries: usize,
    /// Entries retained after eviction (the most recent ones)
    pub retain_entries: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            similarity_thresh: 0.85,
            max_entries: 100,
            retain_entries: 50,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_thresh > 0.0 && self.similarity_thresh < 1.0) {
            return Err(ConfigError::SimilarityThreshold(self.similarity_thresh));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::RegistryCap);
        }
        if self.retain_entries > self.max_entries {
            return Err(ConfigError::RegistryRetain {
                retain: self.retain_entries,
                max: self.max_entries,
            });
        }
        Ok(())
    }
}

/// One previously confirmed subject.
#[derive(Debug, Clone)]
struct KnownIdentity {
    embedding: Embedding,
    identity_id: String,
    registered_at: Instant,
}

/// A registry hit: the closest known identity above the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    pub identity_id: String,
    pub similarity: f32,
}

/// Owns every known-identity entry for the capture session.
///
/// Tracks never reference entries directly; the association is made
/// transiently at confirmation time via `find_match`. Entries are
/// never mutated, only appended, evicted by age, or cleared.
pub struct IdentityRegistry {
    entries: Vec<KnownIdentity>,
    config: RegistryConfig,
}

impl IdentityRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Find the best-matching known identity whose cosine similarity
    /// strictly exceeds `threshold`, if any.
    pub fn find_match(&self, embedding: &Embedding, threshold: f32) -> Option<IdentityMatch> {
        let mut best: Option<IdentityMatch> = None;

        for known in &self.entries {
            let similarity = embedding.cosine_similarity(&known.embedding);
            if similarity > threshold
                && best.as_ref().is_none_or(|b| similarity > b.similarity)
            {
                best = Some(IdentityMatch {
                    identity_id: known.identity_id.clone(),
                    similarity,
                });
            }
        }

        best
    }

    /// Register a newly confirmed subject. When the cap is exceeded,
    /// the oldest entries are dropped down to the retained size.
    pub fn add_entry(&mut self, embedding: Embedding, identity_id: impl Into<String>, now: Instant) {
        self.entries.push(KnownIdentity {
            embedding,
            identity_id: identity_id.into(),
            registered_at: now,
        });

        if self.entries.len() > self.config.max_entries {
            let excess = self.entries.len() - self.config.retain_entries;
            debug!("registry over cap, evicting {} oldest entries", excess);
            self.entries.drain(..excess);
        }
    }

    /// Age of the oldest retained entry, if any.
    pub fn oldest_entry_at(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.registered_at)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(RegistryConfig::default())
    }

    #[test]
    fn test_empty_registry_never_matches() {
        let reg = registry();
        let query = Embedding::new(vec![0.1, 0.2, 0.3]);
        assert!(reg.find_match(&query, 0.85).is_none());
    }

    #[test]
    fn test_exact_entry_matches_with_full_similarity() {
        let mut reg = registry();
        let vector = Embedding::new(vec![0.1, 0.2, 0.3]);
        reg.add_entry(vector.clone(), "A", Instant::now());

        let m = reg.find_match(&vector, 0.85).expect("should match");
        assert_eq!(m.identity_id, "A");
        assert!((m.similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_wins() {
        let mut reg = registry();
        let now = Instant::now();
        reg.add_entry(Embedding::new(vec![1.0, 0.3]), "far", now);
        reg.add_entry(Embedding::new(vec![1.0, 0.05]), "near", now);

        let query = Embedding::new(vec![1.0, 0.0]);
        let m = reg.find_match(&query, 0.85).expect("should match");
        assert_eq!(m.identity_id, "near");
    }

    #[test]
    fn test_dissimilar_entry_is_not_a_match() {
        let mut reg = registry();
        reg.add_entry(Embedding::new(vec![1.0, 0.0]), "A", Instant::now());
        let query = Embedding::new(vec![0.0, 1.0]);
        assert!(reg.find_match(&query, 0.85).is_none());
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut reg = registry();
        let t0 = Instant::now();
        for i in 0..101 {
            reg.add_entry(
                Embedding::new(vec![i as f32, 1.0]),
                format!("id-{i}"),
                t0 + Duration::from_millis(i),
            );
        }

        // 101st insert trips the cap; the newest 50 survive.
        assert_eq!(reg.len(), 50);
        assert_eq!(reg.oldest_entry_at(), Some(t0 + Duration::from_millis(51)));
        let newest = Embedding::new(vec![100.0, 1.0]);
        assert!(reg.find_match(&newest, 0.85).is_some());
    }

    #[test]
    fn test_clear() {
        let mut reg = registry();
        reg.add_entry(Embedding::new(vec![1.0]), "A", Instant::now());
        assert_eq!(reg.len(), 1);
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(RegistryConfig::default().validate().is_ok());
        assert!(
            RegistryConfig {
                retain_entries: 200,
                ..RegistryConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            RegistryConfig {
                similarity_thresh: 1.0,
                ..RegistryConfig::default()
            }
            .validate()
            .is_err()
        );
    }
}
