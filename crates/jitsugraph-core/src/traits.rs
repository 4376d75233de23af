use crate::{ReferenceDoc, Result, Technique, Video};
use async_trait::async_trait;
use uuid::Uuid;

/// Nearest-neighbor lookup over previously embedded reference documents.
#[async_trait]
pub trait ReferenceRetriever: Send + Sync {
    /// Returns documents above `threshold`, best first, at most `top_k`.
    /// An empty result is valid and must not be treated as an error.
    async fn similarity_search(
        &self,
        vector: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<ReferenceDoc>>;
}

/// Read access to the fixed technique vocabulary.
#[async_trait]
pub trait TechniqueSource: Send + Sync {
    async fn load_techniques(&self) -> Result<Vec<Technique>>;
}

/// Rate-limit and audit operations, keyed by user.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Usage count for the current calendar period and this feature.
    async fn usage_count(&self, user: Uuid) -> Result<u64>;

    /// Most recently effective, non-expired limit for this user and feature.
    /// Returns 0 when no limit is configured (default-deny).
    async fn limit_rate(&self, user: Uuid) -> Result<u64>;

    /// Append one usage record with audit metadata. Called exactly once per
    /// successful pipeline run, never on failure.
    async fn record_use(&self, user: Uuid, metadata: serde_json::Value) -> Result<()>;
}

/// Metadata lookup for tutorial videos referenced by retrieval results.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn video_info(&self, id: &str) -> Result<Option<Video>>;
}
