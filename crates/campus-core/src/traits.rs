//! Seams between the load pipeline and whatever serves the data.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Curriculum, Relation, Subject, Term};
use crate::normalize::NormalizedBatch;

/// Source of the catalog collections the relation builder needs.
///
/// Implemented by the admin service (live backend or mock data behind the
/// source resolver) and by test doubles.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn curricula(&self) -> Result<NormalizedBatch<Curriculum>>;

    async fn subjects(&self) -> Result<NormalizedBatch<Subject>>;

    /// Explicit subject↔curriculum join records, if the backend has them.
    async fn subject_relations(&self) -> Result<NormalizedBatch<Relation>>;

    async fn terms(&self) -> Result<NormalizedBatch<Term>>;

    /// Whether calls are currently answered from fallback data instead of
    /// the live backend.
    fn serves_fallback(&self) -> bool {
        false
    }
}
