//! Catalog loading: fetch the collections concurrently, then link them.
//!
//! The relation index is built only after curricula, subjects, relations
//! and terms have all resolved. [`CatalogState`] drops a load that finishes
//! after a newer one has already been applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use campus_core::logging::{DURATION_MS, ERROR_MSG, ISSUE_COUNT, OPERATION, SOURCE_MODE};
use campus_core::{
    CatalogSource, Curriculum, NormalizationIssue, NormalizedBatch, Relation, RelationIndex, Result,
    Subject, Term,
};

/// One fully linked catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub index: RelationIndex,
    /// Issues from normalization and linking, in load order.
    pub issues: Vec<NormalizationIssue>,
}

type Collections = (
    Result<NormalizedBatch<Curriculum>>,
    Result<NormalizedBatch<Subject>>,
    Result<NormalizedBatch<Relation>>,
    Result<NormalizedBatch<Term>>,
);

async fn fetch_collections<S: CatalogSource + ?Sized>(source: &S) -> Collections {
    tokio::join!(
        source.curricula(),
        source.subjects(),
        source.subject_relations(),
        source.terms(),
    )
}

/// Fetch everything the relation index needs and build it.
///
/// Curricula, subjects and terms are required. Explicit relations are
/// optional: when they cannot be loaded, subjects fall back to their own
/// curriculum reference. A snapshot never mixes live and fallback data:
/// if the source switches to fallback during the load, every collection
/// is fetched again from fallback.
pub async fn load_catalog<S: CatalogSource + ?Sized>(source: &S) -> Result<CatalogSnapshot> {
    let started = Instant::now();
    let was_fallback = source.serves_fallback();
    let mut fetched = fetch_collections(source).await;
    if !was_fallback && source.serves_fallback() {
        warn!(
            { OPERATION } = "load_catalog",
            { SOURCE_MODE } = "fallback",
            "Source switched to fallback during load, reloading every collection"
        );
        fetched = fetch_collections(source).await;
    }
    let (curricula, subjects, relations, terms) = fetched;

    let curricula = curricula?;
    let subjects = subjects?;
    let terms = terms?;
    let relations = relations.unwrap_or_else(|e| {
        warn!(
            { OPERATION } = "list_subject_relations",
            { ERROR_MSG } = %e,
            "Explicit relations unavailable, using subject references only"
        );
        NormalizedBatch::default()
    });

    let mut issues = Vec::new();
    issues.extend(curricula.issues);
    issues.extend(subjects.issues);
    issues.extend(relations.issues);
    issues.extend(terms.issues);

    let index = RelationIndex::build(curricula.items, subjects.items, terms.items, relations.items);
    issues.extend(index.issues().iter().cloned());

    info!(
        curricula = index.curricula().len(),
        subjects = index.subjects().len(),
        terms = index.terms().len(),
        { ISSUE_COUNT } = issues.len(),
        { DURATION_MS } = started.elapsed().as_millis() as u64,
        "Catalog loaded"
    );
    Ok(CatalogSnapshot { index, issues })
}

/// Ticket for one refresh; later tickets outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

#[derive(Debug, Default)]
struct Committed {
    generation: u64,
    snapshot: Option<Arc<CatalogSnapshot>>,
}

/// The current catalog, shared between views.
#[derive(Debug, Default)]
pub struct CatalogState {
    issued: AtomicU64,
    committed: RwLock<Committed>,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a generation before starting a load.
    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply a finished load unless a newer one was applied first.
    /// Returns whether the snapshot was applied.
    pub async fn commit(&self, ticket: RefreshTicket, snapshot: CatalogSnapshot) -> bool {
        let mut committed = self.committed.write().await;
        if ticket.0 <= committed.generation {
            debug!(
                generation = ticket.0,
                current = committed.generation,
                "Stale catalog load discarded"
            );
            return false;
        }
        committed.generation = ticket.0;
        committed.snapshot = Some(Arc::new(snapshot));
        true
    }

    pub async fn current(&self) -> Option<Arc<CatalogSnapshot>> {
        self.committed.read().await.snapshot.clone()
    }

    /// Load from `source` and apply the result if it is still the newest.
    pub async fn refresh<S: CatalogSource + ?Sized>(&self, source: &S) -> Result<bool> {
        let ticket = self.begin_refresh();
        let snapshot = load_catalog(source).await?;
        Ok(self.commit(ticket, snapshot).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use campus_core::{Error, RelationSource};
    use std::sync::atomic::{AtomicBool, AtomicU32};

    struct FixedSource {
        curricula: Vec<Curriculum>,
        subjects: Vec<Subject>,
        relations: Option<Vec<Relation>>,
        terms: Vec<Term>,
    }

    fn batch<T>(items: Vec<T>) -> NormalizedBatch<T> {
        NormalizedBatch {
            items,
            issues: Vec::new(),
        }
    }

    #[async_trait]
    impl CatalogSource for FixedSource {
        async fn curricula(&self) -> Result<NormalizedBatch<Curriculum>> {
            Ok(batch(self.curricula.clone()))
        }

        async fn subjects(&self) -> Result<NormalizedBatch<Subject>> {
            Ok(batch(self.subjects.clone()))
        }

        async fn subject_relations(&self) -> Result<NormalizedBatch<Relation>> {
            self.relations
                .clone()
                .map(batch)
                .ok_or_else(|| Error::network("list_subject_relations", "refused"))
        }

        async fn terms(&self) -> Result<NormalizedBatch<Term>> {
            Ok(batch(self.terms.clone()))
        }
    }

    fn source(relations: Option<Vec<Relation>>) -> FixedSource {
        FixedSource {
            curricula: vec![
                Curriculum {
                    id: "c1".into(),
                    name: "National".to_string(),
                    code: Some("NC".to_string()),
                    description: None,
                    is_active: true,
                },
                Curriculum {
                    id: "c2".into(),
                    name: "IB".to_string(),
                    code: None,
                    description: None,
                    is_active: true,
                },
            ],
            subjects: vec![Subject {
                id: "s1".into(),
                name: "History".to_string(),
                description: None,
                is_active: true,
                curriculum_id: Some("c1".into()),
            }],
            relations,
            terms: vec![Term {
                id: "t1".into(),
                name: "[NC] Term 1".to_string(),
                institution_id: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_load_links_everything() {
        let explicit = Relation {
            subject_id: "s1".into(),
            curriculum_id: "c2".into(),
            source: RelationSource::Explicit,
        };
        let snapshot = load_catalog(&source(Some(vec![explicit]))).await.unwrap();
        let linked: Vec<&str> = snapshot
            .index
            .relations_for("s1")
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(linked, vec!["c2"]);
        assert_eq!(
            snapshot.index.curriculum_for_term("t1").map(|c| c.id.as_str()),
            Some("c1")
        );
        assert!(snapshot.issues.is_empty());
    }

    #[tokio::test]
    async fn test_missing_relations_fall_back_to_subject_reference() {
        let snapshot = load_catalog(&source(None)).await.unwrap();
        let linked: Vec<&str> = snapshot
            .index
            .relations_for("s1")
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(linked, vec!["c1"]);
    }

    /// Answers from "live" until `terms` fails over, then from fallback,
    /// the way the admin service behaves in a development build.
    struct SwitchingSource {
        fallback: AtomicBool,
        term_calls: AtomicU32,
    }

    impl SwitchingSource {
        fn label(&self) -> &'static str {
            if self.fallback.load(Ordering::SeqCst) {
                "Fallback"
            } else {
                "Live"
            }
        }
    }

    #[async_trait]
    impl CatalogSource for SwitchingSource {
        async fn curricula(&self) -> Result<NormalizedBatch<Curriculum>> {
            let mut items = source(None).curricula;
            items[0].name = format!("{} Curriculum", self.label());
            Ok(batch(items))
        }

        async fn subjects(&self) -> Result<NormalizedBatch<Subject>> {
            let mut items = source(None).subjects;
            items[0].name = format!("{} Subject", self.label());
            Ok(batch(items))
        }

        async fn subject_relations(&self) -> Result<NormalizedBatch<Relation>> {
            Ok(batch(Vec::new()))
        }

        async fn terms(&self) -> Result<NormalizedBatch<Term>> {
            self.term_calls.fetch_add(1, Ordering::SeqCst);
            self.fallback.store(true, Ordering::SeqCst);
            Ok(batch(source(None).terms))
        }

        fn serves_fallback(&self) -> bool {
            self.fallback.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_switch_to_fallback_mid_load_reloads_everything() {
        let switching = SwitchingSource {
            fallback: AtomicBool::new(false),
            term_calls: AtomicU32::new(0),
        };
        let snapshot = load_catalog(&switching).await.unwrap();
        assert_eq!(switching.term_calls.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.index.curricula()[0].name, "Fallback Curriculum");
        assert_eq!(snapshot.index.subjects()[0].name, "Fallback Subject");

        // Already in fallback: one pass.
        load_catalog(&switching).await.unwrap();
        assert_eq!(switching.term_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_refresh_discarded() {
        let state = CatalogState::new();
        let older = state.begin_refresh();
        let newer = state.begin_refresh();

        let fresh = load_catalog(&source(None)).await.unwrap();
        assert!(state.commit(newer, fresh).await);
        assert!(!state.commit(older, CatalogSnapshot::default()).await);

        let current = state.current().await.unwrap();
        assert_eq!(current.index.subjects().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_applies_in_order() {
        let state = CatalogState::new();
        assert!(state.current().await.is_none());
        assert!(state.refresh(&source(None)).await.unwrap());
        assert!(state.refresh(&source(None)).await.unwrap());
    }
}
