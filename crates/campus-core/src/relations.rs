//! Relation builder: subject↔curriculum and term↔curriculum links.
//!
//! The backend does not always return joins. Subject links come either from
//! explicit relation records or from a subject's own `curriculum_id`; term
//! links come from the bracketed tag in the term name.
//!
//! Precedence between the two subject sources is applied when reading
//! ([`RelationIndex::relations_for`]), never baked into storage, so an
//! explicit relation that arrives later always wins.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::logging::{ISSUE_COUNT, RESULT_COUNT};
use crate::models::{Curriculum, EntityId, EntityKind, Relation, RelationSource, Subject, Term};
use crate::normalize::{IssueKind, NormalizationIssue};

/// Build `Derived` relations from subjects' `curriculum_id`.
///
/// Subjects whose curriculum id is not among `curricula` are skipped and
/// reported as dangling references.
pub fn derive_subject_relations(
    subjects: &[Subject],
    curricula: &[Curriculum],
) -> (Vec<Relation>, Vec<NormalizationIssue>) {
    let known: HashSet<&str> = curricula.iter().map(|c| c.id.as_str()).collect();
    let mut relations = Vec::new();
    let mut issues = Vec::new();

    for subject in subjects {
        let Some(curriculum_id) = subject.curriculum_id.as_ref() else {
            continue;
        };
        if known.contains(curriculum_id.as_str()) {
            relations.push(Relation {
                subject_id: subject.id.clone(),
                curriculum_id: curriculum_id.clone(),
                source: RelationSource::Derived,
            });
        } else {
            warn!(
                subject_id = %subject.id,
                curriculum_id = %curriculum_id,
                "Subject references unknown curriculum, no relation built"
            );
            issues.push(NormalizationIssue::new(
                EntityKind::Subject,
                Some(&subject.id),
                "curriculum_id",
                IssueKind::DanglingReference {
                    target: curriculum_id.clone(),
                },
            ));
        }
    }

    debug!(
        { RESULT_COUNT } = relations.len(),
        { ISSUE_COUNT } = issues.len(),
        "Derived subject relations"
    );
    (relations, issues)
}

/// The curriculum a term is scoped to: the first curriculum, in list order,
/// whose code or name equals the term's tag exactly.
pub fn match_term_curriculum<'c>(term: &Term, curricula: &'c [Curriculum]) -> Option<&'c Curriculum> {
    let tag = term.tag()?;
    curricula
        .iter()
        .find(|c| c.code.as_deref() == Some(tag) || c.name == tag)
}

/// Read-side index over one loaded catalog.
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    curricula: Vec<Curriculum>,
    curriculum_pos: HashMap<EntityId, usize>,
    subjects: Vec<Subject>,
    subject_pos: HashMap<EntityId, usize>,
    terms: Vec<Term>,
    /// subject id → curriculum ids from explicit relation records, in
    /// arrival order.
    explicit: HashMap<EntityId, Vec<EntityId>>,
    /// term id → curriculum id.
    term_links: HashMap<EntityId, EntityId>,
    issues: Vec<NormalizationIssue>,
}

impl RelationIndex {
    /// Build the index. Must be called only after both subjects and
    /// curricula have finished loading.
    pub fn build(
        curricula: Vec<Curriculum>,
        subjects: Vec<Subject>,
        terms: Vec<Term>,
        explicit: impl IntoIterator<Item = Relation>,
    ) -> Self {
        let curriculum_pos = curricula
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let subject_pos = subjects
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let (_, issues) = derive_subject_relations(&subjects, &curricula);

        let term_links = terms
            .iter()
            .filter_map(|t| match_term_curriculum(t, &curricula).map(|c| (t.id.clone(), c.id.clone())))
            .collect();

        let mut index = Self {
            curricula,
            curriculum_pos,
            subjects,
            subject_pos,
            terms,
            explicit: HashMap::new(),
            term_links,
            issues,
        };
        for relation in explicit {
            index.add_explicit(relation);
        }
        index
    }

    /// Record an explicit relation. Replaces nothing: a subject may hold
    /// several explicit links; all of them outrank its `curriculum_id`.
    pub fn add_explicit(&mut self, relation: Relation) {
        if !self.curriculum_pos.contains_key(relation.curriculum_id.as_str()) {
            warn!(
                subject_id = %relation.subject_id,
                curriculum_id = %relation.curriculum_id,
                "Explicit relation references unknown curriculum, ignored"
            );
            self.issues.push(NormalizationIssue::new(
                EntityKind::Relation,
                Some(&relation.subject_id),
                "curriculum_id",
                IssueKind::DanglingReference {
                    target: relation.curriculum_id,
                },
            ));
            return;
        }
        let links = self.explicit.entry(relation.subject_id).or_default();
        if !links.contains(&relation.curriculum_id) {
            links.push(relation.curriculum_id);
        }
    }

    fn curriculum(&self, id: &str) -> Option<&Curriculum> {
        self.curriculum_pos.get(id).map(|&i| &self.curricula[i])
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subject_pos.get(id).map(|&i| &self.subjects[i])
    }

    pub fn curricula(&self) -> &[Curriculum] {
        &self.curricula
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Dangling references found while building.
    pub fn issues(&self) -> &[NormalizationIssue] {
        &self.issues
    }

    /// Curricula a subject belongs to. Explicit relations win; without any,
    /// the subject's own `curriculum_id` is used.
    pub fn relations_for(&self, subject_id: &str) -> Vec<&Curriculum> {
        if let Some(ids) = self.explicit.get(subject_id).filter(|ids| !ids.is_empty()) {
            return ids.iter().filter_map(|id| self.curriculum(id.as_str())).collect();
        }
        self.subject(subject_id)
            .and_then(|s| s.curriculum_id.as_ref())
            .and_then(|id| self.curriculum(id.as_str()))
            .into_iter()
            .collect()
    }

    /// The relation records currently in effect, one per (subject,
    /// curriculum) pair, with their source.
    pub fn effective_relations(&self) -> Vec<Relation> {
        self.subjects
            .iter()
            .flat_map(|s| {
                let source = if self.explicit.get(s.id.as_str()).is_some_and(|v| !v.is_empty()) {
                    RelationSource::Explicit
                } else {
                    RelationSource::Derived
                };
                self.relations_for(s.id.as_str())
                    .into_iter()
                    .map(move |c| Relation {
                        subject_id: s.id.clone(),
                        curriculum_id: c.id.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Subjects whose effective relations include `curriculum_id`.
    pub fn subjects_for_curriculum(&self, curriculum_id: &str) -> Vec<&Subject> {
        self.subjects
            .iter()
            .filter(|s| {
                self.relations_for(s.id.as_str())
                    .iter()
                    .any(|c| c.id.as_str() == curriculum_id)
            })
            .collect()
    }

    /// Terms tagged for `curriculum_id`. Untagged terms never appear.
    pub fn terms_for_curriculum(&self, curriculum_id: &str) -> Vec<&Term> {
        self.terms
            .iter()
            .filter(|t| {
                self.term_links
                    .get(t.id.as_str())
                    .is_some_and(|c| c.as_str() == curriculum_id)
            })
            .collect()
    }

    pub fn curriculum_for_term(&self, term_id: &str) -> Option<&Curriculum> {
        self.term_links
            .get(term_id)
            .and_then(|id| self.curriculum(id.as_str()))
    }
}
