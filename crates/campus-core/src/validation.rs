//! Client-side checks run before a write is sent.

use crate::error::{Error, Result};
use crate::models::{EntityId, Target, TargetDraft, TargetKind};

/// The (curriculum, subject, term) triple a goal or milestone belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub curriculum_id: EntityId,
    pub subject_id: EntityId,
    pub term_id: EntityId,
}

impl TargetKey {
    pub fn of_draft(draft: &TargetDraft) -> Self {
        Self {
            curriculum_id: draft.curriculum_id.clone(),
            subject_id: draft.subject_id.clone(),
            term_id: draft.term_id.clone(),
        }
    }

    /// `None` when the target is missing any part of its triple.
    pub fn of_target(target: &Target) -> Option<Self> {
        Some(Self {
            curriculum_id: target.curriculum_id.clone()?,
            subject_id: target.subject_id.clone()?,
            term_id: target.term_id.clone()?,
        })
    }
}

/// Reject a draft with an empty reference or description.
pub fn validate_target_draft(kind: TargetKind, draft: &TargetDraft) -> Result<()> {
    let missing: Vec<&str> = [
        ("curriculum", draft.curriculum_id.is_missing()),
        ("subject", draft.subject_id.is_missing()),
        ("term", draft.term_id.is_missing()),
        ("description", draft.description.trim().is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "A {kind} needs a {}",
            missing.join(", ")
        )))
    }
}

/// At most one active goal (or milestone) per triple.
///
/// `existing` is the list the caller has loaded; `editing` is the id of the
/// record being updated, which does not conflict with itself. Inactive
/// records never conflict.
pub fn ensure_unique_target(
    kind: TargetKind,
    existing: &[Target],
    draft: &TargetDraft,
    editing: Option<&EntityId>,
) -> Result<()> {
    if !draft.is_active {
        return Ok(());
    }
    let key = TargetKey::of_draft(draft);
    let clash = existing.iter().find(|t| {
        t.kind == kind
            && t.is_active
            && Some(&t.id) != editing
            && TargetKey::of_target(t).as_ref() == Some(&key)
    });

    match clash {
        Some(t) => Err(Error::Validation(format!(
            "A {kind} already exists for this curriculum, subject and term (id {})",
            t.id
        ))),
        None => Ok(()),
    }
}

/// Reject names that are empty after trimming.
pub fn require_name(entity: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(format!("{entity} name is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn target(id: &str, kind: TargetKind, triple: (&str, &str, &str), active: bool) -> Target {
        Target {
            id: id.into(),
            kind,
            curriculum_id: Some(triple.0.into()),
            subject_id: Some(triple.1.into()),
            term_id: Some(triple.2.into()),
            description: "x".to_string(),
            is_active: active,
            created_at: None,
        }
    }

    fn draft(triple: (&str, &str, &str)) -> TargetDraft {
        TargetDraft {
            curriculum_id: triple.0.into(),
            subject_id: triple.1.into(),
            term_id: triple.2.into(),
            description: "Finish unit 3".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let existing = vec![target("g1", TargetKind::Goal, ("c", "s", "t"), true)];
        let err = ensure_unique_target(TargetKind::Goal, &existing, &draft(("c", "s", "t")), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("g1"));
    }

    #[test]
    fn test_different_triple_accepted() {
        let existing = vec![target("g1", TargetKind::Goal, ("c", "s", "t"), true)];
        assert!(ensure_unique_target(TargetKind::Goal, &existing, &draft(("c", "s", "t2")), None).is_ok());
    }

    #[test]
    fn test_inactive_does_not_conflict() {
        let existing = vec![target("g1", TargetKind::Goal, ("c", "s", "t"), false)];
        assert!(ensure_unique_target(TargetKind::Goal, &existing, &draft(("c", "s", "t")), None).is_ok());
    }

    #[test]
    fn test_goal_and_milestone_independent() {
        let existing = vec![target("m1", TargetKind::Milestone, ("c", "s", "t"), true)];
        assert!(ensure_unique_target(TargetKind::Goal, &existing, &draft(("c", "s", "t")), None).is_ok());
        assert!(
            ensure_unique_target(TargetKind::Milestone, &existing, &draft(("c", "s", "t")), None)
                .is_err()
        );
    }

    #[test]
    fn test_editing_self_allowed() {
        let existing = vec![target("g1", TargetKind::Goal, ("c", "s", "t"), true)];
        let editing = EntityId::from("g1");
        assert!(ensure_unique_target(
            TargetKind::Goal,
            &existing,
            &draft(("c", "s", "t")),
            Some(&editing)
        )
        .is_ok());
    }

    #[test]
    fn test_validate_draft_lists_missing_parts() {
        let mut d = draft(("", "s", "t"));
        d.description = "  ".to_string();
        let err = validate_target_draft(TargetKind::Milestone, &d).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: A milestone needs a curriculum, description"
        );
        assert!(validate_target_draft(TargetKind::Goal, &draft(("c", "s", "t"))).is_ok());
    }

    #[test]
    fn test_require_name() {
        assert!(require_name("Subject", " ").is_err());
        assert!(require_name("Subject", "Art").is_ok());
    }
}
