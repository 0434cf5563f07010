//! Cross-module properties of normalization and relation building.

use campus_core::{
    format_term_name, parse_term_name, Curriculum, Normalizer, Relation, RelationIndex,
    RelationSource, Subject, Term,
};
use serde_json::json;

#[test]
fn test_user_name_resolution_is_deterministic() {
    let n = Normalizer::default();
    let records = [
        (json!({ "id": 1, "fullName": "Grace Hopper", "firstName": "X", "email": "y@z" }), "Grace Hopper"),
        (json!({ "id": 2, "firstName": "Alan", "lastName": "Turing", "userName": "at" }), "Alan Turing"),
        (json!({ "id": 3, "userName": "kjohnson", "normalizedUserName": "KJOHNSON" }), "kjohnson"),
        (json!({ "id": 4, "NormalizedUserName": "MCURIE" }), "MCURIE"),
        (json!({ "id": 5, "email": "ada.lovelace@example.org" }), "Ada Lovelace"),
        (json!({ "id": 6 }), "Unknown User"),
    ];

    for (raw, expected) in &records {
        let first = n.user(raw).value;
        let second = n.user(raw).value;
        assert_eq!(first.name, *expected);
        assert_eq!(first, second);
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let n = Normalizer::default();
    let raw = json!([
        { "userId": 101, "firstName": "Alan", "lastName": "Turing", "roleName": "teacher",
          "schoolId": "1", "isDeleted": false, "lastLogin": "2025-03-02T08:15:00" },
        { "Id": "u-104", "NormalizedUserName": "MCURIE", "Role": "student", "IsActive": false }
    ]);
    let once = n.users(&raw).items;
    let again = n.users(&serde_json::to_value(&once).unwrap()).items;
    assert_eq!(once, again);

    let subjects = json!({ "data": [
        { "subjectId": 2, "subjectName": "Physics", "curriculumIds": ["c-2", "c-1"] }
    ]});
    let once = n.subjects(&subjects).items;
    let again = n.subjects(&serde_json::to_value(&once).unwrap()).items;
    assert_eq!(once, again);
}

#[test]
fn test_explicit_relation_beats_curriculum_reference() {
    let curricula = vec![
        Curriculum {
            id: "A".into(),
            name: "Alpha".to_string(),
            code: None,
            description: None,
            is_active: true,
        },
        Curriculum {
            id: "B".into(),
            name: "Beta".to_string(),
            code: None,
            description: None,
            is_active: true,
        },
    ];
    let subjects = vec![Subject {
        id: "S".into(),
        name: "History".to_string(),
        description: None,
        is_active: true,
        curriculum_id: Some("A".into()),
    }];

    let mut index = RelationIndex::build(curricula, subjects, Vec::<Term>::new(), Vec::new());
    let ids = |index: &RelationIndex| -> Vec<String> {
        index
            .relations_for("S")
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    };
    assert_eq!(ids(&index), vec!["A"]);

    index.add_explicit(Relation {
        subject_id: "S".into(),
        curriculum_id: "B".into(),
        source: RelationSource::Explicit,
    });
    assert_eq!(ids(&index), vec!["B"]);
    assert_eq!(index.effective_relations()[0].source, RelationSource::Explicit);
}

#[test]
fn test_term_tag_round_trip() {
    for (tag, name) in [("NC", "Term 1"), ("International Baccalaureate", "Spring"), ("X", "")] {
        let formatted = format_term_name(tag, name);
        let parsed = parse_term_name(&formatted);
        assert_eq!(parsed.tag, Some(tag));
        assert_eq!(parsed.clean_name, name);
    }

    let untagged = parse_term_name("Summer Holiday Club");
    assert_eq!(untagged.tag, None);
    assert_eq!(untagged.clean_name, "Summer Holiday Club");
}
