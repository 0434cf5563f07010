//! Entity normalizer: heterogeneous server records → stable view models.
//!
//! The backend is inconsistent about field names (`name` vs `subjectName` vs
//! `Name`), id types (string vs number), boolean polarity (`isDeleted` vs
//! `isActive`) and response envelopes (bare array vs `{data: [...]}`). All of
//! that is resolved here, once, against declarative per-entity
//! [`FieldTables`].
//!
//! ## Resolution rules
//!
//! 1. For each logical attribute, candidates are tried in table order; the
//!    first non-empty value (after trim) wins.
//! 2. If a required display name has no candidate, a fixed sentinel
//!    (`"Unknown User"`, ...) is used and a [`NormalizationIssue`] is raised
//!    and logged. Nothing in this module returns an error for a bad payload.
//! 3. `isDeleted` takes precedence over `isActive`/`status` and is negated.
//! 4. Ids are stored as strings ([`EntityId`]).
//!
//! Normalization is a fixed point: a serialized view model fed back in
//! yields the same view model.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::defaults;
use crate::logging::{ATTRIBUTE, ENTITY, ISSUE_COUNT, RECORD_ID, RESULT_COUNT};
use crate::models::{
    Curriculum, EntityId, EntityKind, Institution, InstitutionType, Relation, RelationSource,
    Role, Subject, Target, TargetKind, Term, User,
};

/// Ordered list of source field names for one logical attribute.
///
/// A dotted name (`curriculum.id`) looks inside a nested object.
pub type Candidates = &'static [&'static str];

// =============================================================================
// FIELD TABLES
// =============================================================================

/// Attributes shared by most entity kinds.
#[derive(Debug, Clone, Copy)]
pub struct CommonFields {
    pub is_deleted: Candidates,
    pub is_active: Candidates,
    pub status: Candidates,
    pub description: Candidates,
    pub created_at: Candidates,
    pub created_by: Candidates,
    pub updated_at: Candidates,
    pub updated_by: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct UserFields {
    pub id: Candidates,
    pub full_name: Candidates,
    pub first_name: Candidates,
    pub last_name: Candidates,
    pub user_name: Candidates,
    pub normalized_user_name: Candidates,
    pub email: Candidates,
    pub phone: Candidates,
    pub role: Candidates,
    pub institution_id: Candidates,
    pub last_login: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct InstitutionFields {
    pub id: Candidates,
    pub name: Candidates,
    pub address: Candidates,
    pub institution_type: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct CurriculumFields {
    pub id: Candidates,
    pub name: Candidates,
    pub code: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct SubjectFields {
    pub id: Candidates,
    pub name: Candidates,
    pub curriculum_id: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct TermFields {
    pub id: Candidates,
    pub name: Candidates,
    pub institution_id: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetFields {
    pub id: Candidates,
    pub curriculum_id: Candidates,
    pub subject_id: Candidates,
    pub term_id: Candidates,
    pub description: Candidates,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationFields {
    pub subject_id: Candidates,
    pub curriculum_id: Candidates,
}

/// Per-entity priority lists, in one place.
#[derive(Debug, Clone, Copy)]
pub struct FieldTables {
    pub common: CommonFields,
    pub user: UserFields,
    pub institution: InstitutionFields,
    pub curriculum: CurriculumFields,
    pub subject: SubjectFields,
    pub term: TermFields,
    pub target: TargetFields,
    pub relation: RelationFields,
}

const CURRICULUM_REF: Candidates = &[
    "curriculumId",
    "CurriculumId",
    "curriculum_id",
    "curriculum.id",
    "curriculumIds",
    "CurriculumIds",
];

const SUBJECT_REF: Candidates = &["subjectId", "SubjectId", "subject_id", "subject.id"];

/// The field tables matching the backend as deployed.
pub const STANDARD_FIELDS: FieldTables = FieldTables {
    common: CommonFields {
        is_deleted: &["isDeleted", "IsDeleted", "is_deleted", "deleted"],
        is_active: &["isActive", "IsActive", "is_active", "active", "enabled"],
        status: &["status", "Status"],
        description: &["description", "Description", "desc"],
        created_at: &["createdAt", "CreatedAt", "createdDate", "dateCreated", "created_at"],
        created_by: &["createdBy", "CreatedBy", "created_by"],
        updated_at: &["updatedAt", "UpdatedAt", "updatedDate", "lastModified", "updated_at"],
        updated_by: &["updatedBy", "UpdatedBy", "updated_by", "lastModifiedBy"],
    },
    user: UserFields {
        id: &[
            "id",
            "Id",
            "ID",
            "userId",
            "UserId",
            "user_id",
            "userID",
            "uid",
            "applicationUserId",
            "identityId",
            "nameid",
            "sub",
        ],
        full_name: &["name", "Name", "fullName", "FullName", "full_name", "displayName"],
        first_name: &["firstName", "FirstName", "first_name", "givenName"],
        last_name: &["lastName", "LastName", "last_name", "surname", "familyName"],
        user_name: &["userName", "UserName", "username"],
        normalized_user_name: &["normalizedUserName", "NormalizedUserName"],
        email: &["email", "Email", "emailAddress", "normalizedEmail"],
        phone: &["phone", "Phone", "phoneNumber", "PhoneNumber", "mobile"],
        role: &["role", "Role", "roleName", "userRole", "roles", "Roles"],
        institution_id: &[
            "institutionId",
            "InstitutionId",
            "institution_id",
            "institution.id",
            "schoolId",
            "SchoolId",
        ],
        last_login: &["lastLogin", "LastLogin", "lastLoginAt", "lastLoginDate"],
    },
    institution: InstitutionFields {
        id: &["id", "Id", "ID", "institutionId", "InstitutionId"],
        name: &["name", "Name", "institutionName", "InstitutionName", "schoolName"],
        address: &["address", "Address", "location"],
        institution_type: &["type", "Type", "institutionType", "InstitutionType", "typeId"],
    },
    curriculum: CurriculumFields {
        id: &["id", "Id", "ID", "curriculumId", "CurriculumId"],
        name: &["name", "curriculumName", "CurriculumName", "Name", "title"],
        code: &["code", "Code", "curriculumCode", "CurriculumCode", "shortCode"],
    },
    subject: SubjectFields {
        id: &["id", "Id", "ID", "subjectId", "SubjectId"],
        name: &["name", "subjectName", "SubjectName", "Name", "title"],
        curriculum_id: CURRICULUM_REF,
    },
    term: TermFields {
        id: &["id", "Id", "ID", "termId", "TermId"],
        name: &["name", "termName", "TermName", "Name", "title"],
        institution_id: &["institutionId", "InstitutionId", "institution_id", "schoolId"],
    },
    target: TargetFields {
        id: &["id", "Id", "ID", "goalId", "milestoneId"],
        curriculum_id: CURRICULUM_REF,
        subject_id: SUBJECT_REF,
        term_id: &["termId", "TermId", "term_id", "term.id"],
        description: &[
            "description",
            "Description",
            "goalDescription",
            "milestoneDescription",
            "text",
        ],
    },
    relation: RelationFields {
        subject_id: SUBJECT_REF,
        curriculum_id: CURRICULUM_REF,
    },
};

impl Default for FieldTables {
    fn default() -> Self {
        STANDARD_FIELDS
    }
}

// =============================================================================
// ISSUES
// =============================================================================

/// What went wrong with one attribute of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// No candidate field had a value; a sentinel or empty value was used.
    Missing,
    /// A candidate was present but could not be interpreted.
    Unparseable { value: String },
    /// The record was not a JSON object.
    NotAnObject,
    /// A collection response had no recognizable list.
    UnexpectedEnvelope,
    /// A reference points at an id that is not loaded.
    DanglingReference { target: EntityId },
}

/// A data-shape problem resolved by substitution. Raised instead of an error
/// so that one bad record never hides the rest of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationIssue {
    pub entity: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<EntityId>,
    pub attribute: &'static str,
    pub kind: IssueKind,
}

impl NormalizationIssue {
    pub fn new(
        entity: EntityKind,
        record_id: Option<&EntityId>,
        attribute: &'static str,
        kind: IssueKind,
    ) -> Self {
        let issue = Self {
            entity,
            record_id: record_id.filter(|id| !id.is_missing()).cloned(),
            attribute,
            kind,
        };
        warn!(
            { ENTITY } = %issue.entity,
            { RECORD_ID } = issue.record_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            { ATTRIBUTE } = issue.attribute,
            issue = ?issue.kind,
            "Normalization issue, substituted fallback value"
        );
        issue
    }
}

/// A normalized record plus the issues raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub issues: Vec<NormalizationIssue>,
}

impl<T> Normalized<T> {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A normalized collection plus all issues raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch<T> {
    pub items: Vec<T>,
    pub issues: Vec<NormalizationIssue>,
}

impl<T> Default for NormalizedBatch<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl<T> NormalizedBatch<T> {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// RECORD ACCESS
// =============================================================================

/// Read-only view over one JSON object with candidate-list lookups.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    fn lookup(&self, path: &str) -> Option<&'a Value> {
        if let Some(v) = self.map.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        match self.map.get(head)? {
            Value::Object(inner) => Record::new(inner).lookup(rest),
            _ => None,
        }
    }

    /// First non-empty string (numbers accepted), trimmed.
    pub fn text(&self, candidates: Candidates) -> Option<String> {
        candidates
            .iter()
            .find_map(|key| self.lookup(key).and_then(scalar_text))
    }

    /// First present id, as a string.
    pub fn id(&self, candidates: Candidates) -> Option<EntityId> {
        self.text(candidates).map(EntityId::from)
    }

    /// First interpretable boolean.
    pub fn flag(&self, candidates: Candidates) -> Option<bool> {
        candidates
            .iter()
            .find_map(|key| self.lookup(key).and_then(scalar_flag))
    }

    /// First parseable timestamp. Naive timestamps are taken as UTC.
    pub fn timestamp(&self, candidates: Candidates) -> Option<DateTime<Utc>> {
        candidates
            .iter()
            .find_map(|key| self.lookup(key).and_then(scalar_text))
            .and_then(|s| parse_timestamp(&s))
    }

    /// First candidate present at all, with the key that matched.
    pub fn raw(&self, candidates: Candidates) -> Option<(&'static str, &'a Value)> {
        candidates.iter().find_map(|key| {
            self.lookup(key)
                .filter(|v| !v.is_null())
                .map(|v| (*key, v))
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(number_text(n)),
        Value::Array(items) => items.first().and_then(scalar_text),
        Value::Object(inner) => inner
            .get("id")
            .or_else(|| inner.get("name"))
            .and_then(scalar_text),
        _ => None,
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn scalar_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Some(true),
            "false" | "0" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse RFC 3339, naive ISO 8601 (taken as UTC) or a bare date.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Derive a display name from an email local part:
/// `john.smith@x.com` → `John Smith`.
pub fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next()?.trim();
    let words: Vec<String> = local
        .split(['.', '_', '-', '+'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// ENVELOPES
// =============================================================================

const LIST_KEYS: &[&str] = &["data", "Data", "items", "Items", "results", "$values", "value"];

/// Find the list in a collection response.
///
/// Accepts a bare array, an object wrapping it under one of the common
/// envelope keys (one level of nesting allowed) and `null` (empty). Anything
/// else is an [`IssueKind::UnexpectedEnvelope`].
pub fn unwrap_collection(
    entity: EntityKind,
    payload: &Value,
) -> Result<&[Value], NormalizationIssue> {
    fn find(value: &Value, depth: u8) -> Option<&[Value]> {
        match value {
            Value::Array(items) => Some(items.as_slice()),
            Value::Object(map) if depth < 2 => LIST_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| find(v, depth + 1))),
            _ => None,
        }
    }

    if payload.is_null() {
        return Ok(&[]);
    }
    find(payload, 0).ok_or_else(|| {
        NormalizationIssue::new(entity, None, "response", IssueKind::UnexpectedEnvelope)
    })
}

/// Find the record in a single-entity response (`{data: {...}}` or bare).
pub fn unwrap_single(payload: &Value) -> &Value {
    match payload {
        Value::Object(map) => ["data", "Data"]
            .iter()
            .find_map(|k| map.get(*k).filter(|v| v.is_object()))
            .unwrap_or(payload),
        _ => payload,
    }
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// Converts raw records into view models using a set of [`FieldTables`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    tables: FieldTables,
}

/// Accumulates issues for the record being normalized.
struct IssueSink {
    entity: EntityKind,
    issues: Vec<NormalizationIssue>,
}

impl IssueSink {
    fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            issues: Vec::new(),
        }
    }

    fn push(&mut self, id: &EntityId, attribute: &'static str, kind: IssueKind) {
        self.issues
            .push(NormalizationIssue::new(self.entity, Some(id), attribute, kind));
    }

    fn finish<T>(self, value: T) -> Normalized<T> {
        Normalized {
            value,
            issues: self.issues,
        }
    }
}

impl Normalizer {
    pub fn new(tables: FieldTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &FieldTables {
        &self.tables
    }

    /// Normalize every record of a collection response.
    pub fn batch<T>(
        &self,
        entity: EntityKind,
        payload: &Value,
        normalize: impl Fn(&Self, &Value) -> Normalized<T>,
    ) -> NormalizedBatch<T> {
        let mut batch = NormalizedBatch::default();
        match unwrap_collection(entity, payload) {
            Ok(records) => {
                for raw in records {
                    let Normalized { value, issues } = normalize(self, raw);
                    batch.items.push(value);
                    batch.issues.extend(issues);
                }
            }
            Err(issue) => batch.issues.push(issue),
        }
        debug!(
            { ENTITY } = %entity,
            { RESULT_COUNT } = batch.items.len(),
            { ISSUE_COUNT } = batch.issues.len(),
            "Normalized collection"
        );
        batch
    }

    fn object<'v>(
        &self,
        sink: &mut IssueSink,
        raw: &'v Value,
    ) -> Option<Record<'v>> {
        match raw {
            Value::Object(map) => Some(Record::new(map)),
            _ => {
                sink.push(&EntityId::default(), "record", IssueKind::NotAnObject);
                None
            }
        }
    }

    fn required_id(&self, sink: &mut IssueSink, rec: &Record<'_>, candidates: Candidates) -> EntityId {
        match rec.id(candidates) {
            Some(id) => id,
            None => {
                sink.push(&EntityId::default(), "id", IssueKind::Missing);
                EntityId::default()
            }
        }
    }

    fn name_or_sentinel(
        &self,
        sink: &mut IssueSink,
        rec: &Record<'_>,
        id: &EntityId,
        candidates: Candidates,
        sentinel: &str,
    ) -> String {
        rec.text(candidates).unwrap_or_else(|| {
            sink.push(id, "name", IssueKind::Missing);
            sentinel.to_string()
        })
    }

    /// Positive activity flag. `isDeleted` wins and is negated; then
    /// `isActive`; then a textual status; default active.
    fn is_active(&self, rec: &Record<'_>) -> bool {
        let common = &self.tables.common;
        if let Some(deleted) = rec.flag(common.is_deleted) {
            return !deleted;
        }
        if let Some(active) = rec.flag(common.is_active) {
            return active;
        }
        match rec.text(common.status).map(|s| s.to_ascii_lowercase()) {
            Some(status) => !matches!(
                status.as_str(),
                "inactive" | "disabled" | "deleted" | "suspended" | "archived"
            ),
            None => true,
        }
    }

    // ── Users ────────────────────────────────────────────────────────────

    /// Display name cascade: explicit full name → first + last → user name
    /// → normalized user name → email local part.
    pub fn user_name(&self, rec: &Record<'_>) -> Option<String> {
        let f = &self.tables.user;
        if let Some(full) = rec.text(f.full_name) {
            return Some(full);
        }
        let parts: Vec<String> = [rec.text(f.first_name), rec.text(f.last_name)]
            .into_iter()
            .flatten()
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }
        rec.text(f.user_name)
            .or_else(|| rec.text(f.normalized_user_name))
            .or_else(|| rec.text(f.email).and_then(|e| name_from_email(&e)))
    }

    pub fn user(&self, raw: &Value) -> Normalized<User> {
        let mut sink = IssueSink::new(EntityKind::User);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(User {
                id: EntityId::default(),
                name: defaults::UNKNOWN_USER.to_string(),
                email: None,
                phone: None,
                role: None,
                institution_id: None,
                is_active: true,
                last_login: None,
            });
        };
        let f = &self.tables.user;

        let id = self.required_id(&mut sink, &rec, f.id);
        let name = self.user_name(&rec).unwrap_or_else(|| {
            sink.push(&id, "name", IssueKind::Missing);
            defaults::UNKNOWN_USER.to_string()
        });

        let user = User {
            name,
            email: rec.text(f.email),
            phone: rec.text(f.phone),
            role: rec.text(f.role).map(|r| Role::parse(&r)),
            institution_id: rec.id(f.institution_id),
            is_active: self.is_active(&rec),
            last_login: rec.timestamp(f.last_login),
            id,
        };
        sink.finish(user)
    }

    // ── Institutions ─────────────────────────────────────────────────────

    pub fn institution(&self, raw: &Value) -> Normalized<Institution> {
        let mut sink = IssueSink::new(EntityKind::Institution);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(Institution {
                id: EntityId::default(),
                name: defaults::UNKNOWN_INSTITUTION.to_string(),
                address: None,
                institution_type: None,
                is_active: true,
                created_at: None,
                created_by: None,
                updated_at: None,
                updated_by: None,
            });
        };
        let f = &self.tables.institution;
        let common = &self.tables.common;

        let id = self.required_id(&mut sink, &rec, f.id);
        let name = self.name_or_sentinel(&mut sink, &rec, &id, f.name, defaults::UNKNOWN_INSTITUTION);

        let institution_type = match rec.raw(f.institution_type) {
            None => None,
            Some((_, value)) => {
                let parsed = scalar_text(value).and_then(|s| InstitutionType::parse(&s));
                if parsed.is_none() {
                    sink.push(
                        &id,
                        "type",
                        IssueKind::Unparseable {
                            value: value.to_string(),
                        },
                    );
                }
                parsed
            }
        };

        sink.finish(Institution {
            name,
            address: rec.text(f.address),
            institution_type,
            is_active: self.is_active(&rec),
            created_at: rec.timestamp(common.created_at),
            created_by: rec.text(common.created_by),
            updated_at: rec.timestamp(common.updated_at),
            updated_by: rec.text(common.updated_by),
            id,
        })
    }

    // ── Curricula, subjects, terms ───────────────────────────────────────

    pub fn curriculum(&self, raw: &Value) -> Normalized<Curriculum> {
        let mut sink = IssueSink::new(EntityKind::Curriculum);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(Curriculum {
                id: EntityId::default(),
                name: defaults::UNKNOWN_CURRICULUM.to_string(),
                code: None,
                description: None,
                is_active: true,
            });
        };
        let f = &self.tables.curriculum;

        let id = self.required_id(&mut sink, &rec, f.id);
        let name = self.name_or_sentinel(&mut sink, &rec, &id, f.name, defaults::UNKNOWN_CURRICULUM);

        sink.finish(Curriculum {
            name,
            code: rec.text(f.code),
            description: rec.text(self.tables.common.description),
            is_active: self.is_active(&rec),
            id,
        })
    }

    pub fn subject(&self, raw: &Value) -> Normalized<Subject> {
        let mut sink = IssueSink::new(EntityKind::Subject);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(Subject {
                id: EntityId::default(),
                name: defaults::UNKNOWN_SUBJECT.to_string(),
                description: None,
                is_active: true,
                curriculum_id: None,
            });
        };
        let f = &self.tables.subject;

        let id = self.required_id(&mut sink, &rec, f.id);
        let name = self.name_or_sentinel(&mut sink, &rec, &id, f.name, defaults::UNKNOWN_SUBJECT);

        sink.finish(Subject {
            name,
            description: rec.text(self.tables.common.description),
            is_active: self.is_active(&rec),
            curriculum_id: rec.id(f.curriculum_id),
            id,
        })
    }

    pub fn term(&self, raw: &Value) -> Normalized<Term> {
        let mut sink = IssueSink::new(EntityKind::Term);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(Term {
                id: EntityId::default(),
                name: defaults::UNKNOWN_TERM.to_string(),
                institution_id: None,
            });
        };
        let f = &self.tables.term;

        let id = self.required_id(&mut sink, &rec, f.id);
        let name = self.name_or_sentinel(&mut sink, &rec, &id, f.name, defaults::UNKNOWN_TERM);

        sink.finish(Term {
            name,
            institution_id: rec.id(f.institution_id),
            id,
        })
    }

    // ── Goals and milestones ─────────────────────────────────────────────

    pub fn target(&self, kind: TargetKind, raw: &Value) -> Normalized<Target> {
        let mut sink = IssueSink::new(kind.entity_kind());
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(Target {
                id: EntityId::default(),
                kind,
                curriculum_id: None,
                subject_id: None,
                term_id: None,
                description: String::new(),
                is_active: true,
                created_at: None,
            });
        };
        let f = &self.tables.target;

        let id = self.required_id(&mut sink, &rec, f.id);
        let mut reference = |attribute: &'static str, candidates: Candidates| {
            let value = rec.id(candidates);
            if value.is_none() {
                sink.push(&id, attribute, IssueKind::Missing);
            }
            value
        };
        let curriculum_id = reference("curriculum_id", f.curriculum_id);
        let subject_id = reference("subject_id", f.subject_id);
        let term_id = reference("term_id", f.term_id);

        sink.finish(Target {
            kind,
            curriculum_id,
            subject_id,
            term_id,
            description: rec.text(f.description).unwrap_or_default(),
            is_active: self.is_active(&rec),
            created_at: rec.timestamp(self.tables.common.created_at),
            id,
        })
    }

    // ── Relations and roles ──────────────────────────────────────────────

    /// An explicit subject↔curriculum join record. Records missing either
    /// side yield `None` plus an issue.
    pub fn relation(&self, raw: &Value) -> Normalized<Option<Relation>> {
        let mut sink = IssueSink::new(EntityKind::Relation);
        let Some(rec) = self.object(&mut sink, raw) else {
            return sink.finish(None);
        };
        let f = &self.tables.relation;

        let subject_id = rec.id(f.subject_id);
        let curriculum_id = rec.id(f.curriculum_id);
        let none = EntityId::default();
        match (subject_id, curriculum_id) {
            (Some(subject_id), Some(curriculum_id)) => sink.finish(Some(Relation {
                subject_id,
                curriculum_id,
                source: RelationSource::Explicit,
            })),
            (subject_id, curriculum_id) => {
                if subject_id.is_none() {
                    sink.push(&none, "subject_id", IssueKind::Missing);
                }
                if curriculum_id.is_none() {
                    sink.push(subject_id.as_ref().unwrap_or(&none), "curriculum_id", IssueKind::Missing);
                }
                sink.finish(None)
            }
        }
    }

    /// Role listing: bare strings or objects with a name.
    pub fn role(&self, raw: &Value) -> Normalized<Option<Role>> {
        let mut sink = IssueSink::new(EntityKind::User);
        let name = match raw {
            Value::Object(map) => Record::new(map).text(&["name", "Name", "roleName", "normalizedName"]),
            other => scalar_text(other),
        };
        if name.is_none() {
            sink.push(&EntityId::default(), "role", IssueKind::Missing);
        }
        sink.finish(name.map(|n| Role::parse(&n)))
    }

    // ── Collections ──────────────────────────────────────────────────────

    pub fn users(&self, payload: &Value) -> NormalizedBatch<User> {
        self.batch(EntityKind::User, payload, Self::user)
    }

    pub fn institutions(&self, payload: &Value) -> NormalizedBatch<Institution> {
        self.batch(EntityKind::Institution, payload, Self::institution)
    }

    pub fn curricula(&self, payload: &Value) -> NormalizedBatch<Curriculum> {
        self.batch(EntityKind::Curriculum, payload, Self::curriculum)
    }

    pub fn subjects(&self, payload: &Value) -> NormalizedBatch<Subject> {
        self.batch(EntityKind::Subject, payload, Self::subject)
    }

    pub fn terms(&self, payload: &Value) -> NormalizedBatch<Term> {
        self.batch(EntityKind::Term, payload, Self::term)
    }

    pub fn targets(&self, kind: TargetKind, payload: &Value) -> NormalizedBatch<Target> {
        self.batch(kind.entity_kind(), payload, |n, raw| n.target(kind, raw))
    }

    pub fn relations(&self, payload: &Value) -> NormalizedBatch<Relation> {
        flatten(self.batch(EntityKind::Relation, payload, Self::relation))
    }

    pub fn roles(&self, payload: &Value) -> NormalizedBatch<Role> {
        flatten(self.batch(EntityKind::User, payload, Self::role))
    }
}

fn flatten<T>(batch: NormalizedBatch<Option<T>>) -> NormalizedBatch<T> {
    NormalizedBatch {
        items: batch.items.into_iter().flatten().collect(),
        issues: batch.issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn test_user_name_first_last() {
        let user = n().user(&json!({"id": 1, "firstName": "Jane", "lastName": "Doe", "email": "j@x.com"}));
        assert_eq!(user.value.name, "Jane Doe");
        assert!(user.is_clean());
    }

    #[test]
    fn test_user_name_from_email_only() {
        let user = n().user(&json!({"id": "u1", "email": "john.smith@x.com"}));
        assert_eq!(user.value.name, "John Smith");
    }

    #[test]
    fn test_user_name_full_name_beats_parts() {
        let user = n().user(&json!({
            "id": 3,
            "fullName": "Dr. Ada Lovelace",
            "firstName": "Ada",
            "lastName": "Lovelace"
        }));
        assert_eq!(user.value.name, "Dr. Ada Lovelace");
    }

    #[test]
    fn test_user_name_user_name_then_normalized() {
        let user = n().user(&json!({"id": 4, "userName": "teacher01", "normalizedUserName": "TEACHER01"}));
        assert_eq!(user.value.name, "teacher01");

        let user = n().user(&json!({"id": 5, "normalizedUserName": "TEACHER02"}));
        assert_eq!(user.value.name, "TEACHER02");
    }

    #[test]
    fn test_user_name_blank_candidates_skipped() {
        let user = n().user(&json!({"id": 6, "name": "   ", "firstName": "", "userName": "sam"}));
        assert_eq!(user.value.name, "sam");
    }

    #[test]
    fn test_user_sentinel_is_flagged() {
        let user = n().user(&json!({"id": 7}));
        assert_eq!(user.value.name, defaults::UNKNOWN_USER);
        assert_eq!(user.issues.len(), 1);
        assert_eq!(user.issues[0].attribute, "name");
        assert_eq!(user.issues[0].kind, IssueKind::Missing);
        assert_eq!(user.issues[0].record_id, Some(EntityId::from("7")));
    }

    #[test]
    fn test_user_id_aliases_and_numbers() {
        let user = n().user(&json!({"userId": 99, "name": "A"}));
        assert_eq!(user.value.id.as_str(), "99");

        let user = n().user(&json!({"sub": "abc-123", "name": "B"}));
        assert_eq!(user.value.id.as_str(), "abc-123");

        let user = n().user(&json!({"Id": 12.0, "name": "C"}));
        assert_eq!(user.value.id.as_str(), "12");
    }

    #[test]
    fn test_user_missing_id_flagged() {
        let user = n().user(&json!({"name": "No Id"}));
        assert!(user.value.id.is_missing());
        assert_eq!(user.issues[0].attribute, "id");
    }

    #[test]
    fn test_user_role_case_insensitive_and_array() {
        let user = n().user(&json!({"id": 1, "name": "A", "role": "tEaChEr"}));
        assert_eq!(user.value.role, Some(Role::Teacher));

        let user = n().user(&json!({"id": 1, "name": "A", "roles": ["Student", "Admin"]}));
        assert_eq!(user.value.role, Some(Role::Student));
    }

    #[test]
    fn test_user_institution_nested_object() {
        let user = n().user(&json!({"id": 1, "name": "A", "institution": {"id": 5, "name": "North"}}));
        assert_eq!(user.value.institution_id, Some(EntityId::from("5")));
    }

    #[test]
    fn test_is_deleted_negated() {
        let inst = n().institution(&json!({"id": 1, "name": "North High", "isDeleted": true}));
        assert!(!inst.value.is_active);

        let inst = n().institution(&json!({"id": 1, "name": "North High", "isDeleted": false}));
        assert!(inst.value.is_active);
    }

    #[test]
    fn test_is_deleted_wins_over_is_active() {
        let subject = n().subject(&json!({"id": 1, "name": "Bio", "isDeleted": true, "isActive": true}));
        assert!(!subject.value.is_active);
    }

    #[test]
    fn test_status_text_flag() {
        let user = n().user(&json!({"id": 1, "name": "A", "status": "Inactive"}));
        assert!(!user.value.is_active);
        let user = n().user(&json!({"id": 1, "name": "A", "status": "Active"}));
        assert!(user.value.is_active);
        let user = n().user(&json!({"id": 1, "name": "A"}));
        assert!(user.value.is_active);
    }

    #[test]
    fn test_flag_from_strings_and_numbers() {
        let subject = n().subject(&json!({"id": 1, "name": "Bio", "isDeleted": "true"}));
        assert!(!subject.value.is_active);
        let subject = n().subject(&json!({"id": 1, "name": "Bio", "isActive": 0}));
        assert!(!subject.value.is_active);
    }

    #[test]
    fn test_institution_type_codes_and_labels() {
        let inst = n().institution(&json!({"id": 1, "name": "A", "type": 2}));
        assert_eq!(inst.value.institution_type, Some(InstitutionType::Secondary));

        let inst = n().institution(&json!({"id": 1, "name": "A", "institutionType": "Tertiary"}));
        assert_eq!(inst.value.institution_type, Some(InstitutionType::Tertiary));
    }

    #[test]
    fn test_institution_type_unparseable_flagged() {
        let inst = n().institution(&json!({"id": 1, "name": "A", "type": 9}));
        assert_eq!(inst.value.institution_type, None);
        assert!(matches!(inst.issues[0].kind, IssueKind::Unparseable { .. }));
    }

    #[test]
    fn test_institution_audit_fields() {
        let inst = n().institution(&json!({
            "id": 1,
            "name": "A",
            "createdAt": "2024-03-01T10:00:00Z",
            "createdBy": "root",
            "updatedDate": "2024-03-02T11:30:00",
        }));
        assert_eq!(
            inst.value.created_at.unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
        assert_eq!(inst.value.created_by.as_deref(), Some("root"));
        assert!(inst.value.updated_at.is_some());
    }

    #[test]
    fn test_subject_name_aliases() {
        let subject = n().subject(&json!({"Id": 3, "SubjectName": "Chemistry"}));
        assert_eq!(subject.value.name, "Chemistry");
        assert_eq!(subject.value.id.as_str(), "3");
    }

    #[test]
    fn test_subject_sentinel() {
        let subject = n().subject(&json!({"id": 3}));
        assert_eq!(subject.value.name, defaults::UNKNOWN_SUBJECT);
        assert!(!subject.is_clean());
    }

    #[test]
    fn test_subject_curriculum_id_forms() {
        let s = n().subject(&json!({"id": 1, "name": "A", "curriculumId": 10}));
        assert_eq!(s.value.curriculum_id, Some(EntityId::from("10")));

        let s = n().subject(&json!({"id": 1, "name": "A", "curriculumIds": ["11", "12"]}));
        assert_eq!(s.value.curriculum_id, Some(EntityId::from("11")));

        let s = n().subject(&json!({"id": 1, "name": "A", "curriculum": {"id": 13}}));
        assert_eq!(s.value.curriculum_id, Some(EntityId::from("13")));

        let s = n().subject(&json!({"id": 1, "name": "A", "curriculumIds": []}));
        assert_eq!(s.value.curriculum_id, None);
    }

    #[test]
    fn test_curriculum_code() {
        let c = n().curriculum(&json!({"id": 1, "curriculumName": "Biology", "curriculumCode": "BIO101"}));
        assert_eq!(c.value.name, "Biology");
        assert_eq!(c.value.code.as_deref(), Some("BIO101"));
    }

    #[test]
    fn test_term_name_kept_with_tag() {
        let t = n().term(&json!({"id": 1, "termName": "[BIO101] Term 2"}));
        assert_eq!(t.value.name, "[BIO101] Term 2");
        assert_eq!(t.value.tag(), Some("BIO101"));
    }

    #[test]
    fn test_target_references_flagged_when_missing() {
        let g = n().target(TargetKind::Goal, &json!({"id": 1, "curriculumId": 2, "description": "x"}));
        assert_eq!(g.value.curriculum_id, Some(EntityId::from("2")));
        assert_eq!(g.value.subject_id, None);
        assert_eq!(g.issues.len(), 2);
        assert_eq!(g.issues[0].entity, EntityKind::Goal);
    }

    #[test]
    fn test_target_description_aliases() {
        let m = n().target(
            TargetKind::Milestone,
            &json!({"id": 1, "curriculumId": 1, "subjectId": 2, "termId": 3, "milestoneDescription": "Chapter 4"}),
        );
        assert_eq!(m.value.description, "Chapter 4");
        assert_eq!(m.value.kind, TargetKind::Milestone);
        assert!(m.is_clean());
    }

    #[test]
    fn test_relation_requires_both_sides() {
        let r = n().relation(&json!({"subjectId": 1, "curriculumId": 2}));
        assert_eq!(
            r.value,
            Some(Relation {
                subject_id: "1".into(),
                curriculum_id: "2".into(),
                source: RelationSource::Explicit
            })
        );

        let r = n().relation(&json!({"subjectId": 1}));
        assert_eq!(r.value, None);
        assert_eq!(r.issues.len(), 1);
    }

    #[test]
    fn test_not_an_object() {
        let s = n().subject(&json!("oops"));
        assert_eq!(s.value.name, defaults::UNKNOWN_SUBJECT);
        assert_eq!(s.issues[0].kind, IssueKind::NotAnObject);
    }

    #[test]
    fn test_envelopes() {
        let bare = json!([{"id": 1, "name": "A"}]);
        let wrapped = json!({"data": [{"id": 1, "name": "A"}]});
        let nested = json!({"data": {"items": [{"id": 1, "name": "A"}]}});
        let dotnet = json!({"$values": [{"id": 1, "name": "A"}]});
        for payload in [bare, wrapped, nested, dotnet] {
            let batch = n().subjects(&payload);
            assert_eq!(batch.len(), 1, "payload: {payload}");
            assert!(batch.is_clean());
        }
    }

    #[test]
    fn test_null_payload_is_empty_without_issue() {
        let batch = n().subjects(&Value::Null);
        assert!(batch.is_empty());
        assert!(batch.is_clean());
    }

    #[test]
    fn test_unexpected_envelope_is_issue_not_error() {
        let batch = n().subjects(&json!({"message": "ok"}));
        assert!(batch.is_empty());
        assert_eq!(batch.issues[0].kind, IssueKind::UnexpectedEnvelope);
    }

    #[test]
    fn test_batch_keeps_going_after_bad_record() {
        let batch = n().users(&json!([{"id": 1, "name": "A"}, 5, {"id": 2, "email": "b.c@x.org"}]));
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.items[2].name, "B C");
        assert_eq!(batch.issues.len(), 1);
        assert_eq!(batch.issues[0].kind, IssueKind::NotAnObject);
    }

    #[test]
    fn test_roles_from_strings_and_objects() {
        let roles = n().roles(&json!(["Admin", {"name": "teacher"}, {"x": 1}]));
        assert_eq!(roles.items, vec![Role::Admin, Role::Teacher]);
        assert_eq!(roles.issues.len(), 1);
    }

    #[test]
    fn test_custom_tables() {
        let mut tables = STANDARD_FIELDS;
        tables.subject.name = &["label"];
        let custom = Normalizer::new(tables);
        let s = custom.subject(&json!({"id": 1, "label": "Art", "name": "ignored"}));
        assert_eq!(s.value.name, "Art");
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("mary_ann-lee@school.org").as_deref(), Some("Mary Ann Lee"));
        assert_eq!(name_from_email("@nothing"), None);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-05-01T08:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-05-01T08:00:00.123").is_some());
        assert!(parse_timestamp("2024-05-01 08:00:00").is_some());
        assert!(parse_timestamp("2024-05-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_unwrap_single() {
        let payload = json!({"data": {"id": 4}});
        assert_eq!(unwrap_single(&payload), &json!({"id": 4}));
        let bare = json!({"id": 5});
        assert_eq!(unwrap_single(&bare), &bare);
    }
}
