//! View models produced by the normalizer and write payloads sent back.
//!
//! The server's own schema is opaque; these are the stable client-side
//! shapes. Serialized field names are chosen so that feeding a serialized
//! view model back through the normalizer reproduces it exactly.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::term_tag::{parse_term_name, TermName};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Entity identifier.
///
/// The backend sends ids as strings in some places and numbers in others.
/// Every id is converted to its string form once, at the normalization
/// boundary, and compared as a string everywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no id candidate was present in the source record.
    pub fn is_missing(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Kinds of entity the console handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Institution,
    User,
    Curriculum,
    Subject,
    Term,
    Milestone,
    Goal,
    Relation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Institution => write!(f, "institution"),
            Self::User => write!(f, "user"),
            Self::Curriculum => write!(f, "curriculum"),
            Self::Subject => write!(f, "subject"),
            Self::Term => write!(f, "term"),
            Self::Milestone => write!(f, "milestone"),
            Self::Goal => write!(f, "goal"),
            Self::Relation => write!(f, "relation"),
        }
    }
}

// =============================================================================
// INSTITUTIONS
// =============================================================================

/// Institution level, encoded on the wire as 1/2/3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum InstitutionType {
    Primary,
    Secondary,
    Tertiary,
}

impl InstitutionType {
    pub fn code(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Tertiary => 3,
        }
    }

    /// Parse a type label ("Primary") or its numeric code ("1").
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(code) = value.parse::<u8>() {
            return Self::try_from(code).ok();
        }
        match value.to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "tertiary" => Some(Self::Tertiary),
            _ => None,
        }
    }
}

impl From<InstitutionType> for u8 {
    fn from(t: InstitutionType) -> u8 {
        t.code()
    }
}

impl TryFrom<u8> for InstitutionType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Primary),
            2 => Ok(Self::Secondary),
            3 => Ok(Self::Tertiary),
            other => Err(format!("unknown institution type code {other}")),
        }
    }
}

impl fmt::Display for InstitutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary"),
            Self::Secondary => write!(f, "Secondary"),
            Self::Tertiary => write!(f, "Tertiary"),
        }
    }
}

/// A school or other tenant. Never physically removed: deletion clears
/// `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub institution_type: Option<InstitutionType>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

// =============================================================================
// USERS
// =============================================================================

/// Console role. Parsed case-insensitively; unrecognized values are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    SuperAdmin,
    Admin,
    Teacher,
    Student,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "superadmin" | "super_admin" | "super admin" | "super-admin" => Self::SuperAdmin,
            "admin" | "administrator" => Self::Admin,
            "teacher" => Self::Teacher,
            "student" => Self::Student,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Path segment used by the user-by-role endpoint.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SuperAdmin => "SuperAdmin",
            Self::Admin => "Admin",
            Self::Teacher => "Teacher",
            Self::Student => "Student",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(r: Role) -> String {
        r.as_str().to_string()
    }
}

/// A console user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<EntityId>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

// =============================================================================
// CURRICULA, SUBJECTS, TERMS
// =============================================================================

/// A program of study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub id: EntityId,
    pub name: String,
    /// Short code used in term name tags, e.g. `BIO101`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

/// A subject, assigned to at most one curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curriculum_id: Option<EntityId>,
}

/// A scheduling period. The curriculum association is derived from a
/// `[TAG] ` prefix on the name and is not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<EntityId>,
}

impl Term {
    /// Parsed name: tag (if any) and display name.
    pub fn parsed_name(&self) -> TermName<'_> {
        parse_term_name(&self.name)
    }

    pub fn tag(&self) -> Option<&str> {
        self.parsed_name().tag
    }

    pub fn display_name(&self) -> &str {
        self.parsed_name().clean_name
    }
}

// =============================================================================
// GOALS AND MILESTONES
// =============================================================================

/// Goals (achievement targets) and milestones (coverage targets) share one
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Goal,
    Milestone,
}

impl TargetKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Goal => EntityKind::Goal,
            Self::Milestone => EntityKind::Milestone,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Goal => write!(f, "goal"),
            Self::Milestone => write!(f, "milestone"),
        }
    }
}

/// A goal or milestone for one (curriculum, subject, term) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: EntityId,
    pub kind: TargetKind,
    pub curriculum_id: Option<EntityId>,
    pub subject_id: Option<EntityId>,
    pub term_id: Option<EntityId>,
    pub description: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Where a subject↔curriculum link came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationSource {
    /// Returned by the server as a join record.
    Explicit,
    /// Built client-side from a subject's `curriculumId`.
    Derived,
}

/// Subject↔curriculum association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub subject_id: EntityId,
    pub curriculum_id: EntityId,
    pub source: RelationSource,
}

// =============================================================================
// WRITE PAYLOADS
// =============================================================================

/// Create/update payload for an institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub institution_type: Option<InstitutionType>,
}

/// Administrator account created alongside an institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    /// Filled in from the institution created in the first step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<EntityId>,
}

/// Create/update payload for a curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

impl Default for CurriculumDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            code: None,
            description: None,
            is_active: true,
        }
    }
}

/// Create/update payload for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curriculum_id: Option<EntityId>,
}

impl Default for SubjectDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            is_active: true,
            curriculum_id: None,
        }
    }
}

/// Create/update payload for a term. Use
/// [`format_term_name`](crate::term_tag::format_term_name) to scope it to a
/// curriculum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<EntityId>,
}

/// Create/update payload for a goal or milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDraft {
    pub curriculum_id: EntityId,
    pub subject_id: EntityId,
    pub term_id: EntityId,
    pub description: String,
    pub is_active: bool,
}

/// Payload for starting a lesson session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSessionStart {
    pub teacher_id: EntityId,
    pub subject_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// One entry appended to a student's behavior log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorLogEntry {
    pub student_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<EntityId>,
    pub behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
