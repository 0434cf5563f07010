//! The service object the console's views call.
//!
//! Construct one [`AdminService`] at the application root and pass it down.
//! Every operation is named, goes through the [`SourceResolver`] and returns
//! normalized view models. Reads are scoped to the signed-in institution
//! where the backend supports it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use campus_core::logging::{
    ERROR_MSG, INSTITUTION_ID, ISSUE_COUNT, OPERATION, RESULT_COUNT, SOURCE_MODE,
};
use campus_core::normalize::{unwrap_single, Record};
use campus_core::validation::{ensure_unique_target, require_name, validate_target_draft};
use campus_core::{
    AdminDraft, BehaviorLogEntry, CatalogSource, Curriculum, CurriculumDraft, EntityId, Error,
    IdentityContext, Institution, InstitutionDraft, LessonSessionStart, Normalized,
    NormalizedBatch, Normalizer, Relation, Result, Role, Subject, SubjectDraft, Target,
    TargetDraft, TargetKind, Term, TermDraft, User,
};

use crate::config::ClientConfig;
use crate::endpoints::{self, Endpoint};
use crate::environment::{plan_route, RoutePlan};
use crate::http::ApiClient;
use crate::mock::{MockCatalog, MockCollection};
use crate::resolver::{SourceMode, SourceResolver};
use crate::state::SessionState;

/// Result of the two-step institution registration.
///
/// The steps are not atomic. When the institution was created but its
/// administrator was not, `admin` is `None` and `warning` says so; the
/// institution exists and has no administrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub institution: Institution,
    pub admin: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RegistrationOutcome {
    pub fn is_complete(&self) -> bool {
        self.admin.is_some()
    }
}

/// Admin console data service.
#[derive(Debug)]
pub struct AdminService {
    api: ApiClient,
    resolver: SourceResolver,
    mock: MockCatalog,
    session: SessionState,
    normalizer: Normalizer,
}

impl AdminService {
    /// Validate the config, plan the route and seed the fallback data.
    pub fn new(config: &ClientConfig, session: SessionState) -> Result<Self> {
        config.validate()?;
        let plan = plan_route(config)?;
        Self::with_parts(config, &plan, session, MockCatalog::seeded())
    }

    pub fn with_parts(
        config: &ClientConfig,
        plan: &RoutePlan,
        session: SessionState,
        mock: MockCatalog,
    ) -> Result<Self> {
        let api = ApiClient::new(config, plan, session.clone())?;
        let resolver = SourceResolver::new(config, session.clone());
        info!(
            base = %api.base(),
            { SOURCE_MODE } = %resolver.mode(),
            "Admin service ready"
        );
        Ok(Self {
            api,
            resolver,
            mock,
            session,
            normalizer: Normalizer::default(),
        })
    }

    pub fn mode(&self) -> SourceMode {
        self.resolver.mode()
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn mock(&self) -> &MockCatalog {
        &self.mock
    }

    pub fn identity(&self) -> IdentityContext {
        self.session.identity()
    }

    fn scope(&self) -> Option<EntityId> {
        self.session.identity().institution_id
    }

    // ── Plumbing ─────────────────────────────────────────────────────────

    async fn fetch(
        &self,
        op: &str,
        path: impl Into<Endpoint>,
        fallback: impl FnOnce(&MockCatalog) -> Value,
    ) -> Result<Value> {
        let path = path.into();
        self.resolver
            .resolve(op, || self.api.get_json(op, &path), || Ok(fallback(&self.mock)))
            .await
    }

    async fn post(
        &self,
        op: &str,
        path: impl Into<Endpoint>,
        body: &Value,
        fallback: impl FnOnce(&MockCatalog) -> Result<Value>,
    ) -> Result<Value> {
        let path = path.into();
        self.resolver
            .resolve(op, || self.api.post_json(op, &path, body), || fallback(&self.mock))
            .await
    }

    async fn put(
        &self,
        op: &str,
        path: impl Into<Endpoint>,
        body: &Value,
        fallback: impl FnOnce(&MockCatalog) -> Result<Value>,
    ) -> Result<Value> {
        let path = path.into();
        self.resolver
            .resolve(op, || self.api.put_json(op, &path, body), || fallback(&self.mock))
            .await
    }

    async fn remove(
        &self,
        op: &str,
        path: impl Into<Endpoint>,
        fallback: impl FnOnce(&MockCatalog) -> Result<()>,
    ) -> Result<()> {
        let path = path.into();
        self.resolver
            .resolve(
                op,
                || async { self.api.delete(op, &path).await.map(|_| ()) },
                || fallback(&self.mock),
            )
            .await
    }

    /// Normalize a write response. Servers answer with the record, a bare
    /// id or nothing; the latter two are completed from what was sent.
    fn written<T>(
        &self,
        payload: &Value,
        sent: &Value,
        id: Option<&EntityId>,
        normalize: impl Fn(&Normalizer, &Value) -> Normalized<T>,
    ) -> Normalized<T> {
        let record = unwrap_single(payload);
        if record.is_object() {
            return normalize(&self.normalizer, record);
        }
        let mut merged = sent.as_object().cloned().unwrap_or_else(Map::new);
        let returned_id = match record {
            Value::String(_) | Value::Number(_) => Some(record.clone()),
            _ => None,
        };
        if let Some(id) = returned_id.or_else(|| id.map(|id| Value::String(id.to_string()))) {
            merged.insert("id".to_string(), id);
        }
        normalize(&self.normalizer, &Value::Object(merged))
    }

    fn finish<T>(op: &str, batch: NormalizedBatch<T>) -> NormalizedBatch<T> {
        debug!(
            { OPERATION } = op,
            { RESULT_COUNT } = batch.len(),
            { ISSUE_COUNT } = batch.issues.len(),
            "List normalized"
        );
        batch
    }

    // ── Institutions ─────────────────────────────────────────────────────

    pub async fn list_institutions(&self) -> Result<NormalizedBatch<Institution>> {
        let op = "list_institutions";
        let payload = self
            .fetch(op, endpoints::INSTITUTIONS, |m| m.list(MockCollection::Institutions))
            .await?;
        Ok(Self::finish(op, self.normalizer.institutions(&payload)))
    }

    pub async fn create_institution(&self, draft: &InstitutionDraft) -> Result<Normalized<Institution>> {
        let op = "create_institution";
        require_name("Institution", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let payload = self
            .post(op, endpoints::INSTITUTIONS, &body, |m| {
                Ok(m.create(MockCollection::Institutions, body.clone()))
            })
            .await?;
        Ok(self.written(&payload, &body, None, Normalizer::institution))
    }

    pub async fn update_institution(
        &self,
        id: &EntityId,
        draft: &InstitutionDraft,
    ) -> Result<Normalized<Institution>> {
        let op = "update_institution";
        require_name("Institution", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let path = endpoints::item(endpoints::INSTITUTIONS, id.as_str());
        let payload = self
            .put(op, path, &body, |m| {
                m.update(op, MockCollection::Institutions, id, body.clone())
            })
            .await?;
        Ok(self.written(&payload, &body, Some(id), Normalizer::institution))
    }

    /// Soft delete: the institution is kept and reads back inactive.
    pub async fn delete_institution(&self, id: &EntityId) -> Result<()> {
        let op = "delete_institution";
        let path = endpoints::item(endpoints::INSTITUTIONS, id.as_str());
        self.remove(op, path, |m| m.soft_delete(op, MockCollection::Institutions, id))
            .await
    }

    /// Create an institution, then its administrator.
    ///
    /// A failure in the first step is an error. A failure in the second is
    /// reported in the outcome, since the institution already exists.
    pub async fn register_institution(
        &self,
        institution: &InstitutionDraft,
        admin: &AdminDraft,
    ) -> Result<RegistrationOutcome> {
        let created = self.create_institution(institution).await?.value;

        let mut admin = admin.clone();
        admin.institution_id = Some(created.id.clone());

        match self.register_admin(&admin).await {
            Ok(user) => {
                info!(
                    { OPERATION } = "register_institution",
                    { INSTITUTION_ID } = %created.id,
                    "Institution and administrator registered"
                );
                Ok(RegistrationOutcome {
                    institution: created,
                    admin: Some(user.value),
                    warning: None,
                })
            }
            Err(e) => {
                warn!(
                    { OPERATION } = "register_institution",
                    { INSTITUTION_ID } = %created.id,
                    { ERROR_MSG } = %e,
                    "Institution created but administrator registration failed"
                );
                let warning = format!(
                    "Institution \"{}\" was created (id {}) but its administrator account was not: {}",
                    created.name,
                    created.id,
                    e.user_message()
                );
                Ok(RegistrationOutcome {
                    institution: created,
                    admin: None,
                    warning: Some(warning),
                })
            }
        }
    }

    async fn register_admin(&self, admin: &AdminDraft) -> Result<Normalized<User>> {
        let op = "register_admin";
        let body = serde_json::to_value(admin)?;
        let payload = self
            .post(op, endpoints::REGISTER_ADMIN, &body, |m| {
                let mut record = body.clone();
                if let Some(map) = record.as_object_mut() {
                    map.remove("password");
                    map.insert("role".to_string(), json!(Role::Admin.as_str()));
                }
                Ok(m.create(MockCollection::Users, record))
            })
            .await?;
        Ok(self.written(&payload, &body, None, Normalizer::user))
    }

    // ── Users and roles ──────────────────────────────────────────────────

    pub async fn list_users_by_role(&self, role: &Role) -> Result<NormalizedBatch<User>> {
        let op = "list_users_by_role";
        let scope = self.scope();
        let path = Endpoint::new(endpoints::USERS_BY_ROLE)
            .query("role", role.as_str())
            .scoped(scope.as_ref().map(EntityId::as_str));
        let payload = self
            .fetch(op, path, |m| m.users_by_role(role, scope.as_ref()))
            .await?;
        Ok(Self::finish(op, self.normalizer.users(&payload)))
    }

    /// No backend endpoint exists for this.
    pub async fn set_user_status(&self, id: &EntityId, active: bool) -> Result<()> {
        debug!(op = "set_user_status", record_id = %id, active, "Rejected, unsupported");
        Err(Error::unsupported("set_user_status", "changing a user's status"))
    }

    /// No backend endpoint exists for this.
    pub async fn delete_user(&self, id: &EntityId) -> Result<()> {
        debug!(op = "delete_user", record_id = %id, "Rejected, unsupported");
        Err(Error::unsupported("delete_user", "deleting users"))
    }

    pub async fn list_roles(&self) -> Result<NormalizedBatch<Role>> {
        let op = "list_roles";
        let payload = self
            .fetch(op, endpoints::ROLES, |m| m.list(MockCollection::Roles))
            .await?;
        Ok(Self::finish(op, self.normalizer.roles(&payload)))
    }

    // ── Curricula ────────────────────────────────────────────────────────

    pub async fn list_curricula(&self) -> Result<NormalizedBatch<Curriculum>> {
        let op = "list_curricula";
        let payload = self
            .fetch(op, endpoints::CURRICULA, |m| m.list(MockCollection::Curricula))
            .await?;
        Ok(Self::finish(op, self.normalizer.curricula(&payload)))
    }

    pub async fn create_curriculum(&self, draft: &CurriculumDraft) -> Result<Normalized<Curriculum>> {
        let op = "create_curriculum";
        require_name("Curriculum", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let payload = self
            .post(op, endpoints::CURRICULA, &body, |m| {
                Ok(m.create(MockCollection::Curricula, body.clone()))
            })
            .await?;
        Ok(self.written(&payload, &body, None, Normalizer::curriculum))
    }

    pub async fn update_curriculum(
        &self,
        id: &EntityId,
        draft: &CurriculumDraft,
    ) -> Result<Normalized<Curriculum>> {
        let op = "update_curriculum";
        require_name("Curriculum", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let path = endpoints::item(endpoints::CURRICULA, id.as_str());
        let payload = self
            .put(op, path, &body, |m| {
                m.update(op, MockCollection::Curricula, id, body.clone())
            })
            .await?;
        Ok(self.written(&payload, &body, Some(id), Normalizer::curriculum))
    }

    pub async fn delete_curriculum(&self, id: &EntityId) -> Result<()> {
        let op = "delete_curriculum";
        let path = endpoints::item(endpoints::CURRICULA, id.as_str());
        self.remove(op, path, |m| m.soft_delete(op, MockCollection::Curricula, id))
            .await
    }

    // ── Subjects ─────────────────────────────────────────────────────────

    pub async fn list_subjects(&self) -> Result<NormalizedBatch<Subject>> {
        let op = "list_subjects";
        let payload = self
            .fetch(op, endpoints::SUBJECTS, |m| m.list(MockCollection::Subjects))
            .await?;
        Ok(Self::finish(op, self.normalizer.subjects(&payload)))
    }

    pub async fn create_subject(&self, draft: &SubjectDraft) -> Result<Normalized<Subject>> {
        let op = "create_subject";
        require_name("Subject", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let payload = self
            .post(op, endpoints::SUBJECTS, &body, |m| {
                Ok(m.create(MockCollection::Subjects, body.clone()))
            })
            .await?;
        Ok(self.written(&payload, &body, None, Normalizer::subject))
    }

    pub async fn update_subject(&self, id: &EntityId, draft: &SubjectDraft) -> Result<Normalized<Subject>> {
        let op = "update_subject";
        require_name("Subject", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let path = endpoints::item(endpoints::SUBJECTS, id.as_str());
        let payload = self
            .put(op, path, &body, |m| {
                m.update(op, MockCollection::Subjects, id, body.clone())
            })
            .await?;
        Ok(self.written(&payload, &body, Some(id), Normalizer::subject))
    }

    pub async fn delete_subject(&self, id: &EntityId) -> Result<()> {
        let op = "delete_subject";
        let path = endpoints::item(endpoints::SUBJECTS, id.as_str());
        self.remove(op, path, |m| m.soft_delete(op, MockCollection::Subjects, id))
            .await
    }

    /// Explicit subject↔curriculum join records.
    ///
    /// Optional data: a live failure is returned as-is and never switches
    /// the session to fallback, so live subjects are not linked through
    /// fallback relations.
    pub async fn list_subject_relations(&self) -> Result<NormalizedBatch<Relation>> {
        let op = "list_subject_relations";
        let path = Endpoint::new(endpoints::SUBJECT_RELATIONS);
        let payload = self
            .resolver
            .resolve_optional(
                op,
                || self.api.get_json(op, &path),
                || Ok(self.mock.list(MockCollection::SubjectRelations)),
            )
            .await?;
        Ok(Self::finish(op, self.normalizer.relations(&payload)))
    }

    // ── Terms ────────────────────────────────────────────────────────────

    pub async fn list_terms(&self) -> Result<NormalizedBatch<Term>> {
        let op = "list_terms";
        let scope = self.scope();
        let path = Endpoint::new(endpoints::TERMS).scoped(scope.as_ref().map(EntityId::as_str));
        let payload = self
            .fetch(op, path, |m| m.list_scoped(MockCollection::Terms, scope.as_ref()))
            .await?;
        Ok(Self::finish(op, self.normalizer.terms(&payload)))
    }

    /// Create a term; the signed-in institution is used when the draft has
    /// none.
    pub async fn create_term(&self, draft: &TermDraft) -> Result<Normalized<Term>> {
        let op = "create_term";
        require_name("Term", &draft.name)?;
        let mut draft = draft.clone();
        if draft.institution_id.is_none() {
            draft.institution_id = self.scope();
        }
        let body = serde_json::to_value(&draft)?;
        let payload = self
            .post(op, endpoints::TERMS, &body, |m| {
                Ok(m.create(MockCollection::Terms, body.clone()))
            })
            .await?;
        Ok(self.written(&payload, &body, None, Normalizer::term))
    }

    pub async fn update_term(&self, id: &EntityId, draft: &TermDraft) -> Result<Normalized<Term>> {
        let op = "update_term";
        require_name("Term", &draft.name)?;
        let body = serde_json::to_value(draft)?;
        let path = endpoints::item(endpoints::TERMS, id.as_str());
        let payload = self
            .put(op, path, &body, |m| m.update(op, MockCollection::Terms, id, body.clone()))
            .await?;
        Ok(self.written(&payload, &body, Some(id), Normalizer::term))
    }

    pub async fn delete_term(&self, id: &EntityId) -> Result<()> {
        let op = "delete_term";
        let path = endpoints::item(endpoints::TERMS, id.as_str());
        self.remove(op, path, |m| m.remove(op, MockCollection::Terms, id))
            .await
    }

    // ── Goals and milestones ─────────────────────────────────────────────

    fn target_route(kind: TargetKind) -> (&'static str, MockCollection) {
        match kind {
            TargetKind::Goal => (endpoints::GOALS, MockCollection::Goals),
            TargetKind::Milestone => (endpoints::MILESTONES, MockCollection::Milestones),
        }
    }

    pub async fn list_targets(&self, kind: TargetKind) -> Result<NormalizedBatch<Target>> {
        let op = match kind {
            TargetKind::Goal => "list_goals",
            TargetKind::Milestone => "list_milestones",
        };
        let (path, collection) = Self::target_route(kind);
        let payload = self.fetch(op, path, |m| m.list(collection)).await?;
        Ok(Self::finish(op, self.normalizer.targets(kind, &payload)))
    }

    pub async fn list_goals(&self) -> Result<NormalizedBatch<Target>> {
        self.list_targets(TargetKind::Goal).await
    }

    pub async fn list_milestones(&self) -> Result<NormalizedBatch<Target>> {
        self.list_targets(TargetKind::Milestone).await
    }

    /// Create a goal or milestone.
    ///
    /// `existing` is the list the caller has loaded. A draft that would be a
    /// second active record for the same curriculum, subject and term is
    /// rejected before any request is made.
    pub async fn create_target(
        &self,
        kind: TargetKind,
        draft: &TargetDraft,
        existing: &[Target],
    ) -> Result<Normalized<Target>> {
        let op = match kind {
            TargetKind::Goal => "create_goal",
            TargetKind::Milestone => "create_milestone",
        };
        validate_target_draft(kind, draft)?;
        ensure_unique_target(kind, existing, draft, None)?;

        let (path, collection) = Self::target_route(kind);
        let body = serde_json::to_value(draft)?;
        let payload = self
            .post(op, path, &body, |m| Ok(m.create(collection, body.clone())))
            .await?;
        Ok(self.written(&payload, &body, None, |n, raw| n.target(kind, raw)))
    }

    pub async fn create_goal(&self, draft: &TargetDraft, existing: &[Target]) -> Result<Normalized<Target>> {
        self.create_target(TargetKind::Goal, draft, existing).await
    }

    pub async fn create_milestone(
        &self,
        draft: &TargetDraft,
        existing: &[Target],
    ) -> Result<Normalized<Target>> {
        self.create_target(TargetKind::Milestone, draft, existing).await
    }

    /// Update a goal or milestone; the record does not conflict with itself.
    pub async fn update_target(
        &self,
        kind: TargetKind,
        id: &EntityId,
        draft: &TargetDraft,
        existing: &[Target],
    ) -> Result<Normalized<Target>> {
        let op = match kind {
            TargetKind::Goal => "update_goal",
            TargetKind::Milestone => "update_milestone",
        };
        validate_target_draft(kind, draft)?;
        ensure_unique_target(kind, existing, draft, Some(id))?;

        let (base, collection) = Self::target_route(kind);
        let path = endpoints::item(base, id.as_str());
        let body = serde_json::to_value(draft)?;
        let payload = self
            .put(op, path, &body, |m| m.update(op, collection, id, body.clone()))
            .await?;
        Ok(self.written(&payload, &body, Some(id), |n, raw| n.target(kind, raw)))
    }

    pub async fn delete_target(&self, kind: TargetKind, id: &EntityId) -> Result<()> {
        let op = match kind {
            TargetKind::Goal => "delete_goal",
            TargetKind::Milestone => "delete_milestone",
        };
        let (base, collection) = Self::target_route(kind);
        let path = endpoints::item(base, id.as_str());
        self.remove(op, path, |m| m.soft_delete(op, collection, id))
            .await
    }

    // ── Lesson sessions and behavior log ─────────────────────────────────

    /// Start a lesson session and return its id.
    pub async fn start_lesson_session(&self, start: &LessonSessionStart) -> Result<EntityId> {
        let op = "start_lesson_session";
        let body = serde_json::to_value(start)?;
        let path = Endpoint::new(endpoints::LESSON_SESSIONS).push("start");
        let payload = self
            .post(op, path, &body, |m| {
                Ok(m.create(MockCollection::LessonSessions, body.clone()))
            })
            .await?;

        let record = unwrap_single(&payload);
        let id = match record {
            Value::Object(map) => {
                Record::new(map).id(&["id", "Id", "sessionId", "lessonSessionId", "SessionId"])
            }
            Value::String(s) if !s.trim().is_empty() => Some(EntityId::from(s.trim())),
            Value::Number(n) => Some(EntityId::from(n.to_string())),
            _ => None,
        };
        id.ok_or_else(|| Error::DataShape(format!("{}: response carried no session id", op)))
    }

    pub async fn end_lesson_session(&self, id: &EntityId, ended_at: DateTime<Utc>) -> Result<()> {
        let op = "end_lesson_session";
        let body = json!({ "endedAt": ended_at });
        let path = endpoints::item(endpoints::LESSON_SESSIONS, id.as_str()).push("end");
        self.post(op, path, &body, |m| {
            m.update(op, MockCollection::LessonSessions, id, body.clone())
        })
        .await
        .map(|_| ())
    }

    pub async fn append_behavior_log(&self, entry: &BehaviorLogEntry) -> Result<()> {
        let op = "append_behavior_log";
        let body = serde_json::to_value(entry)?;
        self.post(op, endpoints::BEHAVIOR_LOGS, &body, |m| {
            Ok(m.create(MockCollection::BehaviorLogs, body.clone()))
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl CatalogSource for AdminService {
    async fn curricula(&self) -> Result<NormalizedBatch<Curriculum>> {
        self.list_curricula().await
    }

    async fn subjects(&self) -> Result<NormalizedBatch<Subject>> {
        self.list_subjects().await
    }

    async fn subject_relations(&self) -> Result<NormalizedBatch<Relation>> {
        self.list_subject_relations().await
    }

    async fn terms(&self) -> Result<NormalizedBatch<Term>> {
        self.list_terms().await
    }

    fn serves_fallback(&self) -> bool {
        self.mode() != SourceMode::Live
    }
}
