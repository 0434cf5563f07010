//! In-memory fallback data.
//!
//! Serves raw records in the same inconsistent shapes the live backend
//! produces (mixed field names, numeric and string ids, several envelopes),
//! so fallback data goes through exactly the same normalization as live
//! data. Writes are applied in memory and last for the process lifetime.
//!
//! ## Usage
//!
//! ```rust
//! use campus_client::mock::{MockCatalog, MockCollection};
//!
//! let catalog = MockCatalog::seeded();
//! let created = catalog.create(MockCollection::Subjects, serde_json::json!({"name": "Music"}));
//! assert!(created["id"].is_string());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Map, Value};
use tracing::debug;

use campus_core::normalize::{Candidates, Record};
use campus_core::{EntityId, Error, Normalizer, Result, Role, STANDARD_FIELDS};

/// The collections the fallback data set holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCollection {
    Institutions,
    Users,
    Roles,
    Curricula,
    Subjects,
    SubjectRelations,
    Terms,
    Goals,
    Milestones,
    LessonSessions,
    BehaviorLogs,
}

impl MockCollection {
    fn id_candidates(self) -> Candidates {
        match self {
            Self::Institutions => STANDARD_FIELDS.institution.id,
            Self::Users => STANDARD_FIELDS.user.id,
            Self::Curricula => STANDARD_FIELDS.curriculum.id,
            Self::Subjects => STANDARD_FIELDS.subject.id,
            Self::Terms => STANDARD_FIELDS.term.id,
            Self::Goals | Self::Milestones => STANDARD_FIELDS.target.id,
            Self::Roles | Self::SubjectRelations | Self::LessonSessions | Self::BehaviorLogs => {
                &["id", "Id"]
            }
        }
    }

    /// Wrap a list the way the backend does for this collection.
    fn envelope(self, items: Vec<Value>) -> Value {
        match self {
            Self::Users | Self::Goals | Self::Milestones => json!({ "data": items }),
            Self::Terms => json!({ "items": items }),
            _ => Value::Array(items),
        }
    }
}

/// Fallback record store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    data: Arc<Mutex<HashMap<MockCollection, Vec<Value>>>>,
}

impl MockCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the demo data set.
    pub fn seeded() -> Self {
        let catalog = Self::new();
        {
            let mut data = catalog.lock();
            for (collection, records) in seed() {
                data.insert(collection, records);
            }
        }
        catalog
    }

    /// Replace one collection's records.
    pub fn with_records(self, collection: MockCollection, records: Vec<Value>) -> Self {
        self.lock().insert(collection, records);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MockCollection, Vec<Value>>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: MockCollection) -> usize {
        self.lock().get(&collection).map_or(0, Vec::len)
    }

    /// A collection response.
    pub fn list(&self, collection: MockCollection) -> Value {
        let items = self.lock().get(&collection).cloned().unwrap_or_default();
        collection.envelope(items)
    }

    /// A collection response limited to one institution. Records carrying no
    /// institution reference are shared and always included.
    pub fn list_scoped(&self, collection: MockCollection, institution_id: Option<&EntityId>) -> Value {
        let Some(scope) = institution_id else {
            return self.list(collection);
        };
        let items = self
            .lock()
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| institution_of(r).map_or(true, |id| &id == scope))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        collection.envelope(items)
    }

    /// Users holding `role`, optionally limited to one institution.
    pub fn users_by_role(&self, role: &Role, institution_id: Option<&EntityId>) -> Value {
        let normalizer = Normalizer::default();
        let items = self
            .lock()
            .get(&MockCollection::Users)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| normalizer.user(r).value.role.as_ref() == Some(role))
                    .filter(|r| match institution_id {
                        Some(scope) => institution_of(r).as_ref() == Some(scope),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        MockCollection::Users.envelope(items)
    }

    /// Store a new record under a generated id and return it.
    pub fn create(&self, collection: MockCollection, record: Value) -> Value {
        let mut map = match record {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let id = uuid::Uuid::new_v4().to_string();
        map.insert("id".to_string(), Value::String(id.clone()));
        map.entry("createdAt")
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

        let stored = Value::Object(map);
        self.lock()
            .entry(collection)
            .or_default()
            .push(stored.clone());
        debug!(collection = ?collection, record_id = %id, "Mock record created");
        stored
    }

    /// Merge `patch` into the record with `id` and return the result.
    pub fn update(&self, op: &str, collection: MockCollection, id: &EntityId, patch: Value) -> Result<Value> {
        let mut data = self.lock();
        let record = data
            .get_mut(&collection)
            .and_then(|records| find_mut(records, collection, id))
            .ok_or_else(|| not_found(op, id))?;

        let common = &STANDARD_FIELDS.common;
        let reactivated = patch
            .as_object()
            .map(|fields| {
                let rec = Record::new(fields);
                rec.flag(common.is_deleted).is_none() && rec.flag(common.is_active) == Some(true)
            })
            .unwrap_or(false);

        if let (Value::Object(target), Value::Object(fields)) = (&mut *record, patch) {
            for (key, value) in fields {
                target.insert(key, value);
            }
            // A deleted flag would otherwise outrank the new active flag.
            if reactivated {
                for key in common.is_deleted {
                    target.remove(*key);
                }
            }
        }
        Ok(record.clone())
    }

    /// Mark the record with `id` deleted. The record stays in the list.
    pub fn soft_delete(&self, op: &str, collection: MockCollection, id: &EntityId) -> Result<()> {
        self.update(
            op,
            collection,
            id,
            json!({ "isDeleted": true, "isActive": false }),
        )
        .map(|_| ())
    }

    /// Remove the record with `id`, for entities without an active flag.
    pub fn remove(&self, op: &str, collection: MockCollection, id: &EntityId) -> Result<()> {
        let mut data = self.lock();
        let records = data.get_mut(&collection).ok_or_else(|| not_found(op, id))?;
        let before = records.len();
        records.retain(|r| {
            r.as_object()
                .and_then(|map| Record::new(map).id(collection.id_candidates()))
                .as_ref()
                != Some(id)
        });
        if records.len() == before {
            return Err(not_found(op, id));
        }
        Ok(())
    }
}

fn institution_of(record: &Value) -> Option<EntityId> {
    record
        .as_object()
        .and_then(|map| Record::new(map).id(STANDARD_FIELDS.user.institution_id))
}

fn find_mut<'a>(records: &'a mut [Value], collection: MockCollection, id: &EntityId) -> Option<&'a mut Value> {
    records.iter_mut().find(|r| {
        r.as_object()
            .and_then(|map| Record::new(map).id(collection.id_candidates()))
            .as_ref()
            == Some(id)
    })
}

fn not_found(op: &str, id: &EntityId) -> Error {
    Error::Application {
        operation: op.to_string(),
        status: 404,
        message: format!("No record with id {}", id),
    }
}

/// Demo data set. Shapes vary on purpose.
fn seed() -> Vec<(MockCollection, Vec<Value>)> {
    vec![
        (
            MockCollection::Institutions,
            vec![
                json!({
                    "id": 1,
                    "name": "Northfield Primary School",
                    "address": "12 Mill Lane, Northfield",
                    "type": 1,
                    "isDeleted": false,
                    "createdAt": "2024-01-10T09:00:00Z",
                    "createdBy": "system"
                }),
                json!({
                    "institutionId": "2",
                    "institutionName": "Lakeside Secondary",
                    "location": "4 Harbour Road",
                    "institutionType": "Secondary",
                    "isDeleted": false
                }),
                json!({
                    "Id": 3,
                    "Name": "Riverbend College",
                    "Type": "3",
                    "IsDeleted": true,
                    "UpdatedAt": "2024-09-01T12:30:00"
                }),
            ],
        ),
        (
            MockCollection::Users,
            vec![
                json!({
                    "id": "u-100",
                    "fullName": "Grace Hopper",
                    "email": "grace.hopper@northfield.edu",
                    "role": "Admin",
                    "institutionId": 1,
                    "isActive": true
                }),
                json!({
                    "userId": 101,
                    "firstName": "Alan",
                    "lastName": "Turing",
                    "Email": "alan.turing@northfield.edu",
                    "roleName": "teacher",
                    "schoolId": "1",
                    "lastLogin": "2025-03-02T08:15:00Z"
                }),
                json!({
                    "uid": "u-102",
                    "userName": "kjohnson",
                    "email": "k.johnson@lakeside.edu",
                    "Role": "Teacher",
                    "institution": { "id": 2, "name": "Lakeside Secondary" },
                    "status": "active"
                }),
                json!({
                    "applicationUserId": "u-103",
                    "email": "ada.lovelace@northfield.edu",
                    "roles": ["Student"],
                    "institutionId": "1"
                }),
                json!({
                    "Id": "u-104",
                    "NormalizedUserName": "MCURIE",
                    "Role": "student",
                    "InstitutionId": 2,
                    "IsActive": false
                }),
            ],
        ),
        (
            MockCollection::Roles,
            vec![json!("Admin"), json!("Teacher"), json!({ "name": "Student" })],
        ),
        (
            MockCollection::Curricula,
            vec![
                json!({
                    "id": "c-1",
                    "name": "National Curriculum",
                    "code": "NC",
                    "description": "Statutory programmes of study",
                    "isActive": true
                }),
                json!({
                    "curriculumId": "c-2",
                    "curriculumName": "International Baccalaureate",
                    "curriculumCode": "IB"
                }),
                json!({
                    "Id": "c-3",
                    "Name": "Cambridge IGCSE",
                    "Code": "IGCSE",
                    "IsActive": false
                }),
            ],
        ),
        (
            MockCollection::Subjects,
            vec![
                json!({ "id": "s-1", "name": "Mathematics", "curriculumId": "c-1" }),
                json!({
                    "subjectId": "s-2",
                    "subjectName": "Physics",
                    "curriculumIds": ["c-2", "c-1"],
                    "description": "Mechanics and waves"
                }),
                json!({ "Id": "s-3", "Name": "History", "CurriculumId": "c-1", "IsActive": true }),
                json!({ "id": "s-4", "title": "Art & Design" }),
            ],
        ),
        (
            MockCollection::SubjectRelations,
            vec![
                json!({ "subjectId": "s-3", "curriculumId": "c-2" }),
                json!({ "SubjectId": "s-4", "curriculum": { "id": "c-3" } }),
            ],
        ),
        (
            MockCollection::Terms,
            vec![
                json!({ "id": "t-1", "name": "[NC] Term 1", "institutionId": "1" }),
                json!({ "termId": "t-2", "termName": "[IB] Autumn", "schoolId": 2 }),
                json!({
                    "id": "t-3",
                    "name": "[International Baccalaureate] Spring",
                    "institutionId": "2"
                }),
                json!({ "Id": "t-4", "Name": "Summer Holiday Club", "InstitutionId": 1 }),
            ],
        ),
        (
            MockCollection::Goals,
            vec![
                json!({
                    "id": "g-1",
                    "curriculumId": "c-1",
                    "subjectId": "s-1",
                    "termId": "t-1",
                    "description": "Master fractions and decimals",
                    "isActive": true,
                    "createdAt": "2025-01-06T10:00:00Z"
                }),
                json!({
                    "goalId": "g-2",
                    "CurriculumId": "c-2",
                    "SubjectId": "s-2",
                    "TermId": "t-2",
                    "goalDescription": "Complete the lab portfolio"
                }),
            ],
        ),
        (
            MockCollection::Milestones,
            vec![json!({
                "milestoneId": "m-1",
                "curriculumId": "c-1",
                "subjectId": "s-3",
                "termId": "t-1",
                "milestoneDescription": "Essay on the Industrial Revolution",
                "isActive": true
            })],
        ),
    ]
}
