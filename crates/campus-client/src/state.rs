//! Persisted client state: credentials, cached identity and the demo flag.
//!
//! The store is a flat string key/value map. Every read is optional: a
//! missing or unreadable entry means "not set", never an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use campus_core::{EntityId, Error, IdentityContext, Result, Role};

/// Storage keys.
pub mod keys {
    /// Token keys, checked in this order.
    pub const TOKEN: &[&str] = &["token", "authToken", "accessToken", "jwt"];
    pub const ROLE: &str = "role";
    /// Institution keys; `schoolId` is the legacy name.
    pub const INSTITUTION_ID: &[&str] = &["institutionId", "schoolId"];
    pub const USER: &str = "user";
    pub const SCHOOL: &str = "school";
    pub const DEMO_MODE: &str = "forceDemoMode";
}

/// Key/value persistence for client state.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object file, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the file, starting empty if it does not exist or is not a JSON
    /// object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Unreadable state file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "State file opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Storage(format!("serialize state: {}", e)))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Typed access to the persisted client state. Cheap to clone.
#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("has_token", &self.token().is_some())
            .field("demo_mode", &self.demo_mode())
            .finish()
    }
}

impl SessionState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// In-memory session, for tests and one-shot commands.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// File-backed session when a path is given, in-memory otherwise.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::new(Arc::new(FileStore::open(path)?))),
            None => Ok(Self::in_memory()),
        }
    }

    fn first_of(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find_map(|key| self.store.get(key).filter(|v| !v.trim().is_empty()))
    }

    /// Bearer token from the first populated token key.
    pub fn token(&self) -> Option<String> {
        self.first_of(keys::TOKEN)
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.store.set(keys::TOKEN[0], token)
    }

    /// Remove every credential and the cached identity.
    pub fn clear_auth(&self) -> Result<()> {
        for key in keys::TOKEN {
            self.store.remove(key)?;
        }
        self.store.remove(keys::ROLE)?;
        self.store.remove(keys::USER)?;
        info!("Credentials cleared");
        Ok(())
    }

    pub fn role(&self) -> Option<Role> {
        self.store.get(keys::ROLE).map(|r| Role::parse(&r))
    }

    pub fn set_role(&self, role: &Role) -> Result<()> {
        self.store.set(keys::ROLE, role.as_str())
    }

    pub fn institution_id(&self) -> Option<EntityId> {
        self.first_of(keys::INSTITUTION_ID).map(EntityId::from)
    }

    pub fn set_institution_id(&self, id: &EntityId) -> Result<()> {
        self.store.set(keys::INSTITUTION_ID[0], id.as_str())
    }

    fn cached_json(&self, key: &str) -> Option<Value> {
        let text = self.store.get(key)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Cached entry is not JSON, ignored");
                None
            }
        }
    }

    pub fn cached_user(&self) -> Option<Value> {
        self.cached_json(keys::USER)
    }

    pub fn set_cached_user(&self, user: &Value) -> Result<()> {
        self.store.set(keys::USER, &user.to_string())
    }

    pub fn cached_school(&self) -> Option<Value> {
        self.cached_json(keys::SCHOOL)
    }

    pub fn set_cached_school(&self, school: &Value) -> Result<()> {
        self.store.set(keys::SCHOOL, &school.to_string())
    }

    pub fn demo_mode(&self) -> bool {
        self.store
            .get(keys::DEMO_MODE)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    pub fn set_demo_mode(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.store.set(keys::DEMO_MODE, "true")
        } else {
            self.store.remove(keys::DEMO_MODE)
        }
    }

    /// Identity hints from the token, with the stored institution id and
    /// role filling in what the token lacks.
    pub fn identity(&self) -> IdentityContext {
        let mut identity = IdentityContext::from_token(self.token().as_deref());
        if identity.institution_id.is_none() {
            identity.institution_id = self.institution_id();
        }
        if identity.role.is_none() {
            identity.role = self.role();
        }
        identity
    }
}
