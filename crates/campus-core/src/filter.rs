//! List filtering used by the console's CRUD screens.
//!
//! A search string matches case-insensitively as a substring of any of the
//! fields an entity exposes; facets are exact matches.

use crate::models::{Curriculum, Institution, Role, Subject, Target, Term, User};

/// Exposes the fields a search box looks at, plus the facet values.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    fn role(&self) -> Option<&Role> {
        None
    }

    fn institution_id(&self) -> Option<&str> {
        None
    }

    fn curriculum_id(&self) -> Option<&str> {
        None
    }

    fn is_active(&self) -> Option<bool> {
        None
    }
}

/// Search text plus optional exact-match facets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub query: String,
    pub role: Option<Role>,
    pub institution_id: Option<String>,
    pub curriculum_id: Option<String>,
    pub active: Option<bool>,
}

impl SearchFilter {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
        let needle = self.query.trim().to_lowercase();
        if !needle.is_empty()
            && !item
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        {
            return false;
        }
        if let Some(role) = &self.role {
            if item.role() != Some(role) {
                return false;
            }
        }
        if let Some(id) = &self.institution_id {
            if item.institution_id() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.curriculum_id {
            if item.curriculum_id() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(active) = self.active {
            if item.is_active() != Some(active) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a, T: Searchable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }
}

impl Searchable for User {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.email.as_deref());
        fields.extend(self.phone.as_deref());
        fields
    }

    fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    fn institution_id(&self) -> Option<&str> {
        self.institution_id.as_ref().map(|id| id.as_str())
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

impl Searchable for Institution {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.address.as_deref());
        fields
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

impl Searchable for Curriculum {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.code.as_deref());
        fields.extend(self.description.as_deref());
        fields
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

impl Searchable for Subject {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn curriculum_id(&self) -> Option<&str> {
        self.curriculum_id.as_ref().map(|id| id.as_str())
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

impl Searchable for Term {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn institution_id(&self) -> Option<&str> {
        self.institution_id.as_ref().map(|id| id.as_str())
    }
}

impl Searchable for Target {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.description.as_str()]
    }

    fn curriculum_id(&self) -> Option<&str> {
        self.curriculum_id.as_ref().map(|id| id.as_str())
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}
