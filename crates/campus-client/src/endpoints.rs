//! Backend endpoint paths, relative to the route plan's base URL.
//!
//! Ids and filter values are carried as separate path segments and query
//! pairs and only percent-encoded when joined onto the base URL, so a
//! value can never add a segment or a parameter of its own.

use std::fmt;

use reqwest::Url;

use campus_core::{Error, Result};

pub const INSTITUTIONS: &str = "/Institution";
pub const REGISTER_ADMIN: &str = "/Account/RegisterAdmin";
pub const USERS_BY_ROLE: &str = "/User/GetUsersByRole";
pub const ROLES: &str = "/Role";
pub const CURRICULA: &str = "/Curriculum";
pub const SUBJECTS: &str = "/Subject";
pub const SUBJECT_RELATIONS: &str = "/SubjectCurriculum";
pub const TERMS: &str = "/Term";
pub const GOALS: &str = "/Goal";
pub const MILESTONES: &str = "/Milestone";
pub const LESSON_SESSIONS: &str = "/LessonSession";
pub const BEHAVIOR_LOGS: &str = "/BehaviorLog";

/// A backend path with its query parameters, unencoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
}

impl Endpoint {
    /// Start from one of the path constants above.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
        }
    }

    /// Append one path segment, taken literally.
    pub fn push(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    /// Add an `institutionId` filter when a scope is known.
    pub fn scoped(self, institution_id: Option<&str>) -> Self {
        match institution_id {
            Some(id) => self.query("institutionId", id),
            None => self,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query_pairs(&self) -> &[(&'static str, String)] {
        &self.query
    }

    /// Join onto `base`, keeping any path prefix the base already has.
    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API base URL cannot carry a path: {}", base)))?
            .pop_if_empty()
            .extend(&self.segments);
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        for (i, (key, value)) in self.query.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, key, value)?;
        }
        Ok(())
    }
}

/// `{collection}/{id}`.
pub fn item(collection: &str, id: &str) -> Endpoint {
    Endpoint::new(collection).push(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }

    #[test]
    fn test_item() {
        let url = item(SUBJECTS, "s-1").url(&base()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/Subject/s-1");
    }

    #[test]
    fn test_scoped() {
        let plain = Endpoint::new(TERMS).scoped(None).url(&base()).unwrap();
        assert_eq!(plain.as_str(), "http://localhost:5000/Term");

        let url = Endpoint::new(USERS_BY_ROLE)
            .query("role", "Teacher")
            .scoped(Some("7"))
            .url(&base())
            .unwrap();
        assert_eq!(url.path(), "/User/GetUsersByRole");
        assert_eq!(url.query(), Some("role=Teacher&institutionId=7"));
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let url = item(SUBJECTS, "a/b?c#d").url(&base()).unwrap();
        assert_eq!(url.path(), "/Subject/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);

        let url = Endpoint::new(TERMS)
            .scoped(Some("1&evil=x"))
            .url(&base())
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("institutionId".to_string(), "1&evil=x".to_string())]);
    }

    #[test]
    fn test_base_path_prefix_kept() {
        let api = Url::parse("https://console.example.org/api").unwrap();
        let url = Endpoint::new(ROLES).url(&api).unwrap();
        assert_eq!(url.as_str(), "https://console.example.org/api/Role");

        let trailing = Url::parse("https://console.example.org/api/").unwrap();
        let url = item(TERMS, "t 1").url(&trailing).unwrap();
        assert_eq!(url.as_str(), "https://console.example.org/api/Term/t%201");
    }
}
