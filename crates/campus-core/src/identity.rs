//! Identity context read from the bearer token.
//!
//! The token's payload segment is decoded to recover the institution the
//! signed-in user belongs to plus a few identity hints for display.
//!
//! **These claims are not verified.** No signature check happens here; the
//! server validates every request. Decoded claims are display and scoping
//! hints only and must never drive an authorization decision.
//!
//! Every failure (missing token, wrong segment count, bad base64, non-JSON
//! payload) degrades to an empty context, i.e. no institution scoping.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{EntityId, Role};
use crate::normalize::{name_from_email, Candidates, Record};

const NAME_IDENTIFIER_URI: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
const NAME_URI: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
const EMAIL_URI: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";
const ROLE_URI: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

const INSTITUTION_CLAIMS: Candidates = &[
    "institutionId",
    "InstitutionId",
    "institution_id",
    "schoolId",
    "SchoolId",
    "tenantId",
];
const USER_ID_CLAIMS: Candidates = &["sub", "nameid", "userId", "UserId", "id", NAME_IDENTIFIER_URI];
const NAME_CLAIMS: Candidates = &["name", NAME_URI, "unique_name", "preferred_username"];
const EMAIL_CLAIMS: Candidates = &["email", EMAIL_URI, "upn"];
const ROLE_CLAIMS: Candidates = &["role", "roles", ROLE_URI];

/// Claims decoded from a token payload, read defensively.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    claims: Map<String, Value>,
}

impl TokenClaims {
    /// Decode the payload segment of `token`. Accepts an optional
    /// `Bearer ` prefix. Returns `None` on any decoding failure.
    pub fn decode(token: &str) -> Option<Self> {
        let token = token.trim();
        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token)
            .trim();

        let mut segments = token.split('.');
        let (Some(_header), Some(payload)) = (segments.next(), segments.next()) else {
            debug!("Token has no payload segment, skipping claim extraction");
            return None;
        };

        let bytes = match decode_segment(payload) {
            Some(bytes) => bytes,
            None => {
                debug!("Token payload is not valid base64, skipping claim extraction");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(claims)) => Some(Self { claims }),
            Ok(_) => {
                debug!("Token payload is not a JSON object");
                None
            }
            Err(e) => {
                debug!(error = %e, "Token payload is not valid JSON");
                None
            }
        }
    }

    fn record(&self) -> Record<'_> {
        Record::new(&self.claims)
    }

    /// Raw claim by name.
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.claims.get(claim)
    }

    pub fn institution_id(&self) -> Option<EntityId> {
        self.record().id(INSTITUTION_CLAIMS)
    }

    pub fn user_id(&self) -> Option<EntityId> {
        self.record().id(USER_ID_CLAIMS)
    }

    pub fn email(&self) -> Option<String> {
        self.record().text(EMAIL_CLAIMS)
    }

    /// `name`, then `given_name family_name`, then other name claims, then
    /// the email local part.
    pub fn display_name(&self) -> Option<String> {
        let rec = self.record();
        if let Some(name) = rec.text(&["name"]) {
            return Some(name);
        }
        let parts: Vec<String> = [rec.text(&["given_name"]), rec.text(&["family_name"])]
            .into_iter()
            .flatten()
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }
        rec.text(NAME_CLAIMS)
            .or_else(|| self.email().and_then(|e| name_from_email(&e)))
    }

    pub fn role(&self) -> Option<Role> {
        self.record().text(ROLE_CLAIMS).map(|r| Role::parse(&r))
    }

    /// `exp` claim as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.claims.get("exp")?;
        let secs = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|f| f as i64))
            .or_else(|| exp.as_str().and_then(|s| s.trim().parse().ok()))?;
        DateTime::from_timestamp(secs, 0)
    }

    /// True only when an `exp` claim exists and is in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

/// Identity hints used to scope requests and label the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub institution_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IdentityContext {
    /// Build a context from an optional token. Never fails; an absent or
    /// unreadable token yields the empty context.
    pub fn from_token(token: Option<&str>) -> Self {
        token
            .and_then(TokenClaims::decode)
            .map(|claims| Self::from_claims(&claims))
            .unwrap_or_default()
    }

    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            institution_id: claims.institution_id(),
            user_id: claims.user_id(),
            display_name: claims.display_name(),
            email: claims.email(),
            role: claims.role(),
            expires_at: claims.expires_at(),
        }
    }

    /// Whether requests should be scoped to an institution.
    pub fn is_scoped(&self) -> bool {
        self.institution_id.is_some()
    }
}
