//! HTTP client for the backend API.
//!
//! Every request carries the session's bearer token, is retried on
//! transport failures and has its failure classified into the error
//! taxonomy. A 401 clears the stored credentials.

use std::time::Instant;

use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use campus_core::logging::{DURATION_MS, OPERATION, PATH, STATUS};
use campus_core::{Error, Result};

use crate::config::ClientConfig;
use crate::endpoints::Endpoint;
use crate::environment::RoutePlan;
use crate::retry::{retry_transient, RetryPolicy};
use crate::state::SessionState;

/// JSON client bound to one route plan and one session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    session: SessionState,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, plan: &RoutePlan, session: SessionState) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: Url::parse(&plan.base)
                .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", plan.base, e)))?,
            session,
            retry: config.retry_policy(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub async fn get_json(&self, op: &str, path: &Endpoint) -> Result<Value> {
        self.send(op, Method::GET, path, None).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, op: &str, path: &Endpoint, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.send(op, Method::POST, path, Some(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, op: &str, path: &Endpoint, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.send(op, Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, op: &str, path: &Endpoint) -> Result<Value> {
        self.send(op, Method::DELETE, path, None).await
    }

    async fn send(&self, op: &str, method: Method, path: &Endpoint, body: Option<Value>) -> Result<Value> {
        let body = body.as_ref();
        let url = path.url(&self.base)?;
        let url = &url;
        retry_transient(op, &self.retry, move || {
            self.attempt(op, method.clone(), url, path, body)
        })
        .await
    }

    /// Build a request with the bearer token when one is stored.
    fn build_request(&self, method: Method, url: &Url) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url.clone());

        if let Some(token) = self.session.token() {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        req.header("Accept", "application/json")
    }

    async fn attempt(
        &self,
        op: &str,
        method: Method,
        url: &Url,
        path: &Endpoint,
        body: Option<&Value>,
    ) -> Result<Value> {
        let started = Instant::now();
        let mut req = self.build_request(method.clone(), url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| classify_transport(op, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify_transport(op, &e))?;

        debug!(
            { OPERATION } = op,
            method = %method,
            { PATH } = %path,
            { STATUS } = status.as_u16(),
            { DURATION_MS } = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        if status == StatusCode::UNAUTHORIZED {
            warn!({ OPERATION } = op, { PATH } = %path, "Server rejected credentials, clearing session");
            if let Err(e) = self.session.clear_auth() {
                warn!(op, error = %e, "Failed to clear credentials");
            }
            return Err(Error::Unauthorized {
                operation: op.to_string(),
            });
        }

        if !status.is_success() {
            return Err(Error::Application {
                operation: op.to_string(),
                status: status.as_u16(),
                message: extract_error_message(status, &text),
            });
        }

        Ok(parse_body(&text))
    }
}

/// Empty bodies read as `null`; non-JSON bodies as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn classify_transport(op: &str, e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            operation: op.to_string(),
        }
    } else {
        Error::network(op, e.to_string())
    }
}

/// Pull a readable message out of an error response body.
///
/// Looks for `message`/`Message`, then a validation `errors` map (flattened
/// to `field: msg; field: msg`), then `title`, then a plain-text body, and
/// finally falls back to the status text.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    let generic = || {
        format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("error")
        )
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            generic()
        } else {
            trimmed.to_string()
        };
    };

    match &json {
        Value::String(s) if !s.trim().is_empty() => return s.trim().to_string(),
        Value::Object(map) => {
            if let Some(msg) = ["message", "Message", "error", "detail"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .filter(|m| !m.trim().is_empty())
            {
                return msg.to_string();
            }
            if let Some(errors) = map.get("errors").or_else(|| map.get("Errors")) {
                let flattened = flatten_errors(errors);
                if !flattened.is_empty() {
                    return flattened;
                }
            }
            if let Some(title) = map.get("title").and_then(Value::as_str) {
                return title.to_string();
            }
        }
        _ => {}
    }
    generic()
}

fn flatten_errors(errors: &Value) -> String {
    fn messages(value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().flat_map(messages).collect(),
            other => vec![other.to_string()],
        }
    }

    match errors {
        Value::Object(map) => map
            .iter()
            .map(|(field, value)| format!("{}: {}", field, messages(value).join(", ")))
            .collect::<Vec<_>>()
            .join("; "),
        other => messages(other).join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_field() {
        let msg = extract_error_message(StatusCode::BAD_REQUEST, r#"{"Message":"Email taken"}"#);
        assert_eq!(msg, "Email taken");
    }

    #[test]
    fn test_errors_map_flattened() {
        let body = r#"{"title":"One or more validation errors occurred.","errors":{"Name":["Required"],"Code":["Too long","Invalid"]}}"#;
        let msg = extract_error_message(StatusCode::BAD_REQUEST, body);
        assert_eq!(msg, "Code: Too long, Invalid; Name: Required");
    }

    #[test]
    fn test_title_when_no_errors() {
        let msg = extract_error_message(StatusCode::NOT_FOUND, r#"{"title":"Not Found"}"#);
        assert_eq!(msg, "Not Found");
    }

    #[test]
    fn test_plain_text_body() {
        let msg = extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, "Database down\n");
        assert_eq!(msg, "Database down");
    }

    #[test]
    fn test_generic_status_text() {
        assert_eq!(
            extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "500 Internal Server Error"
        );
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, "{}"),
            "502 Bad Gateway"
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("[1]"), serde_json::json!([1]));
        assert_eq!(parse_body("created"), Value::String("created".to_string()));
    }
}
