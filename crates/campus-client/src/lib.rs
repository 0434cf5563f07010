//! # campus-client
//!
//! Backend access for the campus admin console.
//!
//! This crate provides:
//! - Configuration from the environment ([`config`])
//! - Route planning: same-origin proxy, mixed content, cloud preview hosts ([`environment`])
//! - Persisted credentials and flags ([`state`])
//! - The HTTP client with bounded retry ([`http`], [`retry`])
//! - Live / fallback / demo source selection ([`resolver`])
//! - In-memory fallback data ([`mock`])
//! - The view-facing [`AdminService`] and the catalog loader ([`loader`])

pub mod config;
pub mod endpoints;
pub mod environment;
pub mod http;
pub mod loader;
pub mod mock;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod state;

pub use config::{BuildMode, ClientConfig};
pub use endpoints::Endpoint;
pub use environment::{detect_mixed_content, is_cloud_preview_host, plan_route, MixedContent, RoutePlan, RouteStrategy};
pub use http::ApiClient;
pub use loader::{load_catalog, CatalogSnapshot, CatalogState, RefreshTicket};
pub use mock::{MockCatalog, MockCollection};
pub use resolver::{SourceMode, SourceResolver};
pub use retry::{retry_transient, RetryPolicy};
pub use service::{AdminService, RegistrationOutcome};
pub use state::{FileStore, MemoryStore, SessionState, StateStore};
