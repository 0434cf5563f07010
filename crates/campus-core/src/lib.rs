//! # campus-core
//!
//! Core types and the data-reconciliation layer of the campus admin console.
//!
//! This crate turns inconsistently shaped backend records into stable view
//! models and rebuilds the links the backend leaves implicit:
//! - [`identity`]: non-authoritative claim reading from the bearer token
//! - [`normalize`]: declarative field tables, sentinels, envelope handling
//! - [`term_tag`]: `[TAG] Term 1` name parsing
//! - [`relations`]: subject↔curriculum and term↔curriculum links
//! - [`validation`]: checks that run before any write is sent
//!
//! It performs no I/O; `campus-client` feeds it.

pub mod defaults;
pub mod error;
pub mod filter;
pub mod identity;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod relations;
pub mod term_tag;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use filter::{SearchFilter, Searchable};
pub use identity::{IdentityContext, TokenClaims};
pub use models::*;
pub use normalize::{
    FieldTables, IssueKind, NormalizationIssue, Normalized, NormalizedBatch, Normalizer,
    STANDARD_FIELDS,
};
pub use relations::{derive_subject_relations, match_term_curriculum, RelationIndex};
pub use term_tag::{format_term_name, parse_term_name, TermName};
pub use traits::CatalogSource;
pub use validation::{ensure_unique_target, validate_target_draft, TargetKey};
