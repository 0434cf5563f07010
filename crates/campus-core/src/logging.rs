//! Structured logging field name constants for the campus crates.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log tooling can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation failed and nothing could be substituted |
//! | WARN  | Recoverable issue, automatic fallback applied (sentinel, mock data) |
//! | INFO  | Lifecycle events (startup, mode changes), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Logical operation name.
/// Examples: "list_subjects", "create_goal", "register_institution"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity kind being normalized or linked.
pub const ENTITY: &str = "entity";

/// Logical attribute being resolved.
pub const ATTRIBUTE: &str = "attribute";

/// Identifier of the record involved.
pub const RECORD_ID: &str = "record_id";

/// Institution scope applied to a request.
pub const INSTITUTION_ID: &str = "institution_id";

// ─── Source resolution fields ──────────────────────────────────────────────

/// Active data source ("live", "fallback", "demo").
pub const SOURCE_MODE: &str = "source_mode";

/// Request attempt number (0 = first try).
pub const ATTEMPT: &str = "attempt";

/// HTTP status code.
pub const STATUS: &str = "status";

/// Request path.
pub const PATH: &str = "path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of normalization issues raised.
pub const ISSUE_COUNT: &str = "issue_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
