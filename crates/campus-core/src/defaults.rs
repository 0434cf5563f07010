//! Centralized default constants for the campus crates.
//!
//! Organized by domain area. Client configuration, the resolver and the
//! normalizer reference these instead of defining their own magic values.

// =============================================================================
// HTTP
// =============================================================================

/// Backend base URL used when nothing is configured.
pub const API_BASE_URL: &str = "http://localhost:5000";

/// Same-origin path prefix that the console's web server proxies to the backend.
pub const PROXY_PREFIX: &str = "/api";

/// Request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RETRY
// =============================================================================

/// Retries after the first attempt, for network and timeout failures only.
pub const MAX_RETRIES: u32 = 2;

/// First backoff delay; doubles on each further retry.
pub const RETRY_BASE_DELAY_MS: u64 = 500;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Hostname fragments of known cloud preview environments. A page served
/// from one of these starts in fallback mode.
pub const CLOUD_PREVIEW_HOSTS: &[&str] = &[
    "webcontainer.io",
    "stackblitz.io",
    "csb.app",
    "codesandbox.io",
    "gitpod.io",
    "github.dev",
    "replit.dev",
    "repl.co",
    "vercel.app",
    "netlify.app",
];

// =============================================================================
// SENTINELS
// =============================================================================

/// Display name used when no user name candidate is present.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Display name used when no subject name candidate is present.
pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";

/// Display name used when no curriculum name candidate is present.
pub const UNKNOWN_CURRICULUM: &str = "Unknown Curriculum";

/// Display name used when no institution name candidate is present.
pub const UNKNOWN_INSTITUTION: &str = "Unknown Institution";

/// Display name used when no term name candidate is present.
pub const UNKNOWN_TERM: &str = "Unknown Term";
