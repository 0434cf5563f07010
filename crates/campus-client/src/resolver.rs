//! Source resolution: live backend, fallback data or demo mode.
//!
//! Each operation is given a live future and a fallback computation. The
//! resolver picks one from the current mode:
//!
//! | Mode | Behavior |
//! |------|----------|
//! | Demo | Fallback only; set by an explicit user opt-in, persisted |
//! | Fallback | Fallback only; entered at startup or after a live failure |
//! | Live | Live; on failure other than `Unauthorized` a development build switches to Fallback |
//!
//! The switch to Fallback is sticky for the resolver's lifetime and logged
//! once. A production build never substitutes data for a failed request.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use campus_core::logging::{ERROR_MSG, OPERATION, SOURCE_MODE};
use campus_core::{Error, ErrorKind, Result};

use crate::config::{BuildMode, ClientConfig};
use crate::environment::is_cloud_preview_host;
use crate::state::SessionState;

/// Where data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    Live,
    Fallback,
    Demo,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Fallback => write!(f, "fallback"),
            Self::Demo => write!(f, "demo"),
        }
    }
}

/// Per-application source resolver. Owns its fallback state; two resolvers
/// never share it.
#[derive(Debug)]
pub struct SourceResolver {
    build_mode: BuildMode,
    session: SessionState,
    fallback: AtomicBool,
}

impl SourceResolver {
    /// Start in Fallback when mock data is requested or the page is served
    /// from a cloud preview host, Live otherwise.
    pub fn new(config: &ClientConfig, session: SessionState) -> Self {
        let cloud_preview = config
            .page_host()
            .map(|host| is_cloud_preview_host(&host, &config.cloud_host_patterns()))
            .unwrap_or(false);
        let start_in_fallback = config.use_mock || cloud_preview;

        info!(
            build_mode = %config.build_mode,
            use_mock = config.use_mock,
            cloud_preview,
            { SOURCE_MODE } = if start_in_fallback { "fallback" } else { "live" },
            "Source resolver initialized"
        );

        Self {
            build_mode: config.build_mode,
            session,
            fallback: AtomicBool::new(start_in_fallback),
        }
    }

    pub fn build_mode(&self) -> BuildMode {
        self.build_mode
    }

    pub fn mode(&self) -> SourceMode {
        if self.session.demo_mode() {
            SourceMode::Demo
        } else if self.fallback.load(Ordering::SeqCst) {
            SourceMode::Fallback
        } else {
            SourceMode::Live
        }
    }

    /// Persist the demo opt-in.
    pub fn enable_demo(&self) -> Result<()> {
        self.session.set_demo_mode(true)?;
        info!(source_mode = "demo", "Demo mode enabled");
        Ok(())
    }

    /// Clear the demo opt-in. A sticky fallback stays in effect.
    pub fn clear_demo(&self) -> Result<()> {
        self.session.set_demo_mode(false)?;
        info!(source_mode = %self.mode(), "Demo mode cleared");
        Ok(())
    }

    /// Run `live` or `fallback` according to the current mode.
    ///
    /// An `Unauthorized` live failure always propagates: the credentials
    /// are gone and the caller has to sign in again.
    pub async fn resolve<T, L, Fut, F>(&self, op: &str, live: L, fallback: F) -> Result<T>
    where
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        F: FnOnce() -> Result<T>,
    {
        let mode = self.mode();
        if mode != SourceMode::Live {
            debug!({ OPERATION } = op, { SOURCE_MODE } = %mode, "Serving from fallback data");
            return fallback();
        }

        match live().await {
            Ok(value) => Ok(value),
            Err(e) if self.falls_back_on(&e) => {
                if !self.fallback.swap(true, Ordering::SeqCst) {
                    warn!(
                        { OPERATION } = op,
                        { ERROR_MSG } = %e,
                        { SOURCE_MODE } = "fallback",
                        "Live request failed, switching to fallback data for this session"
                    );
                } else {
                    debug!({ OPERATION } = op, { ERROR_MSG } = %e, "Live request failed, already in fallback");
                }
                fallback()
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`resolve`](Self::resolve), but a live failure is returned to
    /// the caller and never switches the session to fallback data. For
    /// optional collections whose caller degrades on its own.
    pub async fn resolve_optional<T, L, Fut, F>(&self, op: &str, live: L, fallback: F) -> Result<T>
    where
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        F: FnOnce() -> Result<T>,
    {
        let mode = self.mode();
        if mode != SourceMode::Live {
            debug!({ OPERATION } = op, { SOURCE_MODE } = %mode, "Serving from fallback data");
            return fallback();
        }
        live().await
    }

    fn falls_back_on(&self, e: &Error) -> bool {
        self.build_mode.is_development() && e.kind() != ErrorKind::Unauthorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn resolver(build_mode: BuildMode) -> SourceResolver {
        let config = ClientConfig {
            build_mode,
            ..Default::default()
        };
        SourceResolver::new(&config, SessionState::in_memory())
    }

    #[tokio::test]
    async fn test_live_success() {
        let r = resolver(BuildMode::Development);
        let value = r
            .resolve("list_curricula", || async { Ok(1) }, || Ok(2))
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(r.mode(), SourceMode::Live);
    }

    #[tokio::test]
    async fn test_development_failure_is_sticky() {
        let r = resolver(BuildMode::Development);
        let live_calls = AtomicU32::new(0);

        let first = r
            .resolve(
                "list_curricula",
                || async {
                    live_calls.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(Error::network("list_curricula", "refused"))
                },
                || Ok(2),
            )
            .await
            .unwrap();
        assert_eq!(first, 2);
        assert_eq!(r.mode(), SourceMode::Fallback);

        let second = r
            .resolve(
                "list_subjects",
                || async {
                    live_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                || Ok(3),
            )
            .await
            .unwrap();
        assert_eq!(second, 3);
        assert_eq!(live_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_production_failure_propagates() {
        let r = resolver(BuildMode::Production);
        let err = r
            .resolve(
                "list_curricula",
                || async { Err::<i32, _>(Error::network("list_curricula", "refused")) },
                || Ok(2),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(r.mode(), SourceMode::Live);
    }

    #[tokio::test]
    async fn test_development_unauthorized_propagates() {
        let r = resolver(BuildMode::Development);
        let err = r
            .resolve(
                "list_subjects",
                || async {
                    Err::<i32, _>(Error::Unauthorized {
                        operation: "list_subjects".to_string(),
                    })
                },
                || Ok(2),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(r.mode(), SourceMode::Live);
    }

    #[tokio::test]
    async fn test_optional_failure_stays_live() {
        let r = resolver(BuildMode::Development);
        let err = r
            .resolve_optional(
                "list_subject_relations",
                || async { Err::<i32, _>(Error::network("list_subject_relations", "refused")) },
                || Ok(2),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(r.mode(), SourceMode::Live);

        r.fallback.store(true, Ordering::SeqCst);
        let value = r
            .resolve_optional("list_subject_relations", || async { Ok(1) }, || Ok(2))
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_demo_mode_skips_live() {
        let r = resolver(BuildMode::Production);
        r.enable_demo().unwrap();
        assert_eq!(r.mode(), SourceMode::Demo);
        let live_calls = AtomicU32::new(0);
        let value = r
            .resolve(
                "list_terms",
                || async {
                    live_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                || Ok(5),
            )
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(live_calls.load(Ordering::SeqCst), 0);

        r.clear_demo().unwrap();
        assert_eq!(r.mode(), SourceMode::Live);
    }

    #[test]
    fn test_cloud_preview_starts_in_fallback() {
        let config = ClientConfig {
            page_origin: Some("https://x.csb.app".to_string()),
            ..Default::default()
        };
        let r = SourceResolver::new(&config, SessionState::in_memory());
        assert_eq!(r.mode(), SourceMode::Fallback);
    }

    #[test]
    fn test_use_mock_starts_in_fallback() {
        let config = ClientConfig {
            use_mock: true,
            ..Default::default()
        };
        assert_eq!(
            SourceResolver::new(&config, SessionState::in_memory()).mode(),
            SourceMode::Fallback
        );
    }

    #[test]
    fn test_resolvers_do_not_share_state() {
        let a = resolver(BuildMode::Development);
        let b = resolver(BuildMode::Development);
        a.fallback.store(true, Ordering::SeqCst);
        assert_eq!(a.mode(), SourceMode::Fallback);
        assert_eq!(b.mode(), SourceMode::Live);
    }
}
