//! Hosting environment detection.
//!
//! Decides where requests go before the first one is sent: through the
//! same-origin proxy or straight to the backend, and whether the page host is
//! a cloud preview where the backend is unreachable anyway.

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, warn};

use campus_core::{Error, Result};

use crate::config::ClientConfig;

/// Whether `host` matches one of the cloud preview patterns (substring match).
pub fn is_cloud_preview_host(host: &str, patterns: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && host.contains(&pattern.to_ascii_lowercase()))
}

/// A page served over TLS talking to a plaintext backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MixedContent {
    pub page_origin: String,
    /// The URL a browser would block.
    pub blocked_url: String,
    /// Same-origin proxy URL to use instead.
    pub recommended_url: String,
}

/// Same-origin proxy URL for a page origin: `https://host/api`.
pub fn proxy_url(page_origin: &str, proxy_prefix: &str) -> String {
    format!(
        "{}/{}",
        page_origin.trim_end_matches('/'),
        proxy_prefix.trim_matches('/')
    )
}

/// Flag a `https` page calling an `http` backend.
pub fn detect_mixed_content(
    page_origin: &str,
    api_base: &str,
    proxy_prefix: &str,
) -> Option<MixedContent> {
    let page = Url::parse(page_origin).ok()?;
    let api = Url::parse(api_base).ok()?;
    if page.scheme() == "https" && api.scheme() == "http" {
        Some(MixedContent {
            page_origin: page_origin.to_string(),
            blocked_url: api_base.to_string(),
            recommended_url: proxy_url(page_origin, proxy_prefix),
        })
    } else {
        None
    }
}

/// How requests reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Through the page host's relative prefix.
    SameOriginProxy,
    /// Straight to the configured backend origin.
    Direct,
}

/// Where requests go, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePlan {
    /// Base URL every request path is appended to.
    pub base: String,
    pub strategy: RouteStrategy,
    /// Set when the direct URL would be blocked; `base` is then the proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixed_content: Option<MixedContent>,
    /// The page host is a known cloud preview environment.
    pub cloud_preview: bool,
}

/// Decide the route for a configuration.
///
/// A known page origin always routes through the same-origin proxy, so a
/// blocked plaintext URL is never the primary path. Without a page origin
/// (command line use) requests go direct.
pub fn plan_route(config: &ClientConfig) -> Result<RoutePlan> {
    Url::parse(&config.api_base_url).map_err(|e| {
        Error::Config(format!("invalid api_base_url {}: {}", config.api_base_url, e))
    })?;

    let cloud_preview = config
        .page_host()
        .map(|host| is_cloud_preview_host(&host, &config.cloud_host_patterns()))
        .unwrap_or(false);

    let plan = match config.page_origin.as_deref() {
        Some(origin) => {
            let mixed_content =
                detect_mixed_content(origin, &config.api_base_url, &config.proxy_prefix);
            if let Some(mixed) = &mixed_content {
                warn!(
                    page_origin = %mixed.page_origin,
                    blocked_url = %mixed.blocked_url,
                    recommended_url = %mixed.recommended_url,
                    "Mixed content: TLS page with plaintext backend, using same-origin proxy"
                );
            }
            RoutePlan {
                base: proxy_url(origin, &config.proxy_prefix),
                strategy: RouteStrategy::SameOriginProxy,
                mixed_content,
                cloud_preview,
            }
        }
        None => RoutePlan {
            base: config.api_base_url.trim_end_matches('/').to_string(),
            strategy: RouteStrategy::Direct,
            mixed_content: None,
            cloud_preview,
        },
    };

    debug!(
        base = %plan.base,
        strategy = ?plan.strategy,
        cloud_preview = plan.cloud_preview,
        "Route planned"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<String> {
        ClientConfig::default().cloud_host_patterns()
    }

    #[test]
    fn test_cloud_preview_hosts() {
        assert!(is_cloud_preview_host("abc--5173.local-credentialless.webcontainer.io", &patterns()));
        assert!(is_cloud_preview_host("My-App.Vercel.App", &patterns()));
        assert!(!is_cloud_preview_host("console.school.edu", &patterns()));
        assert!(!is_cloud_preview_host("localhost", &patterns()));
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        assert!(!is_cloud_preview_host("anything", &[String::new()]));
    }

    #[test]
    fn test_mixed_content_flagged() {
        let mixed =
            detect_mixed_content("https://console.school.edu", "http://10.0.0.5:5000", "/api")
                .expect("should flag");
        assert_eq!(mixed.blocked_url, "http://10.0.0.5:5000");
        assert_eq!(mixed.recommended_url, "https://console.school.edu/api");
    }

    #[test]
    fn test_no_mixed_content_when_schemes_compatible() {
        assert!(detect_mixed_content("https://a.edu", "https://b.edu", "/api").is_none());
        assert!(detect_mixed_content("http://a.edu", "http://b.edu", "/api").is_none());
        assert!(detect_mixed_content("not a url", "http://b.edu", "/api").is_none());
    }

    #[test]
    fn test_plan_route_prefers_proxy_under_mixed_content() {
        let config = ClientConfig {
            api_base_url: "http://10.0.0.5:5000".to_string(),
            page_origin: Some("https://console.school.edu/".to_string()),
            ..Default::default()
        };
        let plan = plan_route(&config).unwrap();
        assert_eq!(plan.strategy, RouteStrategy::SameOriginProxy);
        assert_eq!(plan.base, "https://console.school.edu/api");
        assert!(plan.mixed_content.is_some());
        assert_ne!(plan.base, config.api_base_url);
    }

    #[test]
    fn test_plan_route_direct_without_page_origin() {
        let config = ClientConfig {
            api_base_url: "http://localhost:5000/".to_string(),
            ..Default::default()
        };
        let plan = plan_route(&config).unwrap();
        assert_eq!(plan.strategy, RouteStrategy::Direct);
        assert_eq!(plan.base, "http://localhost:5000");
        assert!(!plan.cloud_preview);
    }

    #[test]
    fn test_plan_route_detects_cloud_preview() {
        let config = ClientConfig {
            page_origin: Some("https://demo.stackblitz.io".to_string()),
            ..Default::default()
        };
        assert!(plan_route(&config).unwrap().cloud_preview);
    }

    #[test]
    fn test_plan_route_rejects_invalid_base() {
        let config = ClientConfig {
            api_base_url: "::nope".to_string(),
            ..Default::default()
        };
        assert!(plan_route(&config).is_err());
    }
}
