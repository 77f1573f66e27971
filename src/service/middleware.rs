//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! - `request` - path pattern, method, status and latency of every request
//! - `edit` - outcome and approvals cleared per module edit

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use regex_lite::Regex;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing; metrics are aggregated from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "research_modules::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

fn suffix_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"^/api/modules/[^/]+") {
        Ok(re) => re,
        Err(e) => unreachable!("static pattern: {e}"),
    })
}

fn handle_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"^/api/workspaces/[^/]+") {
        Ok(re) => re,
        Err(e) => unreachable!("static pattern: {e}"),
    })
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Module keys and workspace handles become placeholders.
pub(crate) fn normalize_path(path: &str) -> String {
    let path = suffix_segment().replace(path, "/api/modules/:key");
    handle_segment().replace(&path, "/api/workspaces/:handle").into_owned()
}

/// Record the outcome of a module edit.
pub fn record_edit(outcome: &str, authorships_reset: u64, latency_ms: u64) {
    info!(
        target: "research_modules::metrics",
        metric_type = "edit",
        outcome = outcome,
        authorships_reset = authorships_reset,
        latency_ms = latency_ms,
        "edit_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_module_key() {
        assert_eq!(normalize_path("/api/modules/7k2s-9x4q/detail"), "/api/modules/:key/detail");
        assert_eq!(normalize_path("/api/modules/12"), "/api/modules/:key");
    }

    #[test]
    fn test_normalize_path_replaces_handle() {
        assert_eq!(normalize_path("/api/workspaces/alice/follow"), "/api/workspaces/:handle/follow");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/workspace/profile"), "/api/workspace/profile");
    }
}
