//! Principal extraction.
//!
//! Authentication happens upstream; the gateway forwards the caller's
//! workspace id in `X-Workspace-Id`. Handlers that need a caller take a
//! [`Principal`], handlers that merely personalize take
//! `Option<Principal>`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};

use crate::types::{Principal, WorkspaceId};

use super::routes::ErrorResponse;

/// Header carrying the authenticated workspace id.
pub const WORKSPACE_HEADER: &str = "x-workspace-id";

/// Parse the principal from request headers.
pub fn principal_from_parts(parts: &Parts) -> Result<Principal, ErrorResponse> {
    let raw = parts
        .headers
        .get(WORKSPACE_HEADER)
        .ok_or_else(|| ErrorResponse::new("UNAUTHENTICATED", "Missing workspace header"))?;

    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(|id| Principal::new(WorkspaceId::new(id)))
        .ok_or_else(|| {
            ErrorResponse::new("UNAUTHENTICATED", "Invalid workspace header")
                .with_details(String::from_utf8_lossy(raw.as_bytes()).into_owned())
        })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_parts(parts).map_err(|e| (StatusCode::UNAUTHORIZED, Json(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(WORKSPACE_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_valid_header() {
        let principal = principal_from_parts(&parts(Some("42"))).unwrap();
        assert_eq!(principal.workspace_id, WorkspaceId::new(42));
    }

    #[test]
    fn test_missing_or_garbage_header() {
        assert_eq!(principal_from_parts(&parts(None)).unwrap_err().code, "UNAUTHENTICATED");
        let err = principal_from_parts(&parts(Some("abc"))).unwrap_err();
        assert_eq!(err.details.as_deref(), Some("abc"));
    }
}
