//! Axum routes for the research modules service.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    async_trait,
    extract::{FromRequestParts, Json, Path, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::editor::{EditError, EditPolicy};
use crate::lookup::CacheStats;
use crate::profile::ProfileError;
use crate::reader::ReaderError;
use crate::social::AuthorPanel;
use crate::store::{ModuleStore, PostgresModuleStore};
use crate::types::{
    Handle, LicenseId, ModuleDetail, ModuleEdit, ModuleId, ModuleTypeId, ModuleWithAuthors,
    Principal, ProfileUpdate, Suffix, Workspace,
};

use super::middleware::record_edit;
use super::state::ServiceState;

/// Type alias for the service state with PostgresModuleStore.
pub type AppState = ServiceState<PostgresModuleStore>;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Replacement values for a module's mutable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    /// New module type.
    pub type_id: ModuleTypeId,
    /// New title.
    pub title: String,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New license.
    pub license_id: LicenseId,
    /// New display color.
    #[serde(default)]
    pub display_color: Option<String>,
}

impl EditRequest {
    /// Bind the request to the module it targets.
    pub fn into_edit(self, module_id: ModuleId) -> ModuleEdit {
        ModuleEdit {
            module_id,
            type_id: self.type_id,
            title: self.title,
            description: self.description,
            license_id: self.license_id,
            display_color: self.display_color,
        }
    }
}

/// Follow state after a follow or unfollow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    /// Target workspace handle.
    pub handle: Handle,
    /// Whether the caller now follows the target.
    pub following: bool,
    /// False when the request matched the existing state.
    pub changed: bool,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether the store answered a ping.
    pub database: bool,
    /// Lookup cache counters.
    pub lookup_cache: CacheStats,
    /// Active edit policy.
    pub edit_policy: EditPolicy,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic.
    pub ready: bool,
    /// Whether the store answered a ping.
    pub database: bool,
    /// Why the service is not ready.
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID for request tracing (matches X-Cloud-Trace-Context).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: Option<String>) -> Self {
        self.correlation_id = id;
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        reject(StatusCode::BAD_REQUEST, self).into_response()
    }
}

/// Trace id of the current request, if the load balancer supplied one.
#[derive(Debug, Clone, Default)]
pub struct CorrelationId(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get("X-Cloud-Trace-Context")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.split('/').next().unwrap_or(s).to_string()),
        ))
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

fn reject(status: StatusCode, error: ErrorResponse) -> ApiError {
    tracing::warn!(
        status = status.as_u16(),
        code = %error.code,
        error = %error.error,
        correlation_id = ?error.correlation_id,
        "Request error"
    );
    (status, Json(error))
}

fn edit_error(e: EditError, cid: &CorrelationId) -> ApiError {
    let (status, code) = match &e {
        EditError::ReferenceNotFound(_) => (StatusCode::UNPROCESSABLE_ENTITY, "REFERENCE_NOT_FOUND"),
        EditError::ModuleNotFound(_) => (StatusCode::NOT_FOUND, "MODULE_NOT_FOUND"),
        EditError::TransactionConflict { .. } => (StatusCode::CONFLICT, "TRANSACTION_CONFLICT"),
        EditError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "NOT_AN_AUTHOR"),
        EditError::AlreadyPublished(_) => (StatusCode::CONFLICT, "ALREADY_PUBLISHED"),
        EditError::StoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    };
    reject(status, ErrorResponse::new(code, e.to_string()).with_correlation_id(cid.0.clone()))
}

fn profile_error(e: ProfileError, cid: &CorrelationId) -> ApiError {
    let (status, code) = match &e {
        ProfileError::NotFound(_) => (StatusCode::NOT_FOUND, "WORKSPACE_NOT_FOUND"),
        ProfileError::SelfFollow => (StatusCode::UNPROCESSABLE_ENTITY, "SELF_FOLLOW"),
        ProfileError::EmptyUpdate => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_UPDATE"),
        ProfileError::StoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    };
    reject(status, ErrorResponse::new(code, e.to_string()).with_correlation_id(cid.0.clone()))
}

fn reader_error(e: ReaderError, cid: &CorrelationId) -> ApiError {
    reject(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("STORE_ERROR", e.to_string()).with_correlation_id(cid.0.clone()),
    )
}

fn module_not_found(key: &str, cid: &CorrelationId) -> ApiError {
    reject(
        StatusCode::NOT_FOUND,
        ErrorResponse::new("MODULE_NOT_FOUND", format!("Module not found: {}", key))
            .with_correlation_id(cid.0.clone()),
    )
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Get a module by DOI suffix, with its authors.
async fn module_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(suffix): Path<String>,
    cid: CorrelationId,
) -> Result<Json<ModuleWithAuthors>, ApiError> {
    state.reader.by_suffix(&Suffix::new(suffix.as_str())).await
        .map_err(|e| reader_error(e, &cid))?
        .map(Json)
        .ok_or_else(|| module_not_found(&suffix, &cid))
}

/// Get a module by DOI suffix with its full reference and lineage graph.
async fn detail_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(suffix): Path<String>,
    cid: CorrelationId,
) -> Result<Json<ModuleDetail>, ApiError> {
    state.reader.detail_by_suffix(&Suffix::new(suffix.as_str())).await
        .map_err(|e| reader_error(e, &cid))?
        .map(Json)
        .ok_or_else(|| module_not_found(&suffix, &cid))
}

/// Author side panel, with follow actions when the caller is known.
async fn authors_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(suffix): Path<String>,
    principal: Option<Principal>,
    cid: CorrelationId,
) -> Result<Json<AuthorPanel>, ApiError> {
    let module = state.reader.by_suffix(&Suffix::new(suffix.as_str())).await
        .map_err(|e| reader_error(e, &cid))?
        .ok_or_else(|| module_not_found(&suffix, &cid))?;

    let panel = state.profiles.author_panel(&module, principal.as_ref()).await
        .map_err(|e| profile_error(e, &cid))?;
    Ok(Json(panel))
}

/// Edit a module's mutable fields. Clears every author's approval.
///
/// `key` is either the module's integer id or its DOI suffix.
async fn edit_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(key): Path<String>,
    principal: Principal,
    cid: CorrelationId,
    Json(request): Json<EditRequest>,
) -> Result<Json<ModuleDetail>, ApiError> {
    let module_id = resolve_module_id(&state, &key, &cid).await?;

    let start = Instant::now();
    match state.editor.apply(&principal, request.into_edit(module_id)).await {
        Ok(outcome) => {
            record_edit("applied", outcome.authorships_reset, start.elapsed().as_millis() as u64);
            Ok(Json(outcome.detail))
        }
        Err(e) => {
            record_edit("rejected", 0, start.elapsed().as_millis() as u64);
            Err(edit_error(e, &cid))
        }
    }
}

async fn resolve_module_id<S: ModuleStore + 'static>(
    state: &ServiceState<S>,
    key: &str,
    cid: &CorrelationId,
) -> Result<ModuleId, ApiError> {
    if let Ok(id) = key.parse::<i32>() {
        return Ok(ModuleId::new(id));
    }
    state.reader.by_suffix(&Suffix::new(key)).await
        .map_err(|e| reader_error(e, cid))?
        .map(|m| m.module.id)
        .ok_or_else(|| module_not_found(key, cid))
}

/// Follow a workspace.
async fn follow_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(handle): Path<String>,
    principal: Principal,
    cid: CorrelationId,
) -> Result<Json<FollowResponse>, ApiError> {
    let handle = Handle::new(handle);
    let changed = state.profiles.follow(&principal, &handle).await
        .map_err(|e| profile_error(e, &cid))?;
    Ok(Json(FollowResponse { handle, following: true, changed }))
}

/// Unfollow a workspace.
async fn unfollow_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(handle): Path<String>,
    principal: Principal,
    cid: CorrelationId,
) -> Result<Json<FollowResponse>, ApiError> {
    let handle = Handle::new(handle);
    let changed = state.profiles.unfollow(&principal, &handle).await
        .map_err(|e| profile_error(e, &cid))?;
    Ok(Json(FollowResponse { handle, following: false, changed }))
}

/// Update the caller's bio, pronouns or avatar.
async fn profile_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    principal: Principal,
    cid: CorrelationId,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Workspace>, ApiError> {
    state.profiles.update(&principal, update).await
        .map(Json)
        .map_err(|e| profile_error(e, &cid))
}

/// Health check endpoint (detailed).
async fn health_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let db_healthy = state.store.ping().await;

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_healthy,
        lookup_cache: state.reader.lookups().stats(),
        edit_policy: *state.editor.policy(),
    })
}

/// Liveness probe endpoint. Does not check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store is reachable, 503 otherwise.
async fn readiness_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    probe(&state, "Database connection failed", None).await
}

/// Startup probe endpoint.
async fn startup_handler<S: ModuleStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    probe(&state, "Database not yet available", Some("Service started successfully")).await
}

async fn probe<S: ModuleStore + 'static>(
    state: &ServiceState<S>,
    failure: &str,
    success: Option<&str>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store.ping().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: success.map(str::to_string),
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some(failure.to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the research modules service.
pub fn create_router<S: ModuleStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Modules
        .route("/api/modules/:key", get(module_handler::<S>).put(edit_handler::<S>))
        .route("/api/modules/:key/detail", get(detail_handler::<S>))
        .route("/api/modules/:key/authors", get(authors_handler::<S>))
        // Workspaces
        .route(
            "/api/workspaces/:handle/follow",
            post(follow_handler::<S>).delete(unfollow_handler::<S>),
        )
        .route("/api/workspace/profile", patch(profile_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .route("/health/startup", get(startup_handler::<S>))
        .with_state(state)
}
