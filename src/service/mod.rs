//! Research Modules REST Service
//!
//! ## Endpoints
//!
//! - `GET /api/modules/:suffix` - Module with its authors
//! - `GET /api/modules/:suffix/detail` - Module with references and lineage
//! - `GET /api/modules/:suffix/authors` - Author panel with follow actions
//! - `PUT /api/modules/:key` - Edit a module by id or suffix (clears author approvals)
//! - `POST /api/workspaces/:handle/follow` - Follow a workspace
//! - `DELETE /api/workspaces/:handle/follow` - Unfollow a workspace
//! - `PATCH /api/workspace/profile` - Update bio, pronouns, avatar
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health/startup` - Startup probe
//!
//! Mutating endpoints require the `X-Workspace-Id` header.

pub mod auth;
pub mod middleware;
pub mod routes;
pub mod state;

pub use auth::WORKSPACE_HEADER;
pub use middleware::{metrics_middleware, record_edit};
pub use routes::{create_router, AppState, ErrorResponse};
pub use state::ServiceState;
