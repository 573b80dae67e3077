use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session token. Mounted under `/api`, except `/health`
/// which `create_router` adds at the root.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/users
        // Registration. Returns a token for the new account.
        .route("/users", post(handlers::register_user))
        // POST /api/auth, GET /api/auth
        // Login is public. The GET reads the caller's own profile and is guarded by the
        // `AuthUser` argument of `get_me` rather than the route layer, so both methods
        // can share one path.
        .route("/auth", post(handlers::login).get(handlers::get_me))
}

/// GET /health
/// Liveness probe for load balancers and container orchestration.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(|| async { "ok" }))
}
