use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{Level, Span};

const REQUEST_ID_HEADER: &str = "x-request-id";

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod gravatar;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod validation;

pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me,
        handlers::create_post, handlers::list_posts, handlers::get_post, handlers::delete_post,
        handlers::like_post, handlers::unlike_post, handlers::add_comment, handlers::delete_comment
    ),
    components(
        schemas(
            models::Post, models::Like, models::Likes, models::Comment, models::Comments,
            models::RegisterUserRequest, models::LoginRequest, models::CreatePostRequest,
            models::CreateCommentRequest, models::TokenResponse, models::UserProfile,
            models::MessageResponse, error::FieldError, error::ValidationErrorResponse,
        )
    ),
    tags(
        (name = "postboard", description = "Posts, likes and comments API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state handed to every request: the store and the configuration.
#[derive(Clone)]
pub struct AppState {
    /// User directory and post store.
    pub repo: RepositoryState,
    /// Loaded configuration (token secret and lifetime among others).
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// The authorization guard for `authenticated_routes`. Extracting `AuthUser` verifies the
/// token; on failure the extractor's `ApiError` rejection becomes the 401 response and
/// the handler is never invoked.
async fn auth_middleware(_caller: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routes, the authorization guard, the observability layers and the
/// shared state.
pub fn create_router(state: AppState) -> Router {
    let guard = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let api = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes().route_layer(guard));

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::health_routes())
        .nest("/api", api)
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    with_request_tracing(router).layer(cors)
}

/// Tags every request with an `x-request-id` (kept if the client sent one), opens a span
/// carrying it, and echoes the id on the response.
fn with_request_tracing(router: Router) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let on_response = DefaultOnResponse::new()
        .level(Level::INFO)
        .latency_unit(LatencyUnit::Millis);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(request_span)
                    .on_response(on_response),
            )
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}

fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let req_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        %req_id,
    )
}
