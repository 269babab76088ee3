use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod repository;
pub mod storage;
pub mod validation;

// Routing is split by access level (public / authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use identity::{IdentityState, MockIdentityProvider, SupabaseIdentityProvider};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// Prefix every resource route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::posts::list_posts, handlers::posts::get_post, handlers::posts::create_post,
        handlers::posts::update_post, handlers::posts::delete_post,
        handlers::comments::list_comments, handlers::comments::get_comment,
        handlers::comments::create_comment, handlers::comments::update_comment,
        handlers::comments::delete_comment,
        handlers::groups::list_groups, handlers::groups::get_group,
        handlers::follows::list_follows, handlers::follows::create_follow,
        handlers::users::register_user, handlers::users::get_me,
        handlers::uploads::get_presigned_url
    ),
    components(
        schemas(
            models::Post, models::PostPayload, models::Comment, models::CommentPayload,
            models::Group, models::Follow, models::FollowPayload, models::UserProfile,
            models::RegisterUserRequest, models::PresignedUrlRequest, models::PresignedUrlResponse,
        )
    ),
    tags(
        (name = "yatube", description = "Yatube blog API: posts, groups, comments and follows")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Single shared container for every service a handler may need. Cloned per
/// request; all members are cheap `Arc` handles or plain config.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployment, in-memory in tests and bare local runs.
    pub repo: RepositoryState,
    /// Attachment store used to presign image uploads.
    pub storage: StorageState,
    /// External account system backing `POST /register`.
    pub identity: IdentityState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated router. Extracting `AuthUser` is the whole check:
/// a missing or invalid credential rejects with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// api_routes
///
/// The versioned resource API. Public and authenticated routers share paths
/// (e.g. `GET /posts` vs `POST /posts`); `route_layer` keeps the auth guard on
/// the authenticated methods only.
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new().merge(public::public_routes()).merge(
        authenticated::authenticated_routes()
            .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
    )
}

/// create_router
///
/// Assembles routing, documentation, state and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Liveness probe, kept outside the versioned prefix.
        .route("/health", get(|| async { "ok" }))
        .nest(API_PREFIX, api_routes(state.clone()))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries the
/// same `req_id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
