use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod storage;

use auth::AuthUser;
use routes::{admin, public};

// Re-exported so main.rs and the integration tests assemble the app from the
// crate root.
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockArtworkStore, S3ArtworkStore, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handler annotations
/// and the `ToSchema` derives on the wire models. Served as JSON at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_character, handlers::list_characters, handlers::create_character,
        handlers::update_character, handlers::delete_character, handlers::get_upload_url
    ),
    components(
        schemas(
            models::Character, models::CharacterType, models::Kanji, models::Component,
            models::Translation, models::Example, models::KanjiComponentLink,
            models::CharacterDetails, models::KanjiPart,
            models::CharacterList, models::CreateCharacterRequest,
            models::UpdateCharacterRequest, models::TranslationEntry,
            models::AssociationId, models::AssociationIds,
            models::CreatedCharacterResponse, models::MessageResponse,
            models::UploadUrlRequest, models::UploadUrlResponse,
        )
    ),
    tags(
        (name = "kanji-atlas", description = "Kanji & component dictionary API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Immutable bundle of the services every request may need, cloned cheaply
/// into each handler. Both service fields are trait objects, so tests swap in
/// mocks without a different router.
#[derive(Clone)]
pub struct AppState {
    /// Persistence seam (Postgres in the running app).
    pub repo: RepositoryState,
    /// Object-storage seam for character artwork.
    pub storage: StorageState,
    pub config: AppConfig,
}

// FromRef lets extractors pull just the piece of state they need: the
// AuthUser extractor takes the repository and the config, never the whole
// AppState.

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

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// Gate in front of the admin routes. Extracting [`AuthUser`] is the whole
/// check: a request that fails JWT validation (or the users-table lookup) is
/// rejected with a structured 401 before the handler runs. The ADMIN role
/// itself is verified inside the handlers, which also need the identity.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Builds the complete application router: swagger, the public and admin
/// route sets, and the outer observability layers.
pub fn create_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Only the admin routes carry the auth layer. POST /characters merges
        // with the public GET on the same path; the layer wraps the POST alone.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    // Outermost layers: stamp every request with an id, trace it under that
    // id, hand the id back to the client, and answer CORS preflights.
    api.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                request_id_header.clone(),
                MakeRequestUuid,
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(make_request_span)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(request_id_header)),
    )
    .layer(
        CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any),
    )
}

/// Span constructor for the trace layer: method, URI and the request id the
/// SetRequestId layer just stamped, so every log line of one request shares a
/// correlation key.
fn make_request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
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
