use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to authenticated users with the
/// 'ADMIN' role: creating characters (with their translations, examples and
/// component links) and requesting artwork upload URLs.
///
/// Access Control:
/// This router is wrapped in the authentication `route_layer` in `create_router`,
/// and the handlers themselves verify `role == "ADMIN"` before doing any work.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /characters
        // Creates a character plus its typed extension and related rows in one
        // transaction. 201 with the new id and slug.
        .route("/characters", post(handlers::create_character))
        // POST /uploads/presigned
        // Generates a short-lived presigned URL for direct artwork upload
        // (image content types only).
        .route("/uploads/presigned", post(handlers::get_upload_url))
}
