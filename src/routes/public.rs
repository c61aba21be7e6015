use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Defines the endpoints that are **unauthenticated** and accessible to any
/// client. Everything except character creation and artwork upload lives
/// here; those two require the ADMIN role and sit in the admin router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load
        // balancer checks. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET /characters
        // Lists every character with the total count. No pagination.
        .route("/characters", get(handlers::list_characters))
        // GET /characters/{uri}
        // Retrieves one character by its `{id}-{meaning}` slug, shaped by type
        // (kanji detail vs component detail).
        //
        // PUT /characters/{id}: partial update (collections replace-all).
        // DELETE /characters/{id}: removes the character and all dependent rows.
        // Both take the bare numeric id in the same path position as the slug.
        .route(
            "/characters/{uri}",
            get(handlers::get_character)
                .put(handlers::update_character)
                .delete(handlers::delete_character),
        )
}
