//! Shared application state and router setup.
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::auth::AuthClient;
use crate::gemini::GeminiClient;
use crate::ledger::SqliteLedger;

pub struct AppState {
    pub gemini: GeminiClient,
    pub ledger: SqliteLedger,
    pub verifier: AuthClient,
}

/// Build the HTTP router. The permissive CORS layer answers OPTIONS
/// preflights on every route; the body limit is raised because uploads
/// arrive as base64-encoded photos.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/generate-hairstyle", post(handlers::generate_hairstyle))
        .route("/detect-face-shape", post(handlers::detect_face_shape))
        .route("/suggest-hairstyles", post(handlers::suggest_hairstyles))
        .route("/credits", get(handlers::get_credits))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
