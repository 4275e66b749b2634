use axum::{
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    models::ApiResponse,
};

pub mod auth;
pub mod extract;
pub mod movies;
pub mod state;
pub mod watchlist;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/google-login", post(auth::google_login))
        .route(
            "/auth/profile",
            get(auth::get_profile).patch(auth::update_profile),
        )
        // Catalog
        .route("/movies", get(movies::list_movies))
        .route("/movies/genres", get(movies::list_genres))
        .route("/movies/popular", get(movies::popular_movies))
        .route("/movies/search", get(movies::search_movies))
        .route("/movies/recommendations", get(movies::personalized_recommendations))
        .route("/movies/recommendations/ai", get(movies::ai_recommendations))
        .route("/movies/:id", get(movies::get_movie))
        .route("/movies/:id/similar", get(movies::similar_movies))
        // Watchlist
        .route("/watchlist", get(watchlist::list).post(watchlist::add))
        .route("/watchlist/stats", get(watchlist::stats))
        .route("/watchlist/status/:status", get(watchlist::by_status))
        .route("/watchlist/check/:movie_id", get(watchlist::check))
        .route(
            "/watchlist/:id",
            patch(watchlist::update).delete(watchlist::remove),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn welcome() -> &'static str {
    "Welcome to the Movie Recommendation API!"
}

async fn route_not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("Route not found")),
    )
}
