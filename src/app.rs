use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::middleware::{self, auth::authenticate, auth::require_admin};
use crate::routes;
use crate::state::AppState;

/// Builds the full HTTP application: routes, auth layers and the global middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();
    let auth = from_fn_with_state(state.clone(), authenticate);
    let admin = ServiceBuilder::new()
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn(require_admin));

    let public = Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .route("/metrics/prometheus", get(routes::health::metrics_prometheus))
        .route("/version", get(routes::health::version))
        .route("/api/auth/signup", post(routes::auth::signup))
        .route("/api/auth/login", post(routes::auth::login))
        .route(
            "/api/books",
            get(routes::books::list_books).post(routes::books::add_book.layer(admin.clone())),
        )
        .route("/api/books/search", get(routes::books::search_books))
        .route("/api/books/top-rated", get(routes::books::top_rated))
        .route("/api/books/ratings", get(routes::reviews::list_books_with_ratings))
        .route(
            "/api/books/{id}",
            get(routes::books::get_book).delete(routes::books::delete_book.layer(admin.clone())),
        )
        .route(
            "/api/books/{id}/reviews",
            get(routes::reviews::get_book_reviews).post(routes::reviews::post_review.layer(auth.clone())),
        );

    let signed_in = Router::new()
        .route("/api/users/me", get(routes::users::me))
        .route(
            "/api/reading-lists",
            get(routes::reading_lists::list_reading_lists).post(routes::reading_lists::create_reading_list),
        )
        .route(
            "/api/reading-lists/{id}",
            get(routes::reading_lists::get_reading_list)
                .put(routes::reading_lists::update_reading_list)
                .delete(routes::reading_lists::delete_reading_list),
        )
        .route(
            "/api/reading-lists/{id}/books/{book_id}",
            post(routes::reading_lists::add_book).delete(routes::reading_lists::remove_book),
        )
        .route_layer(auth);

    let moderation = Router::new()
        .route("/api/admin/reviews", get(routes::admin::list_reviews))
        .route("/api/admin/reviews/{id}", delete(routes::admin::delete_review))
        .route_layer(admin);

    let app = public
        .merge(signed_in)
        .merge(moderation)
        .fallback(route_not_found)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(from_fn_with_state(state, middleware::rate_limit::rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg.clone(), middleware::security_headers::security_headers_middleware));

    app.layer(middleware::cors::cors_layer(&cfg))
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
