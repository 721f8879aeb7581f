use crate::handlers;
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_origin([
            HeaderValue::from_static("http://localhost:8081"),
            HeaderValue::from_static("http://localhost:19006"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::COOKIE,
            axum::http::HeaderName::from_static("x-request-id"),
        ]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/auth/signup", post(handlers::signup))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/me", get(handlers::me))
        .route("/api/v1/account", delete(handlers::delete_account))
        .route("/api/v1/quiz", get(handlers::quiz_view))
        .route("/api/v1/quiz/catalog", get(handlers::catalog))
        .route("/api/v1/quiz/answers/:id", put(handlers::put_answer))
        .route("/api/v1/quiz/next", post(handlers::next))
        .route("/api/v1/quiz/previous", post(handlers::previous))
        .route("/api/v1/quiz/goto/:index", post(handlers::go_to))
        .route("/api/v1/quiz/finish", post(handlers::finish))
        .route("/api/v1/quiz/restart", post(handlers::restart))
        .route("/api/v1/quiz/result", get(handlers::result))
        .route("/api/v1/profile", get(handlers::profile))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
