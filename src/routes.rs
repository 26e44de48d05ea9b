// src/routes.rs

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{self, admin, auth, exam},
    state::AppState,
    utils::{
        cors::{cors_layer, origin_guard},
        jwt::{admin_middleware, auth_middleware},
    },
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, user, admin).
/// * Applies global middleware (Trace, CORS, origin allow-list).
/// * Injects global state (store and configuration).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/exams", get(exam::list_available_exams))
        .route("/exam/{id}/questions", get(exam::get_exam_questions))
        .route("/exam/submit", post(exam::submit_exam))
        .route("/my-results", get(exam::list_my_results))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/subjects", get(admin::list_subjects).post(admin::create_subject))
        .route("/subjects/{id}", put(admin::rename_subject))
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/exams", get(admin::list_exams).post(admin::create_exam))
        .route("/exams/{id}", put(admin::update_exam))
        // Double middleware protection: Auth first, then Admin check.
        // route_layer keeps unknown paths on the 404 fallback.
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/auth", auth_routes)
        .nest("/user", user_routes)
        .nest("/admin", admin_routes)
        .fallback(handlers::not_found)
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(state.clone(), origin_guard)),
        )
        .with_state(state)
}
