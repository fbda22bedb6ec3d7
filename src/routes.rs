// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, content, quiz, reports, weeks},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, weeks, quiz, staff, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (pool, config, quiz generator).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Credential endpoints are the brute-force surface.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .finish()
            .expect("governor config is valid"),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let portal_routes = Router::new()
        .route("/me", get(reports::get_me))
        .route("/weeks", get(weeks::list_weeks))
        .route("/weeks/{id}/checkpoint", get(quiz::get_checkpoint_quiz))
        .route("/files/{id}/quiz", get(quiz::get_file_quiz))
        .route("/files/{id}/view", post(content::mark_viewed))
        .route("/quiz/{id}/submit", post(quiz::submit_attempt))
        .route("/quiz/{id}/regenerate", post(quiz::regenerate))
        .route("/quiz/{id}/attempts", get(quiz::attempt_history))
        .route("/report-card", get(reports::get_report_card))
        .route("/certificates", get(reports::my_certificates))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let staff_routes = Router::new()
        .route(
            "/batches/{id}/report-cards",
            get(reports::batch_report_cards),
        )
        .route(
            "/batches/{id}/certificates",
            get(reports::batch_certificates),
        )
        .route("/certificates", post(reports::issue_certificate))
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/batches",
            get(admin::list_batches).post(admin::create_batch),
        )
        .route(
            "/batches/{id}",
            put(admin::update_batch).delete(admin::delete_batch),
        )
        .route("/weeks", post(weeks::create_week))
        .route(
            "/weeks/{id}",
            put(weeks::rename_week).delete(weeks::delete_week),
        )
        .route("/weeks/reorder", post(weeks::reorder_weeks))
        .route("/weeks/{id}/files", post(content::upload_file))
        .route("/files/{id}", delete(content::delete_file))
        .route("/progress/grant", post(content::grant_progress))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/staff", staff_routes)
        .nest("/admin", admin_routes)
        .merge(portal_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
