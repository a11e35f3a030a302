//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod admin;
mod api;
mod auth;
mod public;

use crate::auth::require_staff;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    let site = public_routes();
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication routes
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/me", get(auth::me))
        // Public REST API
        .route("/api/v1/government/", get(api::list_governments))
        .route("/api/v1/government/{id}/", get(api::get_government))
        .route("/api/v1/governmentplan/", get(api::list_plans))
        .route("/api/v1/governmentplan/{id}/", get(api::get_plan))
        .nest("/api/admin", admin_routes(state.clone()));

    let router = match settings.site.base_path.as_str() {
        "" | "/" => router.merge(site),
        base_path => router.nest(base_path, site),
    };

    // Apply middleware and state
    router.layer(middleware).with_state(state)
}

/// Pages of the public site, mounted under the configured base path
fn public_routes() -> Router<SharedState> {
    Router::new()
        .route("/search/", get(public::search))
        .route("/plans/", get(public::list_plans))
        .route("/updates/", get(public::list_updates))
        .route("/sections/", get(public::list_sections))
        .route("/{government}/plan/{plan}/", get(public::plan_detail))
        .route(
            "/{government}/plan/{plan}/propose-update/",
            post(public::propose_update),
        )
        .route("/{government}/{section}/", get(public::section_detail))
}

/// Editor routes, staff only
fn admin_routes(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route(
            "/governments",
            get(admin::list_governments).post(admin::create_government),
        )
        .route(
            "/governments/{id}",
            get(admin::get_government)
                .put(admin::update_government)
                .delete(admin::delete_government),
        )
        .route(
            "/sections",
            get(admin::list_sections).post(admin::create_section),
        )
        .route(
            "/sections/{id}",
            get(admin::get_section)
                .put(admin::update_section)
                .delete(admin::delete_section),
        )
        .route("/plans", get(admin::list_plans).post(admin::create_plan))
        .route(
            "/plans/{id}",
            get(admin::get_plan)
                .put(admin::update_plan)
                .delete(admin::delete_plan),
        )
        .route("/plans/{id}/proposals", get(admin::list_proposals))
        .route(
            "/plans/{id}/proposals/{user_id}/accept",
            post(admin::accept_proposal),
        )
        .route(
            "/plans/{id}/proposals/{user_id}/reject",
            post(admin::reject_proposal),
        )
        .route("/updates", get(admin::list_updates).post(admin::create_update))
        .route(
            "/updates/{id}",
            get(admin::get_update)
                .put(admin::update_update)
                .delete(admin::delete_update),
        )
        .layer(middleware::from_fn_with_state(state, require_staff))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
