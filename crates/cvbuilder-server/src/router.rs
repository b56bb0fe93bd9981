use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::error::expose_internal_errors;
use crate::handlers::{self, auth, cvs, payments, pdf, share, templates, users};
use crate::middleware::require_auth;
use crate::rate_limit::rate_limit;
use crate::state::AppState;

/// Assemble the HTTP surface.
///
/// Public: `/health`, `/api/auth/*`, `/api/templates/*`, `/api/share/:token`
/// and the payment webhook. Everything else under `/api` needs an access
/// token. The whole `/api` tree is rate limited per client IP.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/me", get(users::get_me).put(users::update_me))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let cv_routes = Router::new()
        .route("/", get(cvs::list).post(cvs::create))
        .route("/:id", get(cvs::get_one).put(cvs::update).delete(cvs::delete))
        .route("/:id/autosave", patch(cvs::autosave))
        .route("/:id/duplicate", post(cvs::duplicate))
        .route("/:id/share", post(share::create))
        .route("/:id/email", post(share::email))
        .route("/:id/generate-pdf", post(pdf::generate))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let pdf_routes = Router::new()
        .route("/:id", get(pdf::job_status))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let template_routes = Router::new()
        .route("/", get(templates::list))
        .route("/:id", get(templates::get_one));

    // route_layer only covers routes registered before it; the webhook stays public.
    let payment_routes = Router::new()
        .route("/history", get(payments::history))
        .route("/create-intent", post(payments::create_intent))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route("/webhook", post(payments::webhook));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/cvs", cv_routes)
        .nest("/pdf-jobs", pdf_routes)
        .nest("/templates", template_routes)
        .nest("/payments", payment_routes)
        .route("/share/:token", get(share::resolve))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http());

    if !state.config.environment.is_production() {
        app = app.layer(from_fn(expose_internal_errors));
    }

    if let Some(origin) = state.config.cors_origin.as_deref() {
        match HeaderValue::from_str(origin) {
            Ok(origin) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_credentials(true)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                );
            }
            Err(_) => warn!(origin, "Ignoring unparseable CORS_ORIGIN"),
        }
    }

    app.with_state(state)
}
