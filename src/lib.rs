//! Retail admin API library
//!
//! Catalog, customer, sales and reporting backend for a small retail operation, plus a
//! typed client with a cached state store for dashboard front ends.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

/// Versioned API: public auth endpoints plus the session-guarded resources.
pub fn api_v1_routes() -> Router<AppState> {
    let protected = Router::new()
        .nest("/products", handlers::products::product_routes())
        .nest("/categories", handlers::categories::category_routes())
        .nest("/customers", handlers::customers::customer_routes())
        .nest("/sales", handlers::sales::sale_routes())
        .nest("/dashboard", handlers::dashboard::dashboard_routes())
        .nest("/analytics", handlers::analytics::analytics_routes())
        .nest("/history", handlers::history::history_routes())
        .with_auth();

    Router::new()
        .nest("/auth", auth::auth_routes())
        .merge(protected)
}

/// Full application router with tracing, auth injection and request ids applied.
///
/// CORS, compression and timeouts are left to the binary so tests can drive the router
/// directly.
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
