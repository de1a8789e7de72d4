use axum::{extract::State, response::Response, routing::get, Router};

use crate::{errors::ServiceError, handlers::common::success_response, AppState};

async fn inventory_stats(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(
        state.services.dashboard.inventory_stats().await?,
    ))
}

async fn dashboard_products(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.products.active().await?))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory-stats", get(inventory_stats))
        .route("/products", get(dashboard_products))
}
