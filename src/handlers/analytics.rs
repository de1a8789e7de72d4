use axum::{extract::State, response::Response, routing::get, Router};
use tracing::debug;

use crate::{
    errors::ServiceError, handlers::common::success_response,
    services::analytics::calculate_analytics, AppState,
};

async fn sales_analytics(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let records = state.services.sales.records().await?;
    debug!(sales = records.len(), "Computing sales analytics");
    Ok(success_response(calculate_analytics(&records)))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/", get(sales_analytics))
}
