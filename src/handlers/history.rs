use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{errors::ServiceError, handlers::common::success_response, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

async fn recent_activity(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ServiceError> {
    let limit = query
        .limit
        .unwrap_or(state.config.history_limit)
        .clamp(1, state.config.api_max_page_size.max(1));
    Ok(success_response(state.services.audit.recent(limit).await?))
}

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/", get(recent_activity))
}
