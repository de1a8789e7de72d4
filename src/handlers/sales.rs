use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, success_response, PaginationParams, Paginated},
    services::sales::{CheckoutRequest, CreateSaleRequest, UpdateSaleRequest},
    AppState,
};

async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (data, total) = state.services.sales.list(page, limit).await?;
    Ok(success_response(Paginated::new(
        data,
        page,
        limit,
        total,
        "totalSales",
    )))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.sales.get(id).await?))
}

async fn create_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<Response, ServiceError> {
    let sale = state
        .services
        .sales
        .create_sale(payload, Some(user.user_id))
        .await?;
    Ok(created_response(sale))
}

async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let sale = state
        .services
        .sales
        .checkout(&user.name, &user.email, payload, Some(user.user_id))
        .await?;
    Ok(created_response(sale))
}

async fn update_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSaleRequest>,
) -> Result<Response, ServiceError> {
    let sale = state
        .services
        .sales
        .update_status(id, payload, Some(user.user_id))
        .await?;
    Ok(success_response(sale))
}

pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_sale).patch(update_sale))
}
