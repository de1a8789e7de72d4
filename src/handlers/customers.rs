use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{
        created_response, no_content_response, success_response, PaginationParams, Paginated,
    },
    services::customers::{CreateCustomerRequest, UpdateCustomerRequest},
    AppState,
};

async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (data, total) = state.services.customers.list(page, limit).await?;
    Ok(success_response(Paginated::new(
        data,
        page,
        limit,
        total,
        "totalCustomers",
    )))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.customers.get(id).await?))
}

async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .customers
        .create(payload, Some(user.user_id))
        .await?;
    Ok(created_response(created))
}

async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Response, ServiceError> {
    let updated = state
        .services
        .customers
        .update(id, payload, Some(user.user_id))
        .await?;
    Ok(success_response(updated))
}

async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .customers
        .delete(id, Some(user.user_id))
        .await?;
    Ok(no_content_response())
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer)
                .patch(update_customer)
                .delete(delete_customer),
        )
}
