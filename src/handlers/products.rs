use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{
        created_response, no_content_response, success_response, PaginationParams, Paginated,
    },
    services::products::{CreateProductRequest, ProductListOptions, UpdateProductRequest},
    AppState,
};

/// Query string for the catalog listing. Kept flat so `serde_urlencoded` can parse the
/// numeric fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopSellingQuery {
    pub limit: Option<u64>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ServiceError> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (data, total) = state
        .services
        .products
        .list(ProductListOptions {
            page,
            limit,
            include_inactive: query.include_inactive,
        })
        .await?;
    Ok(success_response(Paginated::new(
        data,
        page,
        limit,
        total,
        "totalProducts",
    )))
}

async fn top_selling(
    State(state): State<AppState>,
    Query(query): Query<TopSellingQuery>,
) -> Result<Response, ServiceError> {
    let limit = query
        .limit
        .unwrap_or(state.config.top_sellers_limit)
        .clamp(1, state.config.api_max_page_size.max(1));
    Ok(success_response(
        state.services.products.top_selling(limit).await?,
    ))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.products.get(id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .products
        .create(payload, Some(user.user_id))
        .await?;
    Ok(created_response(created))
}

async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Response, ServiceError> {
    let updated = state
        .services
        .products
        .update(id, payload, Some(user.user_id))
        .await?;
    Ok(success_response(updated))
}

async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .products
        .deactivate(id, Some(user.user_id))
        .await?;
    Ok(no_content_response())
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/top-selling", get(top_selling))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}
