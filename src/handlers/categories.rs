use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, success_response, PaginationParams, Paginated},
    services::categories::{CreateCategoryRequest, ReorderCategoriesRequest, UpdateCategoryRequest},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DeleteCategoryParams {
    #[serde(default)]
    pub force: bool,
}

async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, limit) = params.resolve(&state.config);
    let (data, total) = state.services.categories.list(page, limit).await?;
    Ok(success_response(Paginated::new(
        data,
        page,
        limit,
        total,
        "totalCategories",
    )))
}

async fn category_tree(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.categories.tree().await?))
}

async fn parent_categories(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.categories.roots().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.categories.get(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .categories
        .create(payload, Some(user.user_id))
        .await?;
    Ok(created_response(created))
}

async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Response, ServiceError> {
    let updated = state
        .services
        .categories
        .update(id, payload, Some(user.user_id))
        .await?;
    Ok(success_response(updated))
}

async fn reorder_categories(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReorderCategoriesRequest>,
) -> Result<Response, ServiceError> {
    let reordered = state
        .services
        .categories
        .reorder(payload, Some(user.user_id))
        .await?;
    Ok(success_response(reordered))
}

async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteCategoryParams>,
) -> Result<Response, ServiceError> {
    let deleted = state
        .services
        .categories
        .delete(id, params.force, Some(user.user_id))
        .await?;
    Ok(success_response(serde_json::json!({ "deletedIds": deleted })))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/tree", get(category_tree))
        .route("/parent", get(parent_categories))
        .route("/reorder", patch(reorder_categories))
        .route(
            "/:id",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
}
