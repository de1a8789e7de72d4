use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        category,
        product::{self, Gender, ImageList, ProductOptions},
        sale::{self, SaleStatus},
        sale_item,
    },
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry, AuditService},
};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price");
        err.message = Some("Price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    pub category_id: Uuid,
    #[serde(default)]
    pub options: ProductOptions,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub brand: Option<String>,
    pub gender: Option<Gender>,
    pub category_id: Option<Uuid>,
    pub options: Option<ProductOptions>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: product::Model,
    pub category: Option<CategoryRef>,
}

impl From<(product::Model, Option<category::Model>)> for ProductResponse {
    fn from((product, category): (product::Model, Option<category::Model>)) -> Self {
        Self {
            product,
            category: category.map(|c| CategoryRef {
                id: c.id,
                name: c.name,
            }),
        }
    }
}

/// A product ranked by units sold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSeller {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub images: ImageList,
    pub total_sold: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductListOptions {
    pub page: u64,
    pub limit: u64,
    pub include_inactive: bool,
}

#[derive(Debug, Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        category::Entity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }

    /// Paginated catalog, newest first. Inactive products only when asked for.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        options: ProductListOptions,
    ) -> Result<(Vec<ProductResponse>, u64), ServiceError> {
        let mut query = product::Entity::find();
        if !options.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Name)
            .find_also_related(category::Entity)
            .paginate(&*self.db, options.limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(options.page.saturating_sub(1)).await?;
        Ok((rows.into_iter().map(ProductResponse::from).collect(), total))
    }

    /// Active products for dashboard widgets, unpaginated.
    pub async fn active(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let rows = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Name)
            .find_also_related(category::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(ProductResponse::from).collect())
    }

    /// Reads a product whether or not it is active.
    pub async fn get(&self, id: Uuid) -> Result<ProductResponse, ServiceError> {
        product::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .map(ProductResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateProductRequest,
        actor: Option<Uuid>,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        self.ensure_category(request.category_id).await?;

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            stock: Set(request.stock),
            brand: Set(request.brand.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())),
            gender: Set(request.gender),
            category_id: Set(request.category_id),
            options: Set(request.options.normalized()),
            images: Set(ImageList(request.images)),
            is_active: Set(request.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, "Product created");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::CreateProduct,
                    format!("Created product {}", created.name),
                )
                .by(actor)
                .with_metadata(json!({ "productId": created.id })),
            )
            .await;

        self.get(created.id).await
    }

    #[instrument(skip(self, request), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
        actor: Option<Uuid>,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        if let Some(category_id) = request.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(stock) = request.stock {
            active.stock = Set(stock);
        }
        if let Some(brand) = request.brand {
            let brand = brand.trim().to_string();
            active.brand = Set(if brand.is_empty() { None } else { Some(brand) });
        }
        if let Some(gender) = request.gender {
            active.gender = Set(Some(gender));
        }
        if let Some(category_id) = request.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(options) = request.options {
            active.options = Set(options.normalized());
        }
        if let Some(images) = request.images {
            active.images = Set(ImageList(images));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        let updated = active.update(&*self.db).await?;

        info!(product_id = %id, "Product updated");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::UpdateProduct,
                    format!("Updated product {}", updated.name),
                )
                .by(actor)
                .with_metadata(json!({ "productId": id })),
            )
            .await;

        self.get(id).await
    }

    /// Soft delete: the row stays so historical sale lines keep their product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn deactivate(&self, id: Uuid, actor: Option<Uuid>) -> Result<(), ServiceError> {
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        let name = existing.name.clone();

        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.update(&*self.db).await?;

        info!(product_id = %id, "Product deactivated");
        self.audit
            .record(
                AuditEntry::new(AuditAction::DeleteProduct, format!("Deleted product {}", name))
                    .by(actor)
                    .with_metadata(json!({ "productId": id })),
            )
            .await;
        Ok(())
    }

    /// Products ranked by units sold on sales that were not cancelled.
    #[instrument(skip(self))]
    pub async fn top_selling(&self, limit: u64) -> Result<Vec<BestSeller>, ServiceError> {
        let totals: Vec<(Uuid, Option<i64>)> = sale_item::Entity::find()
            .select_only()
            .column(sale_item::Column::ProductId)
            .column_as(
                Expr::col((sale_item::Entity, sale_item::Column::Quantity)).sum(),
                "total_sold",
            )
            .join(JoinType::InnerJoin, sale_item::Relation::Sale.def())
            .filter(sale::Column::Status.ne(SaleStatus::Cancelled))
            .group_by(sale_item::Column::ProductId)
            .order_by_desc(Expr::col((sale_item::Entity, sale_item::Column::Quantity)).sum())
            .limit(limit)
            .into_tuple()
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = totals.iter().map(|(id, _)| *id).collect();
        let mut products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut ranked: Vec<BestSeller> = totals
            .into_iter()
            .filter_map(|(id, sold)| {
                products.remove(&id).map(|p| BestSeller {
                    id,
                    name: p.name,
                    price: p.price,
                    images: p.images,
                    total_sold: sold.unwrap_or(0),
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.total_sold.cmp(&a.total_sold).then_with(|| a.name.cmp(&b.name)));
        Ok(ranked)
    }
}
