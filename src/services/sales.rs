//! Sale orders: creation with stock decrement, checkout for the logged-in user, and the
//! status lifecycle.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        category, customer, product,
        sale::{self, PaymentStatus, SaleStatus},
        sale_item,
    },
    errors::ServiceError,
    services::{
        analytics::{ProductSnapshot, SaleRecord, SaleRecordItem},
        audit::{AuditAction, AuditEntry, AuditService},
        customers::find_or_create_by_email,
        order_number::next_order_number,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub customer_id: Uuid,
    #[serde(default)]
    pub items: Vec<SaleLineRequest>,
    #[validate(length(min = 1, max = 50, message = "Payment method is required"))]
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Order placed by the logged-in user for themselves.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<SaleLineRequest>,
    #[validate(length(min = 1, max = 50, message = "Payment method is required"))]
    pub payment_method: String,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    pub status: SaleStatus,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleItemProduct {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemResponse {
    pub id: Uuid,
    pub line_number: i32,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
    pub product: SaleItemProduct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: SaleStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub tracking_id: Option<String>,
    pub note: Option<String>,
    pub shipping_address: Option<String>,
    pub total: Decimal,
    pub customer_id: Uuid,
    pub customer: Option<SaleCustomer>,
    pub items: Vec<SaleItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleResponse {
    fn build(
        sale: sale::Model,
        customer: Option<&customer::Model>,
        items: Vec<sale_item::Model>,
    ) -> Self {
        Self {
            id: sale.id,
            order_number: sale.order_number,
            status: sale.status,
            payment_status: sale.payment_status,
            payment_method: sale.payment_method,
            tracking_id: sale.tracking_id,
            note: sale.note,
            shipping_address: sale.shipping_address,
            total: sale.total,
            customer_id: sale.customer_id,
            customer: customer.map(|c| SaleCustomer {
                id: c.id,
                name: c.name.clone(),
                email: c.email.clone(),
            }),
            items: items
                .into_iter()
                .map(|item| SaleItemResponse {
                    id: item.id,
                    line_number: item.line_number,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.unit_price,
                    line_total: item.line_total,
                    product: SaleItemProduct {
                        id: item.product_id,
                        name: item.product_name,
                        brand: item.product_brand,
                        category: item.category_name,
                    },
                })
                .collect(),
            created_at: sale.created_at,
            updated_at: sale.updated_at,
        }
    }
}

fn to_record(sale: &sale::Model, items: &[sale_item::Model]) -> SaleRecord {
    SaleRecord {
        created_at: sale.created_at,
        items: items
            .iter()
            .map(|item| SaleRecordItem {
                price: item.unit_price,
                quantity: Decimal::from(item.quantity),
                product: ProductSnapshot {
                    name: Some(item.product_name.clone()),
                    brand: item.product_brand.clone(),
                    category: item.category_name.clone(),
                },
            })
            .collect(),
    }
}

/// Sums quantities of repeated products, keeping first-seen order.
fn merge_lines(lines: &[SaleLineRequest]) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".to_string()));
    }

    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Quantity for product {} is too large",
                        line.product_id
                    ))
                })?;
            }
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    Ok(merged)
}

fn insufficient_stock(name: &str, requested: i32, available: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "{}: requested {}, available {}",
        name, requested, available
    ))
}

/// Takes `quantity` units from the product's stock only while enough remain.
///
/// The guard lives in the `UPDATE` itself, so a pre-check made on a stale read cannot
/// drive stock below zero: zero affected rows means another order got there first.
pub(crate) async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;
    if result.rows_affected != 1 {
        let available = product::Entity::find_by_id(product.id)
            .one(conn)
            .await?
            .map(|p| p.stock)
            .unwrap_or(0);
        return Err(insufficient_stock(&product.name, quantity, available));
    }
    Ok(())
}

type CreatedSale = (sale::Model, customer::Model, Vec<sale_item::Model>);

struct NewSale {
    customer_id: Uuid,
    payment_method: String,
    payment_status: PaymentStatus,
    shipping_address: Option<String>,
    note: Option<String>,
}

/// Validates stock, decrements it and writes the sale with its lines. Must run inside a
/// transaction: any error leaves stock and sales untouched once the caller rolls back.
async fn place_order<C: ConnectionTrait>(
    conn: &C,
    order: NewSale,
    lines: &[SaleLineRequest],
) -> Result<(sale::Model, Vec<sale_item::Model>), ServiceError> {
    let lines = merge_lines(lines)?;
    let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();

    let products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut resolved = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = products
            .get(product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        if product.stock < *quantity {
            return Err(insufficient_stock(&product.name, *quantity, product.stock));
        }
        resolved.push((product, *quantity));
    }

    let category_ids: Vec<Uuid> = resolved.iter().map(|(p, _)| p.category_id).collect();
    let category_names: HashMap<Uuid, String> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    for (product, quantity) in &resolved {
        decrement_stock(conn, product, *quantity).await?;
    }

    let now = Utc::now();
    let sale_id = Uuid::new_v4();
    let order_number = next_order_number(conn, now).await?;
    let total: Decimal = resolved
        .iter()
        .map(|(p, quantity)| p.price * Decimal::from(*quantity))
        .sum();

    let sale = sale::ActiveModel {
        id: Set(sale_id),
        order_number: Set(order_number.clone()),
        customer_id: Set(order.customer_id),
        status: Set(SaleStatus::Pending),
        payment_status: Set(order.payment_status),
        payment_method: Set(order.payment_method),
        tracking_id: Set(None),
        note: Set(order.note),
        shipping_address: Set(order.shipping_address),
        total: Set(total),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| ServiceError::from_write(e, format!("Order number {} already used", order_number)))?;

    let mut items = Vec::with_capacity(resolved.len());
    for (index, (product, quantity)) in resolved.into_iter().enumerate() {
        let item = sale_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale_id),
            product_id: Set(product.id),
            line_number: Set(index as i32 + 1),
            product_name: Set(product.name.clone()),
            product_brand: Set(product.brand.clone()),
            category_name: Set(category_names.get(&product.category_id).cloned()),
            unit_price: Set(product.price),
            quantity: Set(quantity),
            line_total: Set(product.price * Decimal::from(quantity)),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
        items.push(item);
    }

    Ok((sale, items))
}

#[derive(Debug, Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
    strict_transitions: bool,
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>, strict_transitions: bool) -> Self {
        Self {
            db,
            audit,
            strict_transitions,
        }
    }

    /// Creates a sale for an existing customer.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, lines = request.items.len()))]
    pub async fn create_sale(
        &self,
        request: CreateSaleRequest,
        actor: Option<Uuid>,
    ) -> Result<SaleResponse, ServiceError> {
        request.validate()?;
        let result = self.create_sale_inner(request).await;
        self.finish_creation(result, actor).await
    }

    async fn create_sale_inner(
        &self,
        request: CreateSaleRequest,
    ) -> Result<CreatedSale, ServiceError> {
        let txn = self.db.begin().await?;

        let customer = customer::Entity::find_by_id(request.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", request.customer_id))
            })?;

        let order = NewSale {
            customer_id: customer.id,
            payment_method: request.payment_method.trim().to_string(),
            payment_status: request.payment_status.unwrap_or(PaymentStatus::Pending),
            shipping_address: request.shipping_address,
            note: request.note,
        };
        let (sale, items) = place_order(&txn, order, &request.items).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit sale creation transaction");
            counter!("retail_db.transaction_failures", 1);
            ServiceError::DatabaseError(e)
        })?;
        Ok((sale, customer, items))
    }

    /// Creates a sale on behalf of the logged-in user. The customer record matching the
    /// user's email is created in the same transaction when it does not exist yet.
    #[instrument(skip(self, request), fields(email = %email, lines = request.items.len()))]
    pub async fn checkout(
        &self,
        name: &str,
        email: &str,
        request: CheckoutRequest,
        actor: Option<Uuid>,
    ) -> Result<SaleResponse, ServiceError> {
        request.validate()?;
        let result = self.checkout_inner(name, email, request).await;
        self.finish_creation(result, actor).await
    }

    async fn checkout_inner(
        &self,
        name: &str,
        email: &str,
        request: CheckoutRequest,
    ) -> Result<CreatedSale, ServiceError> {
        let txn = self.db.begin().await?;
        let customer = find_or_create_by_email(&txn, name, email).await?;
        let order = NewSale {
            customer_id: customer.id,
            payment_method: request.payment_method.trim().to_string(),
            payment_status: PaymentStatus::Pending,
            shipping_address: request.shipping_address,
            note: request.note,
        };
        let (sale, items) = place_order(&txn, order, &request.items).await?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit checkout transaction");
            counter!("retail_db.transaction_failures", 1);
            ServiceError::DatabaseError(e)
        })?;
        Ok((sale, customer, items))
    }

    async fn finish_creation(
        &self,
        result: Result<CreatedSale, ServiceError>,
        actor: Option<Uuid>,
    ) -> Result<SaleResponse, ServiceError> {
        let (sale, customer, items) = match result {
            Ok(created) => created,
            Err(e) => {
                counter!("retail_sales.failed", 1);
                warn!(error = %e, "Sale creation rejected");
                return Err(e);
            }
        };

        counter!("retail_sales.created", 1);
        info!(
            sale_id = %sale.id,
            order_number = %sale.order_number,
            total = %sale.total,
            "Sale created"
        );

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::CreateSale,
                    format!("Created sale {} for {}", sale.order_number, customer.email),
                )
                .by(actor)
                .with_metadata(json!({
                    "saleId": sale.id,
                    "orderNumber": sale.order_number,
                    "customerId": customer.id,
                    "total": sale.total,
                })),
            )
            .await;

        Ok(SaleResponse::build(sale, Some(&customer), items))
    }

    async fn hydrate<C: ConnectionTrait>(
        conn: &C,
        sales: Vec<sale::Model>,
    ) -> Result<Vec<SaleResponse>, ServiceError> {
        let sale_ids: Vec<Uuid> = sales.iter().map(|s| s.id).collect();
        let customer_ids: Vec<Uuid> = sales.iter().map(|s| s.customer_id).collect();

        let mut items_by_sale: HashMap<Uuid, Vec<sale_item::Model>> = HashMap::new();
        if !sale_ids.is_empty() {
            for item in sale_item::Entity::find()
                .filter(sale_item::Column::SaleId.is_in(sale_ids))
                .order_by_asc(sale_item::Column::LineNumber)
                .all(conn)
                .await?
            {
                items_by_sale.entry(item.sale_id).or_default().push(item);
            }
        }

        let customers: HashMap<Uuid, customer::Model> = if customer_ids.is_empty() {
            HashMap::new()
        } else {
            customer::Entity::find()
                .filter(customer::Column::Id.is_in(customer_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(sales
            .into_iter()
            .map(|sale| {
                let items = items_by_sale.remove(&sale.id).unwrap_or_default();
                let customer = customers.get(&sale.customer_id);
                SaleResponse::build(sale, customer, items)
            })
            .collect())
    }

    /// Newest first, with lines and customer embedded.
    #[instrument(skip(self))]
    pub async fn list(&self, page: u64, limit: u64) -> Result<(Vec<SaleResponse>, u64), ServiceError> {
        let paginator = sale::Entity::find()
            .order_by_desc(sale::Column::CreatedAt)
            .order_by_desc(sale::Column::OrderNumber)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let sales = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((Self::hydrate(&*self.db, sales).await?, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<SaleResponse, ServiceError> {
        let sale = sale::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))?;
        Self::hydrate(&*self.db, vec![sale])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))
    }

    /// Moves a sale to a new status and edits tracking, note and payment status.
    ///
    /// With strict transitions on, only lifecycle moves are accepted and cancelling
    /// returns every line's quantity to stock.
    #[instrument(skip(self, request), fields(sale_id = %id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateSaleRequest,
        actor: Option<Uuid>,
    ) -> Result<SaleResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let current = sale::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))?;
        let from = current.status;
        let to = request.status;

        if self.strict_transitions && !from.can_transition_to(to) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move sale from {} to {}",
                from, to
            )));
        }

        let requested_tracking = request
            .tracking_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let stored_tracking = current
            .tracking_id
            .clone()
            .filter(|t| !t.trim().is_empty());
        if to == SaleStatus::Shipped && requested_tracking.is_none() && stored_tracking.is_none() {
            return Err(ServiceError::ValidationError(
                "Tracking id is required for SHIPPED status".to_string(),
            ));
        }

        if self.strict_transitions && to == SaleStatus::Cancelled && from != SaleStatus::Cancelled {
            let items = sale_item::Entity::find()
                .filter(sale_item::Column::SaleId.eq(id))
                .all(&txn)
                .await?;
            for item in &items {
                product::Entity::update_many()
                    .col_expr(
                        product::Column::Stock,
                        Expr::col(product::Column::Stock).add(item.quantity),
                    )
                    .filter(product::Column::Id.eq(item.product_id))
                    .exec(&txn)
                    .await?;
            }
            info!(sale_id = %id, lines = items.len(), "Stock restored for cancelled sale");
        }

        let mut active: sale::ActiveModel = current.into();
        active.status = Set(to);
        if let Some(tracking) = requested_tracking {
            active.tracking_id = Set(Some(tracking));
        }
        if let Some(note) = request.note {
            active.note = Set(Some(note));
        }
        if let Some(payment_status) = request.payment_status {
            active.payment_status = Set(payment_status);
        }
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, sale_id = %id, "Failed to commit status update transaction");
            counter!("retail_db.transaction_failures", 1);
            ServiceError::DatabaseError(e)
        })?;

        info!(sale_id = %id, from = %from, to = %to, "Sale status updated");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::UpdateSale,
                    format!("Sale {} moved from {} to {}", updated.order_number, from, to),
                )
                .by(actor)
                .with_metadata(json!({
                    "saleId": id,
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "trackingId": updated.tracking_id,
                })),
            )
            .await;

        self.get(id).await
    }

    /// Every persisted sale in the shape the analytics aggregation reads.
    pub async fn records(&self) -> Result<Vec<SaleRecord>, ServiceError> {
        let sales = sale::Entity::find()
            .order_by_asc(sale::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let mut items_by_sale: HashMap<Uuid, Vec<sale_item::Model>> = HashMap::new();
        for item in sale_item::Entity::find()
            .order_by_asc(sale_item::Column::LineNumber)
            .all(&*self.db)
            .await?
        {
            items_by_sale.entry(item.sale_id).or_default().push(item);
        }

        Ok(sales
            .iter()
            .map(|sale| {
                let items = items_by_sale.get(&sale.id).map(Vec::as_slice).unwrap_or(&[]);
                to_record(sale, items)
            })
            .collect())
    }
}
