use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{customer, sale},
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry, AuditService},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    #[serde(flatten)]
    pub customer: customer::Model,
    pub sales_count: u64,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn duplicate_email(email: &str) -> String {
    format!("A customer with email {} already exists", email)
}

/// Number of sales per customer id, for the given customers only.
async fn sales_counts<C: ConnectionTrait>(
    conn: &C,
    customer_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, u64>, ServiceError> {
    if customer_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = sale::Entity::find()
        .select_only()
        .column(sale::Column::CustomerId)
        .column_as(Expr::col(sale::Column::Id).count(), "sales_count")
        .filter(sale::Column::CustomerId.is_in(customer_ids))
        .group_by(sale::Column::CustomerId)
        .into_tuple()
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, count)| (id, count.max(0) as u64))
        .collect())
}

/// Returns the customer with `email`, creating it on the given connection when missing.
pub async fn find_or_create_by_email<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    email: &str,
) -> Result<customer::Model, ServiceError> {
    let email = normalize_email(email);
    if let Some(existing) = customer::Entity::find()
        .filter(customer::Column::Email.eq(email.clone()))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let now = Utc::now();
    let created = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        email: Set(email.clone()),
        phone: Set(None),
        address: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| ServiceError::from_write(e, duplicate_email(&email)))?;

    info!(customer_id = %created.id, "Customer created for checkout");
    Ok(created)
}

#[derive(Debug, Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<CustomerResponse>, u64), ServiceError> {
        let paginator = customer::Entity::find()
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;

        let counts = sales_counts(&*self.db, customers.iter().map(|c| c.id).collect()).await?;
        let data = customers
            .into_iter()
            .map(|customer| CustomerResponse {
                sales_count: counts.get(&customer.id).copied().unwrap_or(0),
                customer,
            })
            .collect();
        Ok((data, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<CustomerResponse, ServiceError> {
        let customer = customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;
        let counts = sales_counts(&*self.db, vec![id]).await?;
        Ok(CustomerResponse {
            sales_count: counts.get(&id).copied().unwrap_or(0),
            customer,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateCustomerRequest,
        actor: Option<Uuid>,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;
        let email = normalize_email(&request.email);
        let now = Utc::now();

        let created = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email.clone()),
            phone: Set(request.phone),
            address: Set(request.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, duplicate_email(&email)))?;

        info!(customer_id = %created.id, "Customer created");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::CreateCustomer,
                    format!("Created customer {}", created.name),
                )
                .by(actor)
                .with_metadata(json!({ "customerId": created.id })),
            )
            .await;

        Ok(CustomerResponse {
            customer: created,
            sales_count: 0,
        })
    }

    #[instrument(skip(self, request), fields(customer_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCustomerRequest,
        actor: Option<Uuid>,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;
        let existing = customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        let mut new_email = None;
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            active.email = Set(email.clone());
            new_email = Some(email);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }

        let updated = active.update(&*self.db).await.map_err(|e| {
            ServiceError::from_write(e, duplicate_email(new_email.as_deref().unwrap_or_default()))
        })?;

        info!(customer_id = %id, "Customer updated");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::UpdateCustomer,
                    format!("Updated customer {}", updated.name),
                )
                .by(actor)
                .with_metadata(json!({ "customerId": id })),
            )
            .await;

        self.get(id).await
    }

    /// Customers with sales are kept so order history stays intact.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn delete(&self, id: Uuid, actor: Option<Uuid>) -> Result<(), ServiceError> {
        let existing = customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;

        let sales = sale::Entity::find()
            .filter(sale::Column::CustomerId.eq(id))
            .count(&*self.db)
            .await?;
        if sales > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer {} has {} sales and cannot be deleted",
                existing.name, sales
            )));
        }

        customer::Entity::delete_by_id(id).exec(&*self.db).await?;

        info!(customer_id = %id, "Customer deleted");
        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::DeleteCustomer,
                    format!("Deleted customer {}", existing.name),
                )
                .by(actor)
                .with_metadata(json!({ "customerId": id })),
            )
            .await;
        Ok(())
    }
}
