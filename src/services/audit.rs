use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{auth::user, entities::audit_log, errors::ServiceError};

/// Action codes written to the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    ReorderCategories,
    CreateCustomer,
    UpdateCustomer,
    DeleteCustomer,
    CreateSale,
    UpdateSale,
    Register,
    Login,
}

#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub description: String,
    pub user_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            user_id: None,
            metadata: None,
        }
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Acting user as shown in the history feed.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub action: String,
    pub description: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub user: Option<HistoryUser>,
}

/// Inserts one audit row on the given connection.
pub async fn append<C>(conn: &C, entry: AuditEntry) -> Result<audit_log::Model, DbErr>
where
    C: ConnectionTrait,
{
    audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        action: Set(entry.action.as_ref().to_string()),
        description: Set(entry.description),
        user_id: Set(entry.user_id),
        metadata: Set(entry.metadata),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
}

#[derive(Debug, Clone)]
pub struct AuditService {
    db: Arc<DatabaseConnection>,
}

impl AuditService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Records an entry after the audited operation has committed.
    /// Failures are logged and swallowed.
    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = append(&*self.db, entry).await {
            warn!(error = %e, action = %action, "Failed to write audit log entry");
        }
    }

    /// Most recent entries first.
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: u64) -> Result<Vec<HistoryEntry>, ServiceError> {
        let rows = audit_log::Entity::find()
            .find_also_related(user::Entity)
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(log, user)| HistoryEntry {
                id: log.id,
                action: log.action,
                description: log.description,
                metadata: log.metadata,
                created_at: log.created_at,
                user: user.map(|u| HistoryUser {
                    id: u.id,
                    email: u.email,
                }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_are_screaming_snake_case() {
        assert_eq!(AuditAction::CreateProduct.as_ref(), "CREATE_PRODUCT");
        assert_eq!(AuditAction::ReorderCategories.as_ref(), "REORDER_CATEGORIES");
        assert_eq!(AuditAction::Login.to_string(), "LOGIN");
    }
}
