use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, SimpleExpr},
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::{entities::product, errors::ServiceError};

/// Headline inventory figures. `inventory_value` is Σ price × stock over active products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_products: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub inventory_value: Decimal,
}

#[derive(Debug, Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Both figures come from aggregate queries; no product rows are loaded.
    #[instrument(skip(self))]
    pub async fn inventory_stats(&self) -> Result<InventoryStats, ServiceError> {
        let total_products = product::Entity::find().count(&*self.db).await?;

        let value: Option<Option<Decimal>> = product::Entity::find()
            .select_only()
            .column_as(
                SimpleExpr::from(Func::sum(
                    Expr::col(product::Column::Price).mul(Expr::col(product::Column::Stock)),
                )),
                "inventory_value",
            )
            .filter(product::Column::IsActive.eq(true))
            .into_tuple()
            .one(&*self.db)
            .await?;

        Ok(InventoryStats {
            total_products,
            inventory_value: value.flatten().unwrap_or(Decimal::ZERO).round_dp(2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::category;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, Set};
    use uuid::Uuid;

    async fn memory_pool() -> DatabaseConnection {
        let pool = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("connect");
        crate::db::run_migrations(&pool).await.expect("migrate");
        pool
    }

    async fn add_product(
        pool: &DatabaseConnection,
        category_id: Uuid,
        price: Decimal,
        stock: i32,
        active: bool,
    ) {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Item {}", price)),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            brand: Set(None),
            gender: Set(None),
            category_id: Set(category_id),
            options: Set(Default::default()),
            images: Set(Default::default()),
            is_active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(pool)
        .await
        .expect("product");
    }

    #[tokio::test]
    async fn empty_catalog_reports_zero() {
        let service = DashboardService::new(Arc::new(memory_pool().await));
        let stats = service.inventory_stats().await.unwrap();
        assert_eq!(stats.total_products, 0);
        assert_eq!(stats.inventory_value, Decimal::ZERO);
    }

    #[tokio::test]
    async fn inactive_products_count_but_carry_no_value() {
        let pool = memory_pool().await;
        let now = Utc::now();
        let shelf = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Misc".into()),
            position: Set(0),
            parent_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&pool)
        .await
        .expect("category");
        add_product(&pool, shelf.id, dec!(25.50), 10, true).await;
        add_product(&pool, shelf.id, dec!(3.00), 4, true).await;
        add_product(&pool, shelf.id, dec!(99.99), 7, false).await;

        let stats = DashboardService::new(Arc::new(pool))
            .inventory_stats()
            .await
            .unwrap();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.inventory_value, dec!(267.00));
    }

    #[test]
    fn figures_serialize_as_numbers() {
        let stats = InventoryStats {
            total_products: 1,
            inventory_value: dec!(5.0),
        };
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            serde_json::json!({"totalProducts": 1, "inventoryValue": 5.0})
        );
    }
}
