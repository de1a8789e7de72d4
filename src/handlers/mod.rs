pub mod analytics;
pub mod categories;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod history;
pub mod products;
pub mod sales;

use crate::{config::AppConfig, db::DbPool};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub audit: Arc<crate::services::audit::AuditService>,
    pub categories: Arc<crate::services::categories::CategoryService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub customers: Arc<crate::services::customers::CustomerService>,
    pub sales: Arc<crate::services::sales::SaleService>,
    pub dashboard: Arc<crate::services::dashboard::DashboardService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let audit = Arc::new(crate::services::audit::AuditService::new(db_pool.clone()));

        Self {
            categories: Arc::new(crate::services::categories::CategoryService::new(
                db_pool.clone(),
                audit.clone(),
            )),
            products: Arc::new(crate::services::products::ProductService::new(
                db_pool.clone(),
                audit.clone(),
            )),
            customers: Arc::new(crate::services::customers::CustomerService::new(
                db_pool.clone(),
                audit.clone(),
            )),
            sales: Arc::new(crate::services::sales::SaleService::new(
                db_pool.clone(),
                audit.clone(),
                config.strict_sale_transitions,
            )),
            dashboard: Arc::new(crate::services::dashboard::DashboardService::new(db_pool)),
            audit,
        }
    }
}
