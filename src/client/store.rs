//! Client-side application state.
//!
//! The store is an ordinary value owned by the caller. Each cached projection remembers
//! when it was fetched and whether a mutation has invalidated it; callers decide when
//! to refresh.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiClient, CachedSale, ClientError};
use crate::{
    auth::AuthUser,
    entities::category,
    services::{
        analytics::{calculate_analytics, AnalyticsReport, SaleRecord},
        dashboard::InventoryStats,
        sales::UpdateSaleRequest,
    },
};

/// Default age after which a projection counts as stale.
pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct Projection<T> {
    value: Option<T>,
    fetched_at: Option<DateTime<Utc>>,
    invalidated: bool,
}

impl<T> Default for Projection<T> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
            invalidated: false,
        }
    }
}

impl<T> Projection<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Never fetched, invalidated, or older than `max_age` at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.fetched_at {
            None => true,
            Some(_) if self.invalidated => true,
            Some(at) => now - at > max_age,
        }
    }

    fn replace(&mut self, value: T, now: DateTime<Utc>) {
        self.value = Some(value);
        self.fetched_at = Some(now);
        self.invalidated = false;
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct AdminStore {
    client: ApiClient,
    session: Option<AuthUser>,
    sales: Projection<Vec<CachedSale>>,
    parent_categories: Projection<Vec<category::Model>>,
    inventory: Projection<InventoryStats>,
    max_age: Duration,
}

impl AdminStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            session: None,
            sales: Projection::default(),
            parent_categories: Projection::default(),
            inventory: Projection::default(),
            max_age: Duration::seconds(DEFAULT_MAX_AGE_SECS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> Option<&AuthUser> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.token().is_some()
    }

    pub fn sales(&self) -> &Projection<Vec<CachedSale>> {
        &self.sales
    }

    pub fn parent_categories(&self) -> &Projection<Vec<category::Model>> {
        &self.parent_categories
    }

    pub fn inventory(&self) -> &Projection<InventoryStats> {
        &self.inventory
    }

    pub fn is_stale(&self, projection: &Projection<impl Sized>) -> bool {
        projection.is_stale_at(Utc::now(), self.max_age)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&AuthUser, ClientError> {
        let login = self.client.login(email, password).await?;
        info!(user = %login.user.email, "Signed in");
        Ok(self.session.insert(login.user))
    }

    /// Drops the session and every cached projection.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = self.client.logout().await;
        self.client.clear_token();
        self.session = None;
        self.sales.clear();
        self.parent_categories.clear();
        self.inventory.clear();
        result
    }

    pub async fn refresh_sales(&mut self) -> Result<&[CachedSale], ClientError> {
        let sales = self.client.fetch_all_sales().await?;
        self.sales.replace(sales, Utc::now());
        Ok(self.sales.value().map(Vec::as_slice).unwrap_or_default())
    }

    pub async fn refresh_parent_categories(&mut self) -> Result<&[category::Model], ClientError> {
        let categories = self.client.parent_categories().await?;
        self.parent_categories.replace(categories, Utc::now());
        Ok(self
            .parent_categories
            .value()
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub async fn refresh_inventory(&mut self) -> Result<Option<&InventoryStats>, ClientError> {
        let stats = self.client.inventory_stats().await?;
        self.inventory.replace(stats, Utc::now());
        Ok(self.inventory.value())
    }

    /// Refreshes only the projections that are stale now.
    pub async fn refresh_stale(&mut self) -> Result<(), ClientError> {
        let now = Utc::now();
        if self.sales.is_stale_at(now, self.max_age) {
            self.refresh_sales().await?;
        }
        if self.parent_categories.is_stale_at(now, self.max_age) {
            self.refresh_parent_categories().await?;
        }
        if self.inventory.is_stale_at(now, self.max_age) {
            self.refresh_inventory().await?;
        }
        Ok(())
    }

    /// Sends the status change, patches the cached sale and marks sales and
    /// inventory as invalidated since a cancellation can return stock.
    pub async fn update_sale_status(
        &mut self,
        sale_id: Uuid,
        request: &UpdateSaleRequest,
    ) -> Result<CachedSale, ClientError> {
        let updated = self.client.update_sale_status(sale_id, request).await?;

        if let Some(sales) = self.sales.value.as_mut() {
            if let Some(cached) = sales.iter_mut().find(|s| s.id == sale_id) {
                *cached = updated.clone();
            }
        }
        self.sales.invalidate();
        self.inventory.invalidate();
        debug!(sale_id = %sale_id, status = %updated.status, "Sale status updated");

        Ok(updated)
    }

    /// Analytics over the cached sales, computed locally.
    pub fn analytics(&self) -> AnalyticsReport {
        let records: Vec<SaleRecord> = self
            .sales
            .value()
            .map(|sales| sales.iter().map(|s| s.record.clone()).collect())
            .unwrap_or_default();
        calculate_analytics(&records)
    }
}
