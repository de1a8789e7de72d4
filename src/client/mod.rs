//! Typed HTTP client for the admin API.
//!
//! [`ApiClient`] is a thin `reqwest` wrapper that carries the session token.
//! [`store::AdminStore`] builds cached, invalidatable projections on top of it.

pub mod store;

use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{LoginCredentials, LoginResponse},
    entities::{category, sale::SaleStatus},
    errors::ErrorResponse,
    services::{analytics::SaleRecord, dashboard::InventoryStats, sales::UpdateSaleRequest},
};

pub use store::{AdminStore, Projection};

/// Page size used when walking the sales listing.
pub const SALES_PAGE_SIZE: u64 = 100;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::NotAuthenticated => None,
        }
    }
}

/// A sale as the client keeps it: identity and status plus the fields analytics read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSale {
    pub id: Uuid,
    pub order_number: String,
    pub status: SaleStatus,
    #[serde(flatten)]
    pub record: SaleRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u64,
    pub last_page: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SalesPage {
    pub data: Vec<CachedSale>,
    pub meta: PageInfo,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("retail-admin-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(self
            .http
            .request(method, self.endpoint(path))
            .header(header::AUTHORIZATION, format!("Bearer {}", token)))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    body
                }
            });

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Exchanges credentials for a session token and keeps it for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(&LoginCredentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        let login: LoginResponse = Self::decode(response).await?;
        self.token = Some(login.access_token.clone());
        debug!(user = %login.user.email, "Client session established");
        Ok(login)
    }

    pub async fn list_sales_page(&self, page: u64, limit: u64) -> Result<SalesPage, ClientError> {
        let response = self
            .authorized(Method::GET, "/sales")?
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Walks every page of the sales listing.
    pub async fn fetch_all_sales(&self) -> Result<Vec<CachedSale>, ClientError> {
        let mut sales = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_sales_page(page, SALES_PAGE_SIZE).await?;
            let fetched = batch.data.len();
            sales.extend(batch.data);
            if fetched == 0 || page >= batch.meta.last_page {
                break;
            }
            page += 1;
        }
        debug!(count = sales.len(), "Fetched sales");
        Ok(sales)
    }

    pub async fn parent_categories(&self) -> Result<Vec<category::Model>, ClientError> {
        let response = self
            .authorized(Method::GET, "/categories/parent")?
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn inventory_stats(&self) -> Result<InventoryStats, ClientError> {
        let response = self
            .authorized(Method::GET, "/dashboard/inventory-stats")?
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn update_sale_status(
        &self,
        sale_id: Uuid,
        request: &UpdateSaleRequest,
    ) -> Result<CachedSale, ClientError> {
        let response = self
            .authorized(Method::PATCH, &format!("/sales/{}", sale_id))?
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        if let Ok(request) = self.authorized(Method::POST, "/auth/logout") {
            let response = request.send().await?;
            if response.status() != StatusCode::NO_CONTENT && !response.status().is_success() {
                debug!(status = %response.status(), "Server-side logout failed");
            }
        }
        self.token = None;
        Ok(())
    }
}
