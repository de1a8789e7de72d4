use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::config::AppConfig;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PaginationParams {
    /// Page defaults to 1; limit defaults to the configured page size and is clamped to
    /// the configured maximum.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size.max(1));
        (page, limit)
    }
}

/// `meta` block of a paginated response. The total is reported under an
/// entity-specific key such as `totalProducts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u64,
    pub last_page: u64,
    pub total: u64,
    pub total_key: &'static str,
}

impl PageMeta {
    pub fn new(page: u64, limit: u64, total: u64, total_key: &'static str) -> Self {
        let last_page = if limit == 0 {
            1
        } else {
            total.div_ceil(limit).max(1)
        };
        Self {
            page,
            last_page,
            total,
            total_key,
        }
    }
}

impl Serialize for PageMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("page", &self.page)?;
        map.serialize_entry("lastPage", &self.last_page)?;
        map.serialize_entry(self.total_key, &self.total)?;
        map.end()
    }
}

/// Standard paginated response wrapper
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: u64, limit: u64, total: u64, total_key: &'static str) -> Self {
        Self {
            data,
            meta: PageMeta::new(page, limit, total, total_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "retail_admin_test_secret_with_enough_entropy_42".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_and_clamping() {
        let cfg = config();
        assert_eq!(PaginationParams::default().resolve(&cfg), (1, 10));
        let params = PaginationParams {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(params.resolve(&cfg), (1, 100));
    }

    #[test]
    fn meta_uses_entity_total_key() {
        let page = Paginated::new(vec![1, 2], 2, 2, 5, "totalSales");
        assert_eq!(
            serde_json::to_value(page).unwrap(),
            json!({"data": [1, 2], "meta": {"page": 2, "lastPage": 3, "totalSales": 5}})
        );
    }

    #[test]
    fn empty_collections_still_have_one_page() {
        assert_eq!(PageMeta::new(1, 10, 0, "totalProducts").last_page, 1);
    }
}
