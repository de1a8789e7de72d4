#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use retail_admin_api::{app_router, config::AppConfig, db, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "retail_admin_test_secret_with_enough_entropy_42";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Adm1n!Pass";

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    // Every sqlite in-memory connection is its own database, so keep exactly one alive.
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_idle_timeout_secs = 3600;
    cfg.db_acquire_timeout_secs = 30;
    cfg
}

/// Full router over an in-memory SQLite database with migrations applied and a
/// registered, logged-in admin.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    pub admin_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = test_config();
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = app_router(state.clone());

        let mut app = Self {
            router,
            state,
            token: String::new(),
            admin_id: Uuid::nil(),
        };

        let registered = app
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "name": "Admin",
                    "email": ADMIN_EMAIL,
                    "password": ADMIN_PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(registered.status(), StatusCode::CREATED);
        let registered = body_json(registered).await;
        app.admin_id = Uuid::parse_str(registered["userId"].as_str().expect("user id"))
            .expect("valid user id");

        let login = app
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
                None,
            )
            .await;
        assert_eq!(login.status(), StatusCode::OK);
        let login = body_json(login).await;
        app.token = login["accessToken"]
            .as_str()
            .expect("access token")
            .to_string();

        app
    }

    /// Bearer token for the default admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Authenticated request that must answer with `expected`; returns the JSON body.
    pub async fn expect_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let payload = body_json(response).await;
        assert_eq!(status, expected, "{} {} returned {}", method, uri, payload);
        payload
    }

    pub async fn create_category(&self, name: &str, parent_id: Option<&str>) -> Value {
        self.expect_json(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": name, "parentId": parent_id })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn create_product(
        &self,
        name: &str,
        price: &str,
        stock: i32,
        category_id: &str,
    ) -> Value {
        self.expect_json(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "price": price,
                "stock": stock,
                "brand": "Acme",
                "categoryId": category_id,
            })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn create_customer(&self, name: &str, email: &str) -> Value {
        self.expect_json(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": name, "email": email })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn create_sale(&self, customer_id: &str, lines: &[(&str, i32)]) -> Response {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity)| json!({ "productId": product_id, "quantity": quantity }))
            .collect();
        self.request_authenticated(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customerId": customer_id,
                "items": items,
                "paymentMethod": "CARD",
            })),
        )
        .await
    }

    pub async fn product_stock(&self, product_id: &str) -> i64 {
        let product = self
            .expect_json(
                Method::GET,
                &format!("/api/v1/products/{}", product_id),
                None,
                StatusCode::OK,
            )
            .await;
        product["stock"].as_i64().expect("stock")
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not json")
    }
}

/// Reads a decimal serialized either as a JSON string or number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}
