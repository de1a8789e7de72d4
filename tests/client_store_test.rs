use retail_admin_api::client::{AdminStore, ApiClient, ClientError};
use retail_admin_api::entities::sale::SaleStatus;
use retail_admin_api::services::sales::UpdateSaleRequest;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn sale_json(id: Uuid, status: &str, created_at: &str, price: &str, quantity: i64) -> Value {
    json!({
        "id": id,
        "orderNumber": "ORD-20240301-AB12CD",
        "status": status,
        "paymentStatus": "PENDING",
        "total": "0",
        "createdAt": created_at,
        "items": [{
            "price": price,
            "quantity": quantity,
            "product": { "name": "Runner", "brand": "Acme", "category": "Shoes" }
        }]
    })
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_partial_json(json!({ "email": "admin@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": TOKEN,
            "tokenType": "Bearer",
            "expiresIn": 3600,
            "user": {
                "userId": Uuid::new_v4(),
                "email": "admin@example.com",
                "name": "Admin"
            }
        })))
        .mount(server)
        .await;
}

async fn logged_in_store(server: &MockServer) -> AdminStore {
    mount_login(server).await;
    let mut store = AdminStore::new(ApiClient::new(server.uri()).unwrap());
    let user = store
        .login("admin@example.com", "Adm1n!Pass")
        .await
        .expect("login");
    assert_eq!(user.email, "admin@example.com");
    store
}

#[tokio::test]
async fn fetches_every_sales_page_and_computes_analytics() {
    let server = MockServer::start().await;
    let mut store = logged_in_store(&server).await;

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/api/v1/sales"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [sale_json(first, "PENDING", "2024-03-01T10:00:00Z", "25.50", 2)],
            "meta": { "page": 1, "lastPage": 2, "totalSales": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sales"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [sale_json(second, "DELIVERED", "2024-05-09T10:00:00Z", "49", 1)],
            "meta": { "page": 2, "lastPage": 2, "totalSales": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store.is_stale(store.sales()));
    let sales = store.refresh_sales().await.unwrap();
    assert_eq!(sales.len(), 2);
    assert!(!store.is_stale(store.sales()));

    let report = store.analytics();
    assert_eq!(report.total_sales, 2);
    assert_eq!(report.total_revenue.to_string(), "100.00");
    assert_eq!(report.revenue_data[2].month, "Mar");
    assert_eq!(report.revenue_data[4].revenue.to_string(), "49");
}

#[tokio::test]
async fn status_update_patches_cache_and_invalidates_projections() {
    let server = MockServer::start().await;
    let mut store = logged_in_store(&server).await;
    let sale_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/sales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [sale_json(sale_id, "PENDING", "2024-03-01T10:00:00Z", "10", 1)],
            "meta": { "page": 1, "lastPage": 1, "totalSales": 1 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/dashboard/inventory-stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "totalProducts": 3, "inventoryValue": 267.0 })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/categories/parent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/api/v1/sales/{}", sale_id)))
        .and(body_partial_json(json!({ "status": "CANCELLED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sale_json(
            sale_id,
            "CANCELLED",
            "2024-03-01T10:00:00Z",
            "10",
            1,
        )))
        .mount(&server)
        .await;

    store.refresh_sales().await.unwrap();
    let stats = store.refresh_inventory().await.unwrap().cloned().unwrap();
    assert_eq!(stats.total_products, 3);

    let updated = store
        .update_sale_status(
            sale_id,
            &UpdateSaleRequest {
                status: SaleStatus::Cancelled,
                tracking_id: None,
                note: None,
                payment_status: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, SaleStatus::Cancelled);

    assert!(store.sales().is_invalidated());
    assert!(store.inventory().is_invalidated());
    assert!(store.is_stale(store.inventory()));
    assert_eq!(
        store.sales().value().unwrap()[0].status,
        SaleStatus::Cancelled
    );

    store.refresh_stale().await.unwrap();
    assert!(!store.sales().is_invalidated());
    assert!(!store.inventory().is_invalidated());
}

#[tokio::test]
async fn api_errors_surface_server_message() {
    let server = MockServer::start().await;
    let mut store = logged_in_store(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/categories/parent"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Unauthorized",
            "message": "Unauthorized: Invalid token",
            "timestamp": "2024-03-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let err = store.refresh_parent_categories().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    match err {
        ClientError::Api { message, .. } => assert_eq!(message, "Unauthorized: Invalid token"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.parent_categories().value().is_none());
}

#[tokio::test]
async fn logout_clears_session_and_cache() {
    let server = MockServer::start().await;
    let mut store = logged_in_store(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/categories/parent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "name": "Shoes",
            "position": 1,
            "parentId": null,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let roots = store.refresh_parent_categories().await.unwrap();
    assert_eq!(roots[0].name, "Shoes");

    store.logout().await.unwrap();
    assert!(!store.is_authenticated());
    assert!(store.session().is_none());
    assert!(store.parent_categories().value().is_none());

    let err = store.refresh_sales().await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}
