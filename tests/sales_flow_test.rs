mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal, id_of, TestApp};
use retail_admin_api::services::order_number::is_valid_order_number;
use rust_decimal_macros::dec;
use serde_json::json;

struct Fixture {
    customer: String,
    product: String,
}

async fn fixture(app: &TestApp, stock: i32) -> Fixture {
    let category = app.create_category("Shoes", None).await;
    let product = app
        .create_product("Runner", "25.50", stock, &id_of(&category))
        .await;
    let customer = app.create_customer("Ana", "ana@example.com").await;
    Fixture {
        customer: id_of(&customer),
        product: id_of(&product),
    }
}

#[tokio::test]
async fn order_decrements_stock_and_totals_lines() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;

    let response = app.create_sale(&fx.customer, &[(&fx.product, 3)]).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sale = body_json(response).await;

    assert_eq!(sale["status"], "PENDING");
    assert_eq!(sale["paymentStatus"], "PENDING");
    assert_eq!(decimal(&sale["total"]), dec!(76.50));
    assert_eq!(sale["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&sale["items"][0]["price"]), dec!(25.50));
    assert_eq!(sale["items"][0]["product"]["category"], "Shoes");
    assert!(is_valid_order_number(sale["orderNumber"].as_str().unwrap()));
    assert_eq!(app.product_stock(&fx.product).await, 7);
}

#[tokio::test]
async fn total_is_a_snapshot_of_prices_at_creation() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;

    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 2)]).await).await;
    app.expect_json(
        Method::PATCH,
        &format!("/api/v1/products/{}", fx.product),
        Some(json!({ "price": "99.00" })),
        StatusCode::OK,
    )
    .await;

    let reloaded = app
        .expect_json(
            Method::GET,
            &format!("/api/v1/sales/{}", id_of(&sale)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(decimal(&reloaded["total"]), dec!(51));
    assert_eq!(decimal(&reloaded["items"][0]["price"]), dec!(25.50));
}

#[tokio::test]
async fn insufficient_stock_on_any_line_rejects_whole_order() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;
    let category = app.create_category("Bags", None).await;
    let scarce = id_of(&app.create_product("Tote", "12.25", 1, &id_of(&category)).await);

    let response = app
        .create_sale(&fx.customer, &[(&fx.product, 4), (&scarce, 2)])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Tote"), "{}", message);
    assert!(message.contains("requested 2"), "{}", message);

    assert_eq!(app.product_stock(&fx.product).await, 10);
    assert_eq!(app.product_stock(&scarce).await, 1);

    let sales = app
        .expect_json(Method::GET, "/api/v1/sales", None, StatusCode::OK)
        .await;
    assert_eq!(sales["meta"]["totalSales"], 0);
}

#[tokio::test]
async fn duplicate_lines_are_merged_before_stock_check() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 5).await;

    let response = app
        .create_sale(&fx.customer, &[(&fx.product, 3), (&fx.product, 3)])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.product_stock(&fx.product).await, 5);

    let response = app
        .create_sale(&fx.customer, &[(&fx.product, 2), (&fx.product, 3)])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sale = body_json(response).await;
    assert_eq!(sale["items"].as_array().unwrap().len(), 1);
    assert_eq!(sale["items"][0]["quantity"], 5);
    assert_eq!(app.product_stock(&fx.product).await, 0);
}

#[tokio::test]
async fn order_creation_errors() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 5).await;

    let empty = app.create_sale(&fx.customer, &[]).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(empty).await["message"], "Validation error: Cart is empty");

    let unknown_customer = app
        .create_sale(&uuid::Uuid::new_v4().to_string(), &[(&fx.product, 1)])
        .await;
    assert_eq!(unknown_customer.status(), StatusCode::NOT_FOUND);

    let unknown_product = app
        .create_sale(&fx.customer, &[(&uuid::Uuid::new_v4().to_string(), 1)])
        .await;
    assert_eq!(unknown_product.status(), StatusCode::NOT_FOUND);

    let zero = app.create_sale(&fx.customer, &[(&fx.product, 0)]).await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.product_stock(&fx.product).await, 5);
}

#[tokio::test]
async fn inactive_products_cannot_be_ordered() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 5).await;

    let deleted = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/products/{}", fx.product),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let response = app.create_sale(&fx.customer, &[(&fx.product, 1)]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shipping_requires_tracking_id() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;
    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 3)]).await).await;
    let uri = format!("/api/v1/sales/{}", id_of(&sale));

    app.expect_json(
        Method::PATCH,
        &uri,
        Some(json!({ "status": "PREPARING" })),
        StatusCode::OK,
    )
    .await;

    let rejected = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "SHIPPED" })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(rejected["message"]
        .as_str()
        .unwrap()
        .contains("Tracking id is required"));

    let shipped = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "SHIPPED", "trackingId": "MX-123" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(shipped["status"], "SHIPPED");
    assert_eq!(shipped["trackingId"], "MX-123");
}

#[tokio::test]
async fn strict_lifecycle_rejects_backward_moves() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;
    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 1)]).await).await;
    let uri = format!("/api/v1/sales/{}", id_of(&sale));

    let skip = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "DELIVERED" })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(skip["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid status transition"));

    for status in ["PREPARING", "CANCELLED"] {
        app.expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": status })),
            StatusCode::OK,
        )
        .await;
    }

    app.expect_json(
        Method::PATCH,
        &uri,
        Some(json!({ "status": "PENDING" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn cancelling_returns_stock_once() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;
    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 4)]).await).await;
    let uri = format!("/api/v1/sales/{}", id_of(&sale));
    assert_eq!(app.product_stock(&fx.product).await, 6);

    app.expect_json(
        Method::PATCH,
        &uri,
        Some(json!({ "status": "CANCELLED" })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(app.product_stock(&fx.product).await, 10);

    // Re-saving a cancelled sale edits the note only
    let noted = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "CANCELLED", "note": "customer request" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(noted["note"], "customer request");
    assert_eq!(app.product_stock(&fx.product).await, 10);
}

#[tokio::test]
async fn permissive_mode_allows_any_move_without_restocking() {
    let app = TestApp::with_config(|cfg| cfg.strict_sale_transitions = false).await;
    let fx = fixture(&app, 10).await;
    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 3)]).await).await;
    let uri = format!("/api/v1/sales/{}", id_of(&sale));
    assert_eq!(app.product_stock(&fx.product).await, 7);

    app.expect_json(
        Method::PATCH,
        &uri,
        Some(json!({ "status": "SHIPPED" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    let shipped = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "SHIPPED", "trackingId": "MX-123" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(shipped["trackingId"], "MX-123");

    app.expect_json(
        Method::PATCH,
        &uri,
        Some(json!({ "status": "CANCELLED" })),
        StatusCode::OK,
    )
    .await;
    let reopened = app
        .expect_json(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "PENDING" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(reopened["status"], "PENDING");
    assert_eq!(app.product_stock(&fx.product).await, 7);
}

#[tokio::test]
async fn checkout_orders_for_the_logged_in_user() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;

    let first = app
        .expect_json(
            Method::POST,
            "/api/v1/sales/checkout",
            Some(json!({
                "items": [{ "productId": fx.product, "quantity": 1 }],
                "paymentMethod": "CASH",
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(first["customer"]["email"], common::ADMIN_EMAIL);

    let second = app
        .expect_json(
            Method::POST,
            "/api/v1/sales/checkout",
            Some(json!({
                "items": [{ "productId": fx.product, "quantity": 2 }],
                "paymentMethod": "CASH",
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(first["customerId"], second["customerId"]);
    assert_eq!(app.product_stock(&fx.product).await, 7);
}

#[tokio::test]
async fn sales_are_audited() {
    let app = TestApp::new().await;
    let fx = fixture(&app, 10).await;
    let sale = body_json(app.create_sale(&fx.customer, &[(&fx.product, 1)]).await).await;
    app.expect_json(
        Method::PATCH,
        &format!("/api/v1/sales/{}", id_of(&sale)),
        Some(json!({ "status": "PREPARING" })),
        StatusCode::OK,
    )
    .await;

    let history = app
        .expect_json(Method::GET, "/api/v1/history?limit=2", None, StatusCode::OK)
        .await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "UPDATE_SALE");
    assert_eq!(entries[1]["action"], "CREATE_SALE");
    assert_eq!(entries[1]["metadata"]["saleId"], sale["id"]);
    assert_eq!(entries[0]["user"]["email"], common::ADMIN_EMAIL);
}
