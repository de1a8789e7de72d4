mod common;

use assert_matches::assert_matches;
use common::{id_of, TestApp};
use retail_admin_api::errors::ServiceError;
use retail_admin_api::services::sales::{CreateSaleRequest, SaleLineRequest};
use uuid::Uuid;

fn order(customer_id: Uuid, product_id: Uuid, quantity: i32) -> CreateSaleRequest {
    CreateSaleRequest {
        customer_id,
        items: vec![SaleLineRequest {
            product_id,
            quantity,
        }],
        payment_method: "CARD".to_string(),
        payment_status: None,
        shipping_address: None,
        note: None,
    }
}

#[tokio::test]
async fn concurrent_orders_never_oversell() {
    let app = TestApp::new().await;
    let category = app.create_category("Shoes", None).await;
    let product = app
        .create_product("Runner", "40.00", 5, &id_of(&category))
        .await;
    let customer = app.create_customer("Ana", "ana@example.com").await;

    let product_id = Uuid::parse_str(&id_of(&product)).unwrap();
    let customer_id = Uuid::parse_str(&id_of(&customer)).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let sales = app.state.services.sales.clone();
        tasks.push(tokio::spawn(async move {
            sales
                .create_sale(order(customer_id, product_id, 3), None)
                .await
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(err) => {
                assert_matches!(err, ServiceError::InsufficientStock(_));
                rejected += 1;
            }
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(app.product_stock(&id_of(&product)).await, 2);
}

#[tokio::test]
async fn many_small_orders_stop_at_zero() {
    let app = TestApp::new().await;
    let category = app.create_category("Shoes", None).await;
    let product = app
        .create_product("Runner", "10.00", 5, &id_of(&category))
        .await;
    let customer = app.create_customer("Ana", "ana@example.com").await;

    let product_id = Uuid::parse_str(&id_of(&product)).unwrap();
    let customer_id = Uuid::parse_str(&id_of(&customer)).unwrap();

    let results = futures::future::join_all((0..8).map(|_| {
        let sales = app.state.services.sales.clone();
        async move {
            sales
                .create_sale(order(customer_id, product_id, 1), None)
                .await
                .is_ok()
        }
    }))
    .await;

    assert_eq!(results.iter().filter(|ok| **ok).count(), 5);
    assert_eq!(app.product_stock(&id_of(&product)).await, 0);
}
