mod common;

use common::*;
use settlement_engine::{traits::SettlementDatabase, SettlementError};

#[tokio::test]
async fn receiving_stock_updates_outlet_and_global_counts() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 2).await;

    let variant = api.receive_stock("p1", "V1", OUTLET, 5).await.unwrap();
    assert_eq!(variant.outlet_stock(OUTLET), 7);
    assert_eq!(variant.stock, 7);

    // A new outlet entry is created on first receipt
    let variant = api.receive_stock("p1", "V1", "sylhet", 3).await.unwrap();
    assert_eq!(variant.outlet_stock("sylhet"), 3);
    assert_eq!(variant.stock, 10);
    assert_eq!(variant.outlet_total(), variant.stock);
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (7, 10));
}

#[tokio::test]
async fn bad_receipts_are_rejected() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 2).await;

    let err = api.receive_stock("p1", "V1", OUTLET, 0).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    let err = api.receive_stock("p1", "V9", OUTLET, 1).await.unwrap_err();
    assert!(matches!(err, SettlementError::VariantNotFound { .. }));
    let err = api.receive_stock("nope", "V1", OUTLET, 1).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound(_)));
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (2, 2));
}

#[tokio::test]
async fn receipts_that_overflow_the_counter_are_rejected() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    let err = api.receive_stock("p1", "V1", OUTLET, i64::MAX).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)), "{err}");
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (3, 3));
}

#[tokio::test]
async fn received_stock_can_be_sold() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 0).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 2)).await;
    api.receive_stock("p1", "V1", OUTLET, 2).await.unwrap();
    api.settle(paid("O1", units(200))).await.unwrap();
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (0, 0));
}

#[tokio::test]
async fn keyed_variant_documents_are_normalized() {
    let (env, api) = setup().await;
    let variants = r#"{
        "V2": { "outletStocks": { "dhaka": 4 } },
        "V1": { "stock": 5, "outlet_stocks": { "dhaka": 3, "sylhet": 2 } }
    }"#;
    env.db.upsert_product_json("p1", "Keyed product", false, variants).await.unwrap();

    let product = env.db.fetch_product("p1").await.unwrap().unwrap();
    let skus = product.variants.iter().map(|v| v.sku.as_str()).collect::<Vec<_>>();
    assert_eq!(skus, vec!["V1", "V2"]);
    // A missing global count is derived from the outlet counts
    assert_eq!(product.variant("V2").unwrap().stock, 4);

    seed_order(&env.db, simple_order("O1", "p1", "V1", 3)).await;
    api.settle(paid("O1", units(300))).await.unwrap();
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (0, 2));
}
