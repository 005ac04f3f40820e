use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::{
    helpers::{outlet_stock, seed_product, signed_post, TestState, OUTLET},
    mocks::MockVerifier,
};
use crate::{config::POS_HMAC_HEADER, data_objects::JsonResponse};

fn sale_body(sale_id: &str, qty: i64) -> String {
    let total = qty * 100;
    json!({
        "sale_id": sale_id,
        "outlet_id": OUTLET,
        "items": [{"product_id": "p1", "sku": "V1", "quantity": qty, "unit_price": "100.00"}],
        "subtotal": total,
        "total": total,
        "payment_method": "card"
    })
    .to_string()
}

#[actix_web::test]
async fn signed_sale_is_recorded() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 5).await;

    let (status, body) = state.send(signed_post("/pos/sales", &sale_body("POS-1", 2))).await;
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success, "{}", response.message);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);

    // Terminals retry when a response is lost. The repeat must not deduct stock again.
    let (status, body) = state.send(signed_post("/pos/sales", &sale_body("POS-1", 2))).await;
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success);
    assert!(response.message.contains("already been recorded"));
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);
}

#[actix_web::test]
async fn sale_without_stock_is_rejected() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 1).await;

    let (status, body) = state.send(signed_post("/pos/sales", &sale_body("POS-2", 3))).await;
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(!response.success);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 1);
}

#[actix_web::test]
async fn unsigned_sale_is_forbidden() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 5).await;

    let req = TestRequest::post()
        .uri("/pos/sales")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(sale_body("POS-3", 1));
    let (status, body) = state.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "The request is not signed");

    let req = TestRequest::post()
        .uri("/pos/sales")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((POS_HMAC_HEADER, "bm90IGEgc2lnbmF0dXJl"))
        .set_payload(sale_body("POS-3", 1));
    let (status, body) = state.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.message, "The request signature does not match its body");
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 5);
}

#[actix_web::test]
async fn sale_needs_an_id() {
    let state = TestState::new(MockVerifier::new()).await;
    let (status, _) = state.send(signed_post("/pos/sales", &sale_body(" ", 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
