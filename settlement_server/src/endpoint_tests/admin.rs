use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use settlement_engine::{
    db_types::{LifecycleStatus, MembershipTier, SettlementId},
    settlement_objects::{PaymentAssertion, SettlementRequest},
    traits::SettlementDatabase,
};

use super::{
    helpers::{outlet_stock, seed_order, seed_product, signed_post, units, TestState, OUTLET},
    mocks::MockVerifier,
};
use crate::data_objects::JsonResponse;

fn parse(body: &str) -> JsonResponse {
    serde_json::from_str(body).unwrap()
}

#[actix_web::test]
async fn receive_stock() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 2).await;

    let body = json!({"product_id": "p1", "sku": "V1", "outlet_id": OUTLET, "quantity": 5}).to_string();
    let (status, body) = state.send(signed_post("/admin/stock/receive", &body)).await;
    assert_eq!(status, StatusCode::OK);
    let response = parse(&body);
    assert!(response.success, "{}", response.message);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 7);

    let body = json!({"product_id": "p1", "sku": "V1", "outlet_id": OUTLET, "quantity": 0}).to_string();
    let (status, body) = state.send(signed_post("/admin/stock/receive", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!parse(&body).success);

    let body = json!({"product_id": "nope", "sku": "V1", "outlet_id": OUTLET, "quantity": 1}).to_string();
    let (status, _) = state.send(signed_post("/admin/stock/receive", &body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn complete_settled_order() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 5).await;
    state.db().upsert_user("carol", units(0), MembershipTier::Silver).await.unwrap();
    seed_order(state.db(), "O1", 3, Some("carol")).await;

    // Not paid yet
    let (status, body) = state.send(signed_post("/admin/orders/O1/complete", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!parse(&body).success);

    state
        .api
        .settle(SettlementRequest::Online {
            id: SettlementId::from("O1"),
            payment: PaymentAssertion::valid("O1", units(300)),
        })
        .await
        .unwrap();
    let (status, body) = state.send(signed_post("/admin/orders/O1/complete", "")).await;
    assert_eq!(status, StatusCode::OK);
    let response = parse(&body);
    assert!(response.success, "{}", response.message);
    assert!(response.message.contains("3 points"));
    let order = state.db().fetch_order(&SettlementId::from("O1")).await.unwrap().unwrap();
    assert_eq!(order.status, LifecycleStatus::Completed);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 2);
}

#[actix_web::test]
async fn final_payment_needs_a_pre_order() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 5).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, body) = state.send(signed_post("/admin/orders/O1/request_final_payment", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!parse(&body).success);

    let (status, _) = state.send(signed_post("/admin/orders/NOPE/request_final_payment", "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_routes_need_a_signature() {
    let state = TestState::new(MockVerifier::new()).await;
    seed_product(state.db(), "p1", "V1", 5).await;
    let req = TestRequest::post().uri("/admin/orders/O1/complete");
    let (status, _) = state.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
