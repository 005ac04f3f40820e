use actix_web::{http::StatusCode, test::TestRequest};
use settlement_engine::{
    db_types::{LifecycleStatus, SettlementId},
    settlement_objects::PaymentAssertion,
    traits::{SettlementDatabase, VerificationError},
};

use super::{
    helpers::{outlet_stock, seed_order, seed_product, units, TestState},
    mocks::MockVerifier,
};
use crate::data_objects::{CallbackResponse, CallbackStatus, IpnForm, OrderStatusResponse};

fn ipn(tran_id: Option<&str>, val_id: Option<&str>, status: &str) -> TestRequest {
    let form = IpnForm {
        tran_id: tran_id.map(String::from),
        val_id: val_id.map(String::from),
        status: Some(status.to_string()),
    };
    TestRequest::post().uri("/payment/ipn").set_form(&form)
}

async fn order_status(state: &TestState, id: &str) -> LifecycleStatus {
    let order = state.db().fetch_order(&SettlementId::from(id)).await.unwrap().expect("order exists");
    order.status
}

#[actix_web::test]
async fn health_check() {
    let state = TestState::new(MockVerifier::new()).await;
    let (status, body) = state.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn verified_payment_settles_order() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().times(1).returning(|val_id| {
        assert_eq!(val_id, "VAL-1");
        Ok(PaymentAssertion::valid("O1", units(200)))
    });
    let state = TestState::new(verifier).await;
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 2, None).await;

    let (status, body) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::OK);
    let response: CallbackResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, CallbackStatus::Success);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::Settled);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 1);

    let (status, body) = state.send(TestRequest::get().uri("/api/orders/O1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let response: OrderStatusResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, "settled");
    assert_eq!(response.payment_status, "Paid");
    assert_eq!(response.amount_due, units(0));
}

#[actix_web::test]
async fn repeated_notification_is_acknowledged() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().returning(|_| Ok(PaymentAssertion::valid("O1", units(100))));
    let state = TestState::new(verifier).await;
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, _) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::OK);
    let response: CallbackResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, CallbackStatus::Success);
    assert!(response.message.contains("already settled"));
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 2);
}

#[actix_web::test]
async fn failed_payment_cancels_order() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().never();
    let state = TestState::new(verifier).await;
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, body) = state.send(ipn(Some("O1"), Some("VAL-1"), "FAILED")).await;
    assert_eq!(status, StatusCode::OK);
    let response: CallbackResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, CallbackStatus::Failed);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::Canceled);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);
}

#[actix_web::test]
async fn insufficient_stock_is_reported_as_failed() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().returning(|_| Ok(PaymentAssertion::valid("O1", units(500))));
    let state = TestState::new(verifier).await;
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 5, None).await;

    let (status, body) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::OK);
    let response: CallbackResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, CallbackStatus::Failed);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::Canceled);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);
}

#[actix_web::test]
async fn missing_tran_id_is_a_bad_request() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().never();
    let state = TestState::new(verifier).await;
    let (status, body) = state.send(ipn(None, Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("tran_id"));
    let (status, _) = state.send(ipn(Some("  "), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn missing_gateway_credentials_is_a_server_error() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().never();
    let state = TestState::new(verifier).await.without_gateway_credentials();
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, _) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::AwaitingPayment);
}

#[actix_web::test]
async fn failed_payment_is_cancelled_without_gateway_credentials() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().never();
    let state = TestState::new(verifier).await.without_gateway_credentials();
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, body) = state.send(ipn(Some("O1"), None, "FAILED")).await;
    assert_eq!(status, StatusCode::OK);
    let response: CallbackResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.status, CallbackStatus::Failed);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::Canceled);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);
}

#[actix_web::test]
async fn unreachable_gateway_leaves_order_unpaid() {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().returning(|_| Err(VerificationError::Unreachable("connection refused".into())));
    let state = TestState::new(verifier).await;
    seed_product(state.db(), "p1", "V1", 3).await;
    seed_order(state.db(), "O1", 1, None).await;

    let (status, _) = state.send(ipn(Some("O1"), Some("VAL-1"), "VALID")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(order_status(&state, "O1").await, LifecycleStatus::AwaitingPayment);
    assert_eq!(outlet_stock(state.db(), "p1", "V1").await, 3);
}

#[actix_web::test]
async fn unknown_order_status() {
    let state = TestState::new(MockVerifier::new()).await;
    let (status, body) = state.send(TestRequest::get().uri("/api/orders/NOPE/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"));
}
