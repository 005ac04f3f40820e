mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use settlement_common::Money;
use settlement_engine::{
    db_types::{LifecycleStatus, PaymentStatus},
    settlement_objects::{GatewayCallback, PaymentAssertion},
    traits::{PaymentVerifier, VerificationError},
    SettlementError,
};

/// A gateway that answers every validation request with the same response, and counts the requests.
struct FixedGateway {
    response: Result<PaymentAssertion, VerificationError>,
    calls: AtomicUsize,
}

impl FixedGateway {
    fn paying(tran_id: &str, amount: Money) -> Self {
        let mut payment = PaymentAssertion::valid(tran_id, amount);
        payment.val_id = Some("VAL-1".into());
        payment.bank_tran_id = Some("BANK-1".into());
        payment.card_type = Some("VISA".into());
        payment.currency = Some("BDT".into());
        Self { response: Ok(payment), calls: AtomicUsize::new(0) }
    }

    fn down() -> Self {
        Self { response: Err(VerificationError::Unreachable("connection refused".into())), calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PaymentVerifier for FixedGateway {
    async fn verify(&self, _val_id: &str) -> Result<PaymentAssertion, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

#[tokio::test]
async fn valid_callback_settles_the_verified_amount() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 2)).await;
    let gateway = FixedGateway::paying("O1", units(200));

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "VALID");
    let outcome = api.process_gateway_callback(callback, &gateway).await.unwrap();
    assert_eq!(outcome.amount_paid, units(200));
    assert_eq!(gateway.calls(), 1);

    let order = order(&env.db, "O1").await;
    assert_eq!(order.status, LifecycleStatus::Settled);
    let meta = order.payment_meta.expect("payment metadata is recorded");
    assert_eq!(meta.bank_tran_id.as_deref(), Some("BANK-1"));
    assert_eq!(meta.card_type.as_deref(), Some("VISA"));
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (1, 1));
}

#[tokio::test]
async fn failed_status_cancels_without_asking_the_gateway() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 2)).await;
    let gateway = FixedGateway::paying("O1", units(200));

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "FAILED");
    let err = api.process_gateway_callback(callback, &gateway).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert_eq!(gateway.calls(), 0);
    let order = order(&env.db, "O1").await;
    assert_eq!(order.status, LifecycleStatus::Canceled);
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (3, 3));
}

#[tokio::test]
async fn missing_validation_id_cancels() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;
    let gateway = FixedGateway::paying("O1", units(100));

    let callback = GatewayCallback::new("O1", Some("  "), "VALID");
    let err = api.process_gateway_callback(callback, &gateway).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert_eq!(gateway.calls(), 0);
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::Canceled);
}

#[tokio::test]
async fn unreachable_gateway_leaves_the_order_pending() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "VALID");
    let err = api.process_gateway_callback(callback.clone(), &FixedGateway::down()).await.unwrap_err();
    assert!(matches!(err, SettlementError::UpstreamVerificationFailure(_)));
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::AwaitingPayment);

    // The gateway retries its notification once it is back
    let gateway = FixedGateway::paying("O1", units(100));
    api.process_gateway_callback(callback, &gateway).await.unwrap();
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::Settled);
}

#[tokio::test]
async fn validation_for_another_transaction_is_rejected() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;
    let gateway = FixedGateway::paying("O2", units(100));

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "VALID");
    let err = api.process_gateway_callback(callback, &gateway).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::Canceled);
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (3, 3));
}

#[tokio::test]
async fn gateway_rejection_cancels_the_order() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;
    let mut gateway = FixedGateway::paying("O1", units(100));
    if let Ok(payment) = gateway.response.as_mut() {
        payment.valid = false;
    }

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "VALID");
    let err = api.process_gateway_callback(callback, &gateway).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationRejected(_)));
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::Canceled);
}

#[tokio::test]
async fn repeated_callback_is_idempotent() {
    let (env, api) = setup().await;
    seed_product(&env.db, "p1", "V1", 3).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;
    let gateway = FixedGateway::paying("O1", units(100));

    let callback = GatewayCallback::new("O1", Some("VAL-1"), "VALID");
    api.process_gateway_callback(callback.clone(), &gateway).await.unwrap();
    let err = api.process_gateway_callback(callback, &gateway).await.unwrap_err();
    assert!(matches!(err, SettlementError::AlreadySettled(_)));
    assert_eq!(order(&env.db, "O1").await.status, LifecycleStatus::Settled);
    assert_eq!(stock_at(&env.db, "p1", "V1").await, (2, 2));
}
