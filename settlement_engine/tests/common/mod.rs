#![allow(dead_code)]
use std::time::Duration;

use settlement_common::Money;
use settlement_engine::{
    db_types::{LineItem, MembershipTier, NewOrder, Order, Product, SettlementId, Variant},
    events::EventProducers,
    settlement_objects::{PaymentAssertion, SettlementRequest},
    test_utils::prepare_env::{prepare_test_env, TestDatabase},
    tier_evaluator::{PointsRates, TierThresholds},
    traits::SettlementDatabase,
    RetryPolicy,
    SettlementConfig,
    SettlementFlowApi,
    SqliteDatabase,
};

pub const OUTLET: &str = "dhaka";

pub fn units(v: i64) -> Money {
    Money::from_units(v)
}

pub fn test_config() -> SettlementConfig {
    SettlementConfig {
        retry: RetryPolicy {
            max_attempts: 20,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(20),
            transaction_timeout: Duration::from_secs(5),
        },
        thresholds: TierThresholds::default(),
        points_rates: PointsRates::default(),
    }
}

pub async fn setup() -> (TestDatabase, SettlementFlowApi<SqliteDatabase>) {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> (TestDatabase, SettlementFlowApi<SqliteDatabase>) {
    let env = prepare_test_env().await;
    let api = SettlementFlowApi::new(env.db.clone(), test_config(), producers);
    (env, api)
}

/// A product with a single variant, stocked at the test outlet.
pub async fn seed_product(db: &SqliteDatabase, product_id: &str, sku: &str, stock: i64) {
    let product = product(product_id, false, vec![Variant::new(sku, &[(OUTLET, stock)])]);
    db.upsert_product(&product).await.expect("Error seeding product");
}

pub async fn seed_pre_order_product(db: &SqliteDatabase, product_id: &str, sku: &str) {
    let product = product(product_id, true, vec![Variant::new(sku, &[])]);
    db.upsert_product(&product).await.expect("Error seeding product");
}

pub fn product(id: &str, is_pre_order: bool, variants: Vec<Variant>) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        is_pre_order,
        variants,
        version: 0,
        updated_at: chrono::Utc::now(),
    }
}

pub async fn seed_user(db: &SqliteDatabase, user_id: &str, spent: Money, tier: MembershipTier) {
    db.upsert_user(user_id, spent, tier).await.expect("Error seeding user");
}

pub async fn seed_order(db: &SqliteDatabase, order: NewOrder) -> Order {
    db.insert_order(order).await.expect("Error seeding order")
}

/// A single-line order for `qty` units of `sku` at 100 each, fulfilled by the test outlet.
pub fn simple_order(id: &str, product_id: &str, sku: &str, qty: i64) -> NewOrder {
    let items = vec![LineItem::new(product_id, sku, qty, units(100))];
    NewOrder::new(SettlementId::from(id), items).at_outlet(OUTLET)
}

pub fn paid(id: &str, amount: Money) -> SettlementRequest {
    SettlementRequest::Online { id: SettlementId::from(id), payment: PaymentAssertion::valid(id, amount) }
}

pub async fn stock_at(db: &SqliteDatabase, product_id: &str, sku: &str) -> (i64, i64) {
    let product = db.fetch_product(product_id).await.unwrap().expect("product exists");
    let variant = product.variant(sku).expect("variant exists");
    (variant.outlet_stock(OUTLET), variant.stock)
}

pub async fn order(db: &SqliteDatabase, id: &str) -> Order {
    db.fetch_order(&SettlementId::from(id)).await.unwrap().expect("order exists")
}

/// Asserts that the cached points balance equals the sum of the user's points history, and returns the balance.
pub async fn assert_ledger_consistent(db: &SqliteDatabase, user_id: &str) -> i64 {
    let user = db.fetch_user(user_id).await.unwrap().expect("user exists");
    let history = db.fetch_points_history(user_id).await.unwrap();
    let sum: i64 = history.iter().map(|e| e.delta).sum();
    assert_eq!(sum, user.loyalty_points, "points history and cached balance disagree for {user_id}");
    user.loyalty_points
}
