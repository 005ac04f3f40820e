use std::time::Duration;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use gateway_tools::GatewayConfig;
use log::debug;
use settlement_common::{Money, Secret};
use settlement_engine::{
    db_types::{LineItem, NewOrder, Product, SettlementId, Variant},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, TestDatabase},
    traits::SettlementDatabase,
    RetryPolicy,
    SettlementConfig,
    SettlementFlowApi,
    SqliteDatabase,
};

use super::mocks::MockVerifier;
use crate::{
    config::{PosConfig, POS_HMAC_HEADER},
    helpers::calculate_hmac,
    middleware::PosSignature,
    routes::{
        health,
        CompleteOrderRoute,
        OrderStatusRoute,
        PaymentIpnRoute,
        PosSaleRoute,
        ReceiveStockRoute,
        RequestFinalPaymentRoute,
    },
};

pub const OUTLET: &str = "dhaka";
pub const POS_SECRET: &str = "pos-test-secret";

/// A migrated database, the settlement API on top of it, and a mocked payment gateway.
pub struct TestState {
    pub env: TestDatabase,
    pub api: web::Data<SettlementFlowApi<SqliteDatabase>>,
    pub verifier: web::Data<MockVerifier>,
    pub gateway: web::Data<GatewayConfig>,
}

impl TestState {
    pub async fn new(verifier: MockVerifier) -> Self {
        let env = prepare_test_env().await;
        let config = SettlementConfig {
            retry: RetryPolicy {
                max_attempts: 5,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(10),
                transaction_timeout: Duration::from_secs(5),
            },
            ..Default::default()
        };
        let api = SettlementFlowApi::new(env.db.clone(), config, EventProducers::default());
        Self {
            env,
            api: web::Data::new(api),
            verifier: web::Data::new(verifier),
            gateway: web::Data::new(GatewayConfig::new("teststore", "testpass", true)),
        }
    }

    pub fn without_gateway_credentials(mut self) -> Self {
        self.gateway = web::Data::new(GatewayConfig::default());
        self
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.env.db
    }

    /// Sends the request through an app wired the same way as the production server.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let pos = PosConfig { hmac_secret: Secret::new(POS_SECRET.to_string()), hmac_checks: true };
        let app = App::new()
            .app_data(self.api.clone())
            .app_data(self.verifier.clone())
            .app_data(self.gateway.clone())
            .service(health)
            .service(PaymentIpnRoute::<SqliteDatabase, MockVerifier>::new())
            .service(
                web::scope("/pos")
                    .wrap(PosSignature::new(&pos, "POS"))
                    .service(PosSaleRoute::<SqliteDatabase>::new()),
            )
            .service(
                web::scope("/admin")
                    .wrap(PosSignature::new(&pos, "back-office"))
                    .service(CompleteOrderRoute::<SqliteDatabase>::new())
                    .service(RequestFinalPaymentRoute::<SqliteDatabase>::new())
                    .service(ReceiveStockRoute::<SqliteDatabase>::new()),
            )
            .service(web::scope("/api").service(OrderStatusRoute::<SqliteDatabase>::new()));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => {
                let res = e.error_response();
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
        }
    }
}

/// A JSON POST to a back-office route, signed with the test secret.
pub fn signed_post(path: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((POS_HMAC_HEADER, calculate_hmac(POS_SECRET, body.as_bytes())))
        .set_payload(body.to_string())
}

pub fn units(v: i64) -> Money {
    Money::from_units(v)
}

pub async fn seed_product(db: &SqliteDatabase, product_id: &str, sku: &str, stock: i64) {
    let product = Product {
        id: product_id.to_string(),
        name: format!("Product {product_id}"),
        is_pre_order: false,
        variants: vec![Variant::new(sku, &[(OUTLET, stock)])],
        version: 0,
        updated_at: chrono::Utc::now(),
    };
    db.upsert_product(&product).await.expect("Error seeding product");
}

/// Seeds a single-line order for `qty` units of `p1/V1` at 100 each.
pub async fn seed_order(db: &SqliteDatabase, id: &str, qty: i64, user_id: Option<&str>) {
    let items = vec![LineItem::new("p1", "V1", qty, units(100))];
    let mut order = NewOrder::new(SettlementId::from(id), items).at_outlet(OUTLET);
    if let Some(user_id) = user_id {
        order = order.for_user(user_id);
    }
    db.insert_order(order).await.expect("Error seeding order");
}

pub async fn outlet_stock(db: &SqliteDatabase, product_id: &str, sku: &str) -> i64 {
    let product = db.fetch_product(product_id).await.unwrap().expect("product exists");
    product.variant(sku).expect("variant exists").outlet_stock(OUTLET)
}
