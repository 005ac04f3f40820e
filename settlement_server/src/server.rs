use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::GatewayApi;
use log::*;
use settlement_engine::{SettlementFlowApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        gateway::GatewayVerifier,
        notifications::{create_notification_event_handlers, NotificationDispatcher},
    },
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

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if !config.gateway.has_credentials() {
        warn!(
            "🚀️ SSE_GATEWAY_STORE_ID and SSE_GATEWAY_STORE_PASSWORD are not set. Successful payments cannot be verified."
        );
    }
    let verifier = GatewayVerifier::new(
        GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?,
    );
    let handlers = create_notification_event_handlers(NotificationDispatcher::new(config.notification_url.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = SettlementFlowApi::new(db, config.settlement.clone(), producers);
    let srv = create_server_instance(config, api, verifier)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    api: SettlementFlowApi<SqliteDatabase>,
    verifier: GatewayVerifier,
) -> Result<Server, ServerError> {
    let api = web::Data::new(api);
    let verifier = web::Data::new(verifier);
    let gateway = web::Data::new(config.gateway.clone());
    let pos = config.pos.clone();
    let srv = HttpServer::new(move || {
        let pos_scope = web::scope("/pos")
            .wrap(PosSignature::new(&pos, "POS"))
            .service(PosSaleRoute::<SqliteDatabase>::new());
        let admin_scope = web::scope("/admin")
            .wrap(PosSignature::new(&pos, "back-office"))
            .service(CompleteOrderRoute::<SqliteDatabase>::new())
            .service(RequestFinalPaymentRoute::<SqliteDatabase>::new())
            .service(ReceiveStockRoute::<SqliteDatabase>::new());
        let api_scope = web::scope("/api").service(OrderStatusRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sse::access_log"))
            .app_data(api.clone())
            .app_data(verifier.clone())
            .app_data(gateway.clone())
            .service(health)
            .service(PaymentIpnRoute::<SqliteDatabase, GatewayVerifier>::new())
            .service(pos_scope)
            .service(admin_scope)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Server listening on {}:{}", config.host, config.port);
    Ok(srv)
}
