//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Settlement is I/O bound, so every handler here is async, and awaits
//! the engine rather than blocking on it.
use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::GatewayConfig;
use log::*;
use settlement_engine::{
    db_types::{NewPosSale, SettlementId},
    settlement_objects::{GatewayCallback, SettlementRequest},
    traits::{PaymentVerifier, SettlementDatabase},
    SettlementError,
    SettlementFlowApi,
};

use crate::{
    data_objects::{CallbackResponse, IpnForm, JsonResponse, OrderStatusResponse, PosSaleRequest, StockReceipt},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(payment_ipn => Post "/payment/ipn" impl SettlementDatabase, PaymentVerifier);
/// Route handler for the payment gateway's instant payment notification (IPN).
///
/// The gateway posts a form with `tran_id` (our order id), `val_id` and `status`. None of it is trusted: the payment is
/// verified server-to-server before the order is settled (see
/// [`SettlementFlowApi::process_gateway_callback`]).
///
/// Responds with `{"status": "Success" | "Failed", "message": ...}`. A missing `tran_id` is a bad request. A successful
/// payment that cannot be verified, because gateway credentials are missing or the gateway cannot be reached, is a
/// server error.
pub async fn payment_ipn<B, V>(
    api: web::Data<SettlementFlowApi<B>>,
    verifier: web::Data<V>,
    gateway: web::Data<GatewayConfig>,
    form: web::Form<IpnForm>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    V: PaymentVerifier,
{
    let IpnForm { tran_id, val_id, status } = form.into_inner();
    let tran_id = tran_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::InvalidRequestBody("The notification has no tran_id".into()))?;
    info!("💻️ Payment notification for {tran_id} received. Status: {}", status.as_deref().unwrap_or("none"));
    let callback = GatewayCallback { tran_id: tran_id.clone(), val_id, status: status.unwrap_or_default() };
    // Only successful payments are verified with the gateway
    if callback.is_success() && !gateway.has_credentials() {
        error!("💻️ Gateway credentials are not configured. The notification for {tran_id} cannot be verified.");
        return Err(ServerError::ConfigurationError("Gateway credentials are not configured".into()));
    }
    match api.process_gateway_callback(callback, verifier.get_ref()).await {
        Ok(outcome) => {
            let message = format!("Order {tran_id} settled ({}). {} paid", outcome.kind, outcome.amount_paid);
            Ok(HttpResponse::Ok().json(CallbackResponse::success(message)))
        },
        Err(SettlementError::AlreadySettled(_)) => {
            Ok(HttpResponse::Ok().json(CallbackResponse::success(format!("Order {tran_id} is already settled"))))
        },
        Err(e) if e.requires_cancellation() => {
            info!("💻️ Payment for {tran_id} was rejected. {e}");
            Ok(HttpResponse::Ok().json(CallbackResponse::failed(e)))
        },
        Err(e) => {
            error!("💻️ Unexpected error processing the payment notification for {tran_id}. {e}");
            Err(e.into())
        },
    }
}

//----------------------------------------------   POS  ----------------------------------------------------
route!(pos_sale => Post "/sales" impl SettlementDatabase);
/// Records a completed POS sale. POS sales are paid at the till, so there is nothing to verify externally.
pub async fn pos_sale<B: SettlementDatabase>(
    api: web::Data<SettlementFlowApi<B>>,
    body: web::Json<PosSaleRequest>,
) -> Result<HttpResponse, ServerError> {
    let sale = NewPosSale::try_from(body.into_inner()).map_err(ServerError::InvalidRequestBody)?;
    let id = sale.id.clone();
    debug!("💻️ POS sale {id} received from outlet {}", sale.outlet_id);
    match api.settle(SettlementRequest::Pos(sale)).await {
        Ok(outcome) => {
            let message = format!("POS sale {id} recorded. {} points earned", outcome.points_earned);
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        Err(SettlementError::AlreadySettled(_)) => {
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("POS sale {id} has already been recorded"))))
        },
        Err(e) => rejection(e),
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_status => Get "/orders/{order_id}/status" impl SettlementDatabase);
pub async fn order_status<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = order_id_from_path(path)?;
    trace!("💻️ Status request for order {id}");
    let order = api.fetch_order(&id).await?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse::from(order)))
}

route!(complete_order => Post "/orders/{order_id}/complete" impl SettlementDatabase);
/// Marks a settled order as delivered, and awards the loyalty points for it.
pub async fn complete_order<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = order_id_from_path(path)?;
    match api.complete_order(&id).await {
        Ok(outcome) => {
            let message = format!("Order {id} completed. {} points awarded", outcome.points_earned);
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        Err(e) => rejection(e),
    }
}

route!(request_final_payment => Post "/orders/{order_id}/request_final_payment" impl SettlementDatabase);
/// The goods for a pre-order are ready. Asks the customer for the balance.
pub async fn request_final_payment<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = order_id_from_path(path)?;
    match api.request_final_payment(&id).await {
        Ok(order) => {
            let message = format!("Order {id} is awaiting a final payment of {}", order.expected_payable());
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        Err(e) => rejection(e),
    }
}

//----------------------------------------------   Stock  ----------------------------------------------------
route!(receive_stock => Post "/stock/receive" impl SettlementDatabase);
pub async fn receive_stock<B: SettlementDatabase>(
    api: web::Data<SettlementFlowApi<B>>,
    body: web::Json<StockReceipt>,
) -> Result<HttpResponse, ServerError> {
    let StockReceipt { product_id, sku, outlet_id, quantity } = body.into_inner();
    match api.receive_stock(&product_id, &sku, &outlet_id, quantity).await {
        Ok(variant) => {
            let message = format!(
                "{quantity} of {product_id}/{sku} received at {outlet_id}. {} at the outlet, {} in total",
                variant.outlet_stock(&outlet_id),
                variant.stock
            );
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        Err(e) => rejection(e),
    }
}

fn order_id_from_path(path: web::Path<String>) -> Result<SettlementId, ServerError> {
    path.into_inner().parse::<SettlementId>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

/// Business rejections are reported in the response body. Missing records are a 404, and anything else is a server
/// error.
fn rejection(e: SettlementError) -> Result<HttpResponse, ServerError> {
    match e {
        SettlementError::NotFound(_) => Err(e.into()),
        e if e.requires_cancellation() => {
            debug!("💻️ Request rejected. {e}");
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
        e => {
            error!("💻️ Unexpected error. {e}");
            Err(e.into())
        },
    }
}
