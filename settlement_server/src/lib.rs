//! # Settlement server
//! This crate hosts the HTTP front end of the settlement engine. It is responsible for:
//! * Receiving payment notifications from the payment gateway, verifying them server-to-server, and settling the
//!   matching orders.
//! * Recording completed sales from POS terminals.
//! * Back-office operations: completing delivered orders, requesting the balance of pre-orders, and receiving stock.
//! * Notifying customers when a settlement promotes them to a new membership tier.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payment/ipn`: The gateway's instant payment notification.
//! * `/pos/sales`: Completed POS sales. Requests must be signed (see [middleware](middleware/index.html)).
//! * `/admin/orders/{id}/complete`, `/admin/orders/{id}/request_final_payment`, `/admin/stock/receive`: Back-office
//!   operations. Requests must be signed.
//! * `/api/orders/{id}/status`: The settlement status of an order.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
