//! Client for the payment gateway's server-to-server validation API.
//!
//! The gateway's browser redirect and IPN notification can't be trusted on their own. Before an order is settled, the
//! server asks the gateway directly, with its store credentials, whether the payment is real and for how much.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::{parse_validation_response, GatewayApi};
pub use config::{GatewayConfig, LIVE_VALIDATOR_URL, SANDBOX_VALIDATOR_URL};
pub use data_objects::{ValidationResponse, VALID_STATUSES};
pub use error::GatewayApiError;
