use std::time::Duration;

use log::*;
use settlement_common::{helpers::env_flag, Secret};

pub const SANDBOX_VALIDATOR_URL: &str = "https://sandbox.sslcommerz.com/validator/api/validationserverAPI.php";
pub const LIVE_VALIDATOR_URL: &str = "https://securepay.sslcommerz.com/validator/api/validationserverAPI.php";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub store_id: String,
    pub store_password: Secret<String>,
    pub sandbox: bool,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            store_id: String::default(),
            store_password: Secret::default(),
            sandbox: true,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl GatewayConfig {
    pub fn new<S: Into<String>>(store_id: S, store_password: S, sandbox: bool) -> Self {
        Self { store_id: store_id.into(), store_password: Secret::new(store_password.into()), sandbox, ..Default::default() }
    }

    /// Missing credentials are not an error here. The server refuses to process gateway callbacks until they are set,
    /// see [`GatewayConfig::has_credentials`].
    pub fn new_from_env_or_default() -> Self {
        let store_id = std::env::var("SSE_GATEWAY_STORE_ID").unwrap_or_else(|_| {
            warn!("🪛️ SSE_GATEWAY_STORE_ID not set. Gateway callbacks will be refused");
            String::default()
        });
        let store_password = Secret::new(std::env::var("SSE_GATEWAY_STORE_PASSWORD").unwrap_or_else(|_| {
            warn!("🪛️ SSE_GATEWAY_STORE_PASSWORD not set. Gateway callbacks will be refused");
            String::default()
        }));
        let sandbox = env_flag("SSE_GATEWAY_SANDBOX", true);
        let timeout = std::env::var("SSE_GATEWAY_TIMEOUT_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid SSE_GATEWAY_TIMEOUT_MS ({s}): {e}. Using the default"))
                    .ok()
            })
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MS));
        Self { store_id, store_password, sandbox, timeout }
    }

    pub fn has_credentials(&self) -> bool {
        !self.store_id.trim().is_empty() && !self.store_password.is_blank()
    }

    pub fn validator_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_VALIDATOR_URL
        } else {
            LIVE_VALIDATOR_URL
        }
    }
}
