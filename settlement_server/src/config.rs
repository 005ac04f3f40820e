use std::env;

use gateway_tools::GatewayConfig;
use log::*;
use settlement_common::{helpers::env_flag, Secret};
use settlement_engine::SettlementConfig;

const DEFAULT_SSE_HOST: &str = "127.0.0.1";
const DEFAULT_SSE_PORT: u16 = 8360;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
pub const POS_HMAC_HEADER: &str = "X-POS-Hmac-Sha256";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Credentials and endpoint for server-to-server payment validation
    pub gateway: GatewayConfig,
    /// Retry, membership and points settings for the settlement engine
    pub settlement: SettlementConfig,
    pub pos: PosConfig,
    /// Where tier promotion notifications are posted. If `None`, notifications are only logged.
    pub notification_url: Option<String>,
}

/// Back-office requests (POS commits, stock receipts, order completion) are signed with a shared secret.
#[derive(Clone, Debug, Default)]
pub struct PosConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SSE_HOST.to_string(),
            port: DEFAULT_SSE_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            gateway: GatewayConfig::default(),
            settlement: SettlementConfig::default(),
            pos: PosConfig { hmac_secret: Secret::default(), hmac_checks: true },
            notification_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SSE_HOST").ok().unwrap_or_else(|| DEFAULT_SSE_HOST.into());
        let port = env::var("SSE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SSE_PORT. {e} Using the default, {DEFAULT_SSE_PORT}, instead."
                    );
                    DEFAULT_SSE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SSE_PORT);
        let database_url = env::var("SSE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SSE_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let db_max_connections = env::var("SSE_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ {s} is not a valid value for SSE_DB_MAX_CONNECTIONS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let gateway = GatewayConfig::new_from_env_or_default();
        let settlement = SettlementConfig::from_env();
        let pos = PosConfig::from_env_or_defaults();
        let notification_url = env::var("SSE_NOTIFICATION_URL").ok().filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            info!("🪛️ SSE_NOTIFICATION_URL is not set. Tier promotion notifications will only be logged.");
        }
        Self { host, port, database_url, db_max_connections, gateway, settlement, pos, notification_url }
    }
}

impl PosConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("SSE_POS_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SSE_POS_HMAC_SECRET is not set. Please set it to the signing key shared with the POS terminals.");
            String::default()
        });
        let hmac_checks = env_flag("SSE_POS_HMAC_CHECKS", true);
        if !hmac_checks {
            warn!("🚨️ HMAC checks for back-office requests are DISABLED. Anyone can record POS sales.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}
