use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{config::GatewayConfig, GatewayApiError, ValidationResponse};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Asks the gateway whether the payment identified by `val_id` is genuine.
    ///
    /// Any well-formed answer is returned as-is, including `INVALID_TRANSACTION` and friends; it is up to the caller to
    /// check [`ValidationResponse::is_valid`]. Errors mean the gateway could not give an answer.
    pub async fn validate(&self, val_id: &str) -> Result<ValidationResponse, GatewayApiError> {
        if !self.config.has_credentials() {
            return Err(GatewayApiError::MissingCredentials);
        }
        let url = self.config.validator_url();
        trace!("💳️ Sending validation request for {val_id} to {url}");
        let params = [
            ("val_id", val_id),
            ("store_id", self.config.store_id.as_str()),
            ("store_passwd", self.config.store_password.reveal().as_str()),
            ("format", "json"),
        ];
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| GatewayApiError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| GatewayApiError::RequestError(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayApiError::QueryError { status: status.as_u16(), message: body });
        }
        let result = parse_validation_response(&body)?;
        debug!(
            "💳️ Validation of {val_id}: status {} for transaction {} ({})",
            result.status, result.tran_id, result.amount
        );
        Ok(result)
    }
}

pub fn parse_validation_response(body: &str) -> Result<ValidationResponse, GatewayApiError> {
    serde_json::from_str(body).map_err(|e| GatewayApiError::JsonError(format!("{e}. Response body: {body}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn refuses_to_validate_without_credentials() {
        let api = GatewayApi::new(GatewayConfig::default()).unwrap();
        let err = api.validate("VAL-1").await.unwrap_err();
        assert!(matches!(err, GatewayApiError::MissingCredentials));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let err = parse_validation_response("<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, GatewayApiError::JsonError(_)));
    }
}
