use gateway_tools::{GatewayApi, GatewayApiError, ValidationResponse};
use log::*;
use settlement_engine::{
    settlement_objects::PaymentAssertion,
    traits::{PaymentVerifier, VerificationError},
};

/// Verifies gateway payments through the gateway's validation API.
#[derive(Clone)]
pub struct GatewayVerifier {
    api: GatewayApi,
}

impl GatewayVerifier {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }

    pub fn has_credentials(&self) -> bool {
        self.api.config().has_credentials()
    }
}

impl PaymentVerifier for GatewayVerifier {
    async fn verify(&self, val_id: &str) -> Result<PaymentAssertion, VerificationError> {
        let response = self.api.validate(val_id).await.map_err(|e| {
            warn!("💳️ Validation request for {val_id} failed. {e}");
            verification_error(e)
        })?;
        Ok(assertion_from_response(response))
    }
}

pub fn assertion_from_response(response: ValidationResponse) -> PaymentAssertion {
    PaymentAssertion {
        valid: response.is_valid(),
        tran_id: response.tran_id,
        amount: response.amount,
        val_id: response.val_id,
        bank_tran_id: response.bank_tran_id,
        card_type: response.card_type,
        currency: response.currency,
    }
}

fn verification_error(e: GatewayApiError) -> VerificationError {
    match e {
        GatewayApiError::QueryError { status, message } => VerificationError::UpstreamError { status, message },
        GatewayApiError::JsonError(s) => VerificationError::InvalidResponse(s),
        e => VerificationError::Unreachable(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use gateway_tools::parse_validation_response;
    use settlement_common::Money;

    use super::*;

    #[test]
    fn validated_payments_are_valid() {
        let response = parse_validation_response(
            r#"{"status": "VALIDATED", "tran_id": "O1", "val_id": "V1", "amount": "800.00", "currency": "BDT"}"#,
        )
        .unwrap();
        let assertion = assertion_from_response(response);
        assert!(assertion.valid);
        assert_eq!(assertion.tran_id, "O1");
        assert_eq!(assertion.amount, Money::from_units(800));
    }

    #[test]
    fn unknown_validation_ids_are_invalid() {
        let response = parse_validation_response(r#"{"status": "INVALID_TRANSACTION"}"#).unwrap();
        assert!(!assertion_from_response(response).valid);
    }

    #[test]
    fn error_mapping() {
        let e = verification_error(GatewayApiError::QueryError { status: 502, message: "Bad gateway".into() });
        assert!(matches!(e, VerificationError::UpstreamError { status: 502, .. }));
        let e = verification_error(GatewayApiError::RequestError("timed out".into()));
        assert!(matches!(e, VerificationError::Unreachable(_)));
    }
}
