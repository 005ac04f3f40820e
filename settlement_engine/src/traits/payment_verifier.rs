use thiserror::Error;

use crate::settlement_objects::PaymentAssertion;

#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    #[error("The payment gateway could not be reached. {0}")]
    Unreachable(String),
    #[error("The payment gateway returned an error. Status {status}: {message}")]
    UpstreamError { status: u16, message: String },
    #[error("Could not interpret the payment gateway response. {0}")]
    InvalidResponse(String),
}

/// Asks the payment gateway, with server-held credentials, whether a payment identified by its validation id is real,
/// and for how much.
#[allow(async_fn_in_trait)]
pub trait PaymentVerifier {
    async fn verify(&self, val_id: &str) -> Result<PaymentAssertion, VerificationError>;
}
