use mockall::mock;
use settlement_engine::{
    settlement_objects::PaymentAssertion,
    traits::{PaymentVerifier, VerificationError},
};

mock! {
    pub Verifier {}
    impl PaymentVerifier for Verifier {
        async fn verify(&self, val_id: &str) -> Result<PaymentAssertion, VerificationError>;
    }
}
