use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Gateway credentials have not been configured")]
    MissingCredentials,
    #[error("Validation request failed: {0}")]
    RequestError(String),
    #[error("Validation failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}
