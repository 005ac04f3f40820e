use settlement_common::Money;
use thiserror::Error;

use crate::db_types::{ConversionError, SettlementId};

/// Sqlite primary result codes that indicate another writer holds the lock, or that our read snapshot is stale.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Settlement rejected. {0}")]
    ValidationRejected(String),
    #[error("{0} has already been settled")]
    AlreadySettled(SettlementId),
    #[error(
        "Insufficient stock for {product_id}/{sku} at outlet {outlet_id}. {available} available, {requested} \
         requested"
    )]
    InsufficientStock { product_id: String, sku: String, outlet_id: String, available: i64, requested: i64 },
    #[error("Gift card {code} has a balance of {balance}, but {requested} was requested")]
    InsufficientBalance { code: String, balance: Money, requested: Money },
    #[error("User {user_id} has {available} loyalty points, but {requested} were requested")]
    InsufficientPoints { user_id: String, available: i64, requested: i64 },
    #[error("Gift card {0} cannot be used. {1}")]
    GiftCardInvalid(String, String),
    #[error("Variant {sku} does not exist on product {product_id}")]
    VariantNotFound { product_id: String, sku: String },
    #[error("The requested {0} does not exist")]
    NotFound(String),
    #[error("A concurrent update touched the same documents. {0}")]
    Contention(String),
    #[error("The settlement transaction timed out")]
    TransactionTimeout,
    #[error("Gave up after {attempts} attempts due to write contention")]
    ContentionExhausted { attempts: u32 },
    #[error("Could not verify the payment with the gateway. {0}")]
    UpstreamVerificationFailure(String),
    #[error("Internal database error. {0}")]
    DatabaseError(String),
}

impl SettlementError {
    /// Conflicts and timeouts are retried from scratch with fresh reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_) | Self::TransactionTimeout)
    }

    /// Whether a failed settlement should mark its record as canceled.
    ///
    /// Infrastructure failures leave the record in its pending state so that a later callback can settle it. Duplicate
    /// settlements never touch the record.
    pub fn requires_cancellation(&self) -> bool {
        match self {
            Self::ValidationRejected(_) |
            Self::InsufficientStock { .. } |
            Self::InsufficientBalance { .. } |
            Self::InsufficientPoints { .. } |
            Self::GiftCardInvalid(..) |
            Self::VariantNotFound { .. } |
            Self::NotFound(_) => true,
            Self::AlreadySettled(_) |
            Self::Contention(_) |
            Self::TransactionTimeout |
            Self::ContentionExhausted { .. } |
            Self::UpstreamVerificationFailure(_) |
            Self::DatabaseError(_) => false,
        }
    }

    /// A short, stable label for the error. It is stored as the prefix of a canceled record's `status_reason`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationRejected(_) => "validation_rejected",
            Self::AlreadySettled(_) => "already_settled",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::InsufficientPoints { .. } => "insufficient_points",
            Self::GiftCardInvalid(..) => "gift_card_invalid",
            Self::VariantNotFound { .. } => "variant_not_found",
            Self::NotFound(_) => "not_found",
            Self::Contention(_) => "contention",
            Self::TransactionTimeout => "transaction_timeout",
            Self::ContentionExhausted { .. } => "contention_exhausted",
            Self::UpstreamVerificationFailure(_) => "upstream_verification_failure",
            Self::DatabaseError(_) => "database_error",
        }
    }

    pub fn not_found<S: std::fmt::Display>(what: &str, id: S) -> Self {
        Self::NotFound(format!("{what} {id}"))
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => SettlementError::Contention(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().and_then(|c| c.parse::<i32>().ok()).unwrap_or_default();
                // Extended result codes carry the primary code in the low byte
                match code & 0xff {
                    SQLITE_BUSY | SQLITE_LOCKED => SettlementError::Contention(e.to_string()),
                    _ => SettlementError::DatabaseError(e.to_string()),
                }
            },
            _ => SettlementError::DatabaseError(e.to_string()),
        }
    }
}

impl From<ConversionError> for SettlementError {
    fn from(e: ConversionError) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for SettlementError {
    fn from(e: serde_json::Error) -> Self {
        SettlementError::DatabaseError(format!("Malformed document. {e}"))
    }
}
