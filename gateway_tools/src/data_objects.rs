use serde::{Deserialize, Serialize};
use settlement_common::{decimal_serde, Money};

/// Statuses the validator uses for a genuine payment. `VALIDATED` means the payment was validated before.
pub const VALID_STATUSES: [&str; 2] = ["VALID", "VALIDATED"];

/// The validator's answer for a single validation id.
///
/// Amounts arrive as decimal strings (`"1000.00"`) and are parsed exactly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationResponse {
    pub status: String,
    #[serde(default)]
    pub tran_id: String,
    #[serde(default)]
    pub val_id: Option<String>,
    /// Absent when the validation id is unknown.
    #[serde(default, with = "decimal_serde")]
    pub amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub bank_tran_id: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub tran_date: Option<String>,
}

impl ValidationResponse {
    pub fn is_valid(&self) -> bool {
        VALID_STATUSES.contains(&self.status.as_str())
    }
}
