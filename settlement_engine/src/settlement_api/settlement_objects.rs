use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settlement_common::Money;

use crate::db_types::{LifecycleStatus, MembershipTier, NewPosSale, Order, PaymentStatus, SettlementId};

/// The gateway statuses that indicate a successful payment. `VALIDATED` is returned when a payment has been validated
/// before.
pub const GATEWAY_VALID_STATUSES: [&str; 2] = ["VALID", "VALIDATED"];

/// The raw, untrusted notification the payment gateway posts to the callback endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayCallback {
    pub tran_id: String,
    pub val_id: Option<String>,
    pub status: String,
}

impl GatewayCallback {
    pub fn new<S: Into<String>>(tran_id: S, val_id: Option<&str>, status: S) -> Self {
        Self { tran_id: tran_id.into(), val_id: val_id.map(String::from), status: status.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status == "VALID"
    }
}

/// What the gateway asserts about a payment after server-to-server validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAssertion {
    pub valid: bool,
    pub tran_id: String,
    pub amount: Money,
    pub val_id: Option<String>,
    pub bank_tran_id: Option<String>,
    pub card_type: Option<String>,
    pub currency: Option<String>,
}

impl PaymentAssertion {
    pub fn valid<S: Into<String>>(tran_id: S, amount: Money) -> Self {
        Self {
            valid: true,
            tran_id: tran_id.into(),
            amount,
            val_id: None,
            bank_tran_id: None,
            card_type: None,
            currency: None,
        }
    }

    pub fn is_valid_status(status: &str) -> bool {
        GATEWAY_VALID_STATUSES.contains(&status)
    }
}

/// A request to settle an order or a sale.
#[derive(Debug, Clone)]
pub enum SettlementRequest {
    /// A verified gateway payment for an existing online order.
    Online { id: SettlementId, payment: PaymentAssertion },
    /// A completed POS sale. POS sales are not verified externally.
    Pos(NewPosSale),
}

impl SettlementRequest {
    pub fn id(&self) -> &SettlementId {
        match self {
            SettlementRequest::Online { id, .. } => id,
            SettlementRequest::Pos(sale) => &sale.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    /// A regular online order, paid in full.
    Full,
    /// The deposit of a pre-order.
    Deposit,
    /// The balance of a pre-order.
    FinalPayment,
    PosSale,
}

impl Display for SettlementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementKind::Full => write!(f, "full payment"),
            SettlementKind::Deposit => write!(f, "deposit"),
            SettlementKind::FinalPayment => write!(f, "final payment"),
            SettlementKind::PosSale => write!(f, "POS sale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub user_id: String,
    pub from: MembershipTier,
    pub to: MembershipTier,
    pub total_spent: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub id: SettlementId,
    pub kind: SettlementKind,
    pub user_id: Option<String>,
    pub status: LifecycleStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Money,
    pub gift_card_debited: Money,
    pub points_redeemed: i64,
    pub points_earned: i64,
    /// The number of variant lines whose stock was deducted.
    pub stock_lines: usize,
    pub tier_change: Option<TierChange>,
    /// The number of attempts it took to commit the settlement.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub order: Order,
    pub points_earned: i64,
}
