use serde::{Deserialize, Serialize};

use crate::{
    db_types::SettlementId,
    settlement_objects::{SettlementOutcome, TierChange},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCompletedEvent {
    pub outcome: SettlementOutcome,
}

impl SettlementCompletedEvent {
    pub fn new(outcome: SettlementOutcome) -> Self {
        Self { outcome }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFailedEvent {
    pub id: SettlementId,
    pub kind: String,
    pub reason: String,
    /// Whether the record was marked as canceled.
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPromotedEvent {
    pub settlement_id: SettlementId,
    pub change: TierChange,
}

impl TierPromotedEvent {
    pub fn new(settlement_id: SettlementId, change: TierChange) -> Self {
        Self { settlement_id, change }
    }
}
