//! Membership tiers are derived from a customer's cumulative spend. Settlements can promote a customer, never demote.
use std::env;

use log::*;
use serde::{Deserialize, Serialize};
use settlement_common::Money;

use crate::db_types::MembershipTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub gold: Money,
    pub platinum: Money,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { gold: Money::from_units(10_000), platinum: Money::from_units(50_000) }
    }
}

impl TierThresholds {
    pub fn from_env() -> Self {
        let default = Self::default();
        let gold = money_from_env("SSE_GOLD_THRESHOLD", default.gold);
        let platinum = money_from_env("SSE_PLATINUM_THRESHOLD", default.platinum);
        Self { gold, platinum }
    }
}

/// Loyalty points awarded per whole 100 currency units spent, by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRates {
    pub silver: i64,
    pub gold: i64,
    pub platinum: i64,
}

impl Default for PointsRates {
    fn default() -> Self {
        Self { silver: 1, gold: 2, platinum: 3 }
    }
}

impl PointsRates {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            silver: int_from_env("SSE_POINTS_RATE_SILVER", default.silver),
            gold: int_from_env("SSE_POINTS_RATE_GOLD", default.gold),
            platinum: int_from_env("SSE_POINTS_RATE_PLATINUM", default.platinum),
        }
    }

    pub fn points_per_hundred(&self, tier: MembershipTier) -> i64 {
        match tier {
            MembershipTier::Silver => self.silver,
            MembershipTier::Gold => self.gold,
            MembershipTier::Platinum => self.platinum,
        }
    }

    /// `floor(amount / 100) * rate`. Negative amounts earn nothing.
    pub fn points_for(&self, amount: Money, tier: MembershipTier) -> i64 {
        let hundreds = amount.whole_units().max(0) / 100;
        hundreds * self.points_per_hundred(tier)
    }
}

/// Returns the tier a customer should hold after their cumulative spend reaches `total_spent`.
pub fn evaluate(current: MembershipTier, total_spent: Money, thresholds: &TierThresholds) -> MembershipTier {
    if total_spent >= thresholds.platinum {
        MembershipTier::Platinum
    } else if total_spent >= thresholds.gold && current == MembershipTier::Silver {
        MembershipTier::Gold
    } else {
        current
    }
}

fn money_from_env(name: &str, default: Money) -> Money {
    match env::var(name).ok().map(|s| s.parse::<Money>()) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!("🪛️ {name} is not a valid amount ({e}). Using the default, {default}");
            default
        },
        None => {
            info!("🪛️ {name} is not set. Using the default, {default}");
            default
        },
    }
}

fn int_from_env(name: &str, default: i64) -> i64 {
    match env::var(name).ok().map(|s| s.parse::<i64>()) {
        Some(Ok(v)) if v >= 0 => v,
        Some(_) => {
            warn!("🪛️ {name} is not a valid non-negative integer. Using the default, {default}");
            default
        },
        None => default,
    }
}
