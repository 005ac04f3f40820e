//! Gift-card debits and the loyalty points ledger.
//!
//! A user's `loyalty_points` is a cache of their points history. Every change to it is staged together with the
//! history entry that explains it, inside the same unit of work.
use chrono::Utc;
use log::*;
use settlement_common::Money;

use crate::{
    db_types::{GiftCard, NewPointsEntry, SettlementId},
    settlement_api::{tier_evaluator::PointsRates, unit_of_work::UnitOfWork},
    traits::SettlementDatabase,
    SettlementError,
};

pub async fn debit_gift_card<B: SettlementDatabase>(
    uow: &mut UnitOfWork<'_, B>,
    code: &str,
    amount: Money,
) -> Result<GiftCard, SettlementError> {
    let mut card = uow.gift_card(code).await?;
    if !card.enabled {
        return Err(SettlementError::GiftCardInvalid(code.to_string(), "The card is disabled".into()));
    }
    if card.is_expired(Utc::now()) {
        return Err(SettlementError::GiftCardInvalid(code.to_string(), "The card has expired".into()));
    }
    if card.balance < amount {
        return Err(SettlementError::InsufficientBalance {
            code: code.to_string(),
            balance: card.balance,
            requested: amount,
        });
    }
    card.balance -= amount;
    debug!("🎁️ Gift card {code} debited by {amount}. {} remaining", card.balance);
    uow.stage_gift_card(card.clone());
    Ok(card)
}

pub async fn redeem_points<B: SettlementDatabase>(
    uow: &mut UnitOfWork<'_, B>,
    user_id: &str,
    points: i64,
    settlement: &SettlementId,
) -> Result<(), SettlementError> {
    if points < 0 {
        return Err(SettlementError::ValidationRejected(format!("Cannot redeem a negative number of points ({points})")));
    }
    let mut user = uow.user(user_id).await?;
    if user.loyalty_points < points {
        return Err(SettlementError::InsufficientPoints {
            user_id: user_id.to_string(),
            available: user.loyalty_points,
            requested: points,
        });
    }
    user.loyalty_points -= points;
    uow.stage_user(user);
    uow.append_points(NewPointsEntry::redeem(user_id, points, settlement.as_str().to_string()));
    debug!("🎁️ {points} points redeemed by {user_id} for {settlement}");
    Ok(())
}

/// Awards points for `amount` at the rate of the user's tier *as it is in the unit of work right now*. Call this
/// before staging a promotion if the pre-promotion rate should apply.
///
/// Returns the number of points earned, which may be zero. Nothing is staged for zero points.
pub async fn accrue_points<B: SettlementDatabase>(
    uow: &mut UnitOfWork<'_, B>,
    user_id: &str,
    amount: Money,
    rates: &PointsRates,
    reason: String,
) -> Result<i64, SettlementError> {
    let mut user = uow.user(user_id).await?;
    let earned = rates.points_for(amount, user.membership_tier);
    if earned == 0 {
        trace!("🎁️ {amount} earns no points for {user_id}");
        return Ok(0);
    }
    user.loyalty_points += earned;
    uow.stage_user(user);
    uow.append_points(NewPointsEntry::earn(user_id, earned, reason));
    debug!("🎁️ {user_id} earned {earned} points on {amount}");
    Ok(earned)
}
