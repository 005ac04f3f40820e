use std::fmt::Debug;

use chrono::Utc;
use log::*;
use settlement_common::{Money, AMOUNT_TOLERANCE};

use crate::{
    db_types::{LifecycleStatus, NewPosSale, Order, PaymentMeta, PaymentStatus, SettlementId, Variant},
    events::{EventProducers, SettlementCompletedEvent, SettlementFailedEvent, TierPromotedEvent},
    settlement_api::{
        inventory_ledger,
        retry_policy::RetryPolicy,
        tier_evaluator::{self, PointsRates, TierThresholds},
        unit_of_work::UnitOfWork,
        wallet_rewards,
    },
    settlement_objects::{
        CompletionOutcome,
        GatewayCallback,
        PaymentAssertion,
        SettlementKind,
        SettlementOutcome,
        SettlementRequest,
        TierChange,
    },
    traits::{ChangeSet, FailureRecord, PaymentVerifier, SettlementDatabase},
    SettlementError,
};

#[derive(Debug, Clone, Default)]
pub struct SettlementConfig {
    pub retry: RetryPolicy,
    pub thresholds: TierThresholds,
    pub points_rates: PointsRates,
}

impl SettlementConfig {
    pub fn from_env() -> Self {
        Self {
            retry: RetryPolicy::from_env(),
            thresholds: TierThresholds::from_env(),
            points_rates: PointsRates::from_env(),
        }
    }
}

/// `SettlementFlowApi` is the settlement coordinator. It turns gateway confirmations and POS commits into atomic
/// changes to orders, stock, gift cards, loyalty points and membership tiers.
///
/// Every operation runs as a series of attempts. Each attempt opens a fresh [`UnitOfWork`], re-reads everything it
/// needs, validates, stages its writes and commits them in one version-checked transaction. Attempts that lose a race
/// are retried according to the [`RetryPolicy`].
pub struct SettlementFlowApi<B> {
    db: B,
    config: SettlementConfig,
    producers: EventProducers,
}

impl<B> Debug for SettlementFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementFlowApi")
    }
}

impl<B> SettlementFlowApi<B> {
    pub fn new(db: B, config: SettlementConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

/// The result of staging a settlement: the writes to commit, and what to report once they are committed.
type Staged<T> = (ChangeSet, T);

impl<B> SettlementFlowApi<B>
where B: SettlementDatabase
{
    /// Settles an order or a POS sale.
    ///
    /// On success the settlement-completed (and, if applicable, tier-promoted) hooks are notified. If the settlement
    /// fails for a reason that makes the record unsettleable, the record is marked as canceled in a separate write.
    /// A record that has already been settled is left alone and [`SettlementError::AlreadySettled`] is returned.
    pub async fn settle(&self, request: SettlementRequest) -> Result<SettlementOutcome, SettlementError> {
        let id = request.id().clone();
        let label = format!("Settlement of {id}");
        let result = self.config.retry.run(&label, |attempt| self.settlement_attempt(&request, attempt)).await;
        match result {
            Ok((mut outcome, attempts)) => {
                outcome.attempts = attempts;
                info!(
                    "🧾️ {id} settled ({}). {} paid, {} stock lines, {} points redeemed, {} earned",
                    outcome.kind,
                    outcome.amount_paid,
                    outcome.stock_lines,
                    outcome.points_redeemed,
                    outcome.points_earned
                );
                self.call_settlement_completed_hooks(&outcome);
                Ok(outcome)
            },
            Err(e) => {
                self.handle_failure(failure_record_for(&request, &e), &e).await;
                Err(e)
            },
        }
    }

    /// Handles a payment gateway notification.
    ///
    /// The notification itself is never trusted. A non-`VALID` status cancels the order without contacting the
    /// gateway. Otherwise the payment is verified server-to-server through `verifier`, and the order is settled for
    /// the verified amount. If the gateway cannot be reached, the order is left untouched so that a later notification
    /// can still settle it.
    pub async fn process_gateway_callback<V: PaymentVerifier>(
        &self,
        callback: GatewayCallback,
        verifier: &V,
    ) -> Result<SettlementOutcome, SettlementError> {
        let id = callback
            .tran_id
            .parse::<SettlementId>()
            .map_err(|_| SettlementError::ValidationRejected("The callback has no transaction id".into()))?;
        if !callback.is_success() {
            let e = SettlementError::ValidationRejected(format!("Gateway reported status '{}'", callback.status));
            return Err(self.cancel_order(&id, e).await);
        }
        let val_id = match callback.val_id.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => {
                let e = SettlementError::ValidationRejected("The callback has no validation id".into());
                return Err(self.cancel_order(&id, e).await);
            },
        };
        debug!("🧾️ Verifying payment for {id} with the gateway (val_id {val_id})");
        let payment = verifier.verify(&val_id).await.map_err(|e| {
            error!("🧾️ Could not verify payment for {id}: {e}. The order has not been modified");
            SettlementError::UpstreamVerificationFailure(e.to_string())
        })?;
        if payment.tran_id != id.as_str() {
            let e = SettlementError::ValidationRejected(format!(
                "Validation id {val_id} belongs to transaction {}, not {}",
                payment.tran_id,
                id.as_str()
            ));
            return Err(self.cancel_order(&id, e).await);
        }
        self.settle(SettlementRequest::Online { id, payment }).await
    }

    /// Adds received goods to an outlet's stock in its own optimistic transaction.
    pub async fn receive_stock(
        &self,
        product_id: &str,
        sku: &str,
        outlet_id: &str,
        quantity: i64,
    ) -> Result<Variant, SettlementError> {
        let label = format!("Stock receipt for {product_id}/{sku}");
        let (variant, _) = self
            .config
            .retry
            .run(&label, move |_| async move {
                let mut uow = UnitOfWork::new(&self.db);
                let variant = inventory_ledger::receive(&mut uow, product_id, sku, outlet_id, quantity).await?;
                self.db.commit(uow.into_change_set()).await?;
                Ok(variant)
            })
            .await?;
        info!("📦️ Received {quantity} of {product_id}/{sku} at {outlet_id}. {} in stock", variant.stock);
        Ok(variant)
    }

    /// Marks a settled order as completed (delivered) and awards the deferred loyalty points for it, at the user's
    /// tier at the time of completion.
    pub async fn complete_order(&self, id: &SettlementId) -> Result<CompletionOutcome, SettlementError> {
        let label = format!("Completion of {id}");
        let (outcome, _) = self
            .config
            .retry
            .run(&label, move |_| async move {
                let mut uow = UnitOfWork::new(&self.db);
                let mut order = uow.order(id).await?;
                if order.status != LifecycleStatus::Settled {
                    return Err(SettlementError::ValidationRejected(format!(
                        "Order {id} cannot be completed from status {}",
                        order.status
                    )));
                }
                let points_earned = match order.user_id.as_deref() {
                    Some(user_id) => {
                        let reason = format!("{} completed", id.as_str());
                        let amount = order.order_value();
                        wallet_rewards::accrue_points(&mut uow, user_id, amount, &self.config.points_rates, reason)
                            .await?
                    },
                    None => 0,
                };
                order.status = LifecycleStatus::Completed;
                order.updated_at = Utc::now();
                uow.stage_order(order.clone());
                self.db.commit(uow.into_change_set()).await?;
                Ok(CompletionOutcome { order, points_earned })
            })
            .await?;
        info!("🧾️ {id} completed. {} points awarded", outcome.points_earned);
        Ok(outcome)
    }

    /// Asks the customer for the balance of a pre-order, once the goods are ready.
    pub async fn request_final_payment(&self, id: &SettlementId) -> Result<Order, SettlementError> {
        let label = format!("Final payment request for {id}");
        let (order, _) = self
            .config
            .retry
            .run(&label, move |_| async move {
                let mut uow = UnitOfWork::new(&self.db);
                let mut order = uow.order(id).await?;
                if order.status != LifecycleStatus::PreOrdered {
                    return Err(SettlementError::ValidationRejected(format!(
                        "Order {id} is not awaiting its goods (status {})",
                        order.status
                    )));
                }
                order.status = LifecycleStatus::AwaitingFinalPayment;
                order.updated_at = Utc::now();
                uow.stage_order(order.clone());
                self.db.commit(uow.into_change_set()).await?;
                Ok(order)
            })
            .await?;
        info!("🧾️ {id} is now awaiting its final payment of {}", order.expected_payable());
        Ok(order)
    }

    pub async fn fetch_order(&self, id: &SettlementId) -> Result<Order, SettlementError> {
        self.db.fetch_order(id).await?.ok_or_else(|| SettlementError::not_found("order", id))
    }

    //------------------------------------------   Private methods  ---------------------------------------------------

    async fn settlement_attempt(
        &self,
        request: &SettlementRequest,
        attempt: u32,
    ) -> Result<SettlementOutcome, SettlementError> {
        trace!("🧾️ Settlement of {} attempt {attempt}", request.id());
        // Only the read-validate-stage phase is bounded. Abandoning a commit mid-flight would leave its outcome unknown.
        let (changes, outcome) =
            tokio::time::timeout(self.config.retry.transaction_timeout, self.stage_settlement(request))
                .await
                .map_err(|_| SettlementError::TransactionTimeout)??;
        trace!("🧾️ Committing {} writes for {}", changes.write_count(), request.id());
        self.db.commit(changes).await?;
        Ok(outcome)
    }

    async fn stage_settlement(&self, request: &SettlementRequest) -> Result<Staged<SettlementOutcome>, SettlementError> {
        let mut uow = UnitOfWork::new(&self.db);
        let outcome = match request {
            SettlementRequest::Online { id, payment } => self.stage_online(&mut uow, id, payment).await?,
            SettlementRequest::Pos(sale) => self.stage_pos_sale(&mut uow, sale).await?,
        };
        Ok((uow.into_change_set(), outcome))
    }

    async fn stage_online(
        &self,
        uow: &mut UnitOfWork<'_, B>,
        id: &SettlementId,
        payment: &PaymentAssertion,
    ) -> Result<SettlementOutcome, SettlementError> {
        let mut order = uow.order(id).await?;
        match order.status {
            LifecycleStatus::AwaitingPayment | LifecycleStatus::AwaitingFinalPayment => {},
            LifecycleStatus::Settled | LifecycleStatus::PreOrdered | LifecycleStatus::Completed => {
                return Err(SettlementError::AlreadySettled(id.clone()));
            },
            LifecycleStatus::Canceled => {
                return Err(SettlementError::ValidationRejected(format!("Order {id} has been canceled")));
            },
        }
        let expected = order.expected_payable();
        if !expected.matches_within(payment.amount, AMOUNT_TOLERANCE) {
            return Err(SettlementError::ValidationRejected(format!(
                "Paid amount {} does not match the expected {expected}",
                payment.amount
            )));
        }
        if !payment.valid {
            return Err(SettlementError::ValidationRejected("The gateway did not confirm the payment".into()));
        }

        let kind = match (order.status, order.is_pre_order) {
            (LifecycleStatus::AwaitingFinalPayment, _) => SettlementKind::FinalPayment,
            (_, true) => SettlementKind::Deposit,
            (_, false) => SettlementKind::Full,
        };
        let mut outcome = SettlementOutcome {
            id: id.clone(),
            kind,
            user_id: order.user_id.clone(),
            status: LifecycleStatus::Settled,
            payment_status: PaymentStatus::Paid,
            amount_paid: expected,
            gift_card_debited: Money::zero(),
            points_redeemed: 0,
            points_earned: 0,
            stock_lines: 0,
            tier_change: None,
            attempts: 0,
        };
        if kind != SettlementKind::FinalPayment {
            let movements = inventory_ledger::reserve_and_commit(uow, order.outlet_id.as_deref(), &order.items).await?;
            outcome.stock_lines = movements.len();
            if let Some(code) = order.gift_card_code.as_deref() {
                wallet_rewards::debit_gift_card(uow, code, order.totals.gift_card_discount).await?;
                outcome.gift_card_debited = order.totals.gift_card_discount;
            }
            if order.points_used > 0 {
                let user_id = order.user_id.as_deref().ok_or_else(|| {
                    SettlementError::ValidationRejected(format!("Order {id} redeems points but has no user"))
                })?;
                wallet_rewards::redeem_points(uow, user_id, order.points_used, id).await?;
                outcome.points_redeemed = order.points_used;
            }
        }
        if let Some(user_id) = order.user_id.as_deref() {
            outcome.tier_change = self.record_spend(uow, user_id, expected).await?;
        }
        if kind == SettlementKind::Deposit {
            outcome.status = LifecycleStatus::PreOrdered;
            outcome.payment_status = PaymentStatus::DepositPaid;
        }
        let now = Utc::now();
        order.status = outcome.status;
        order.payment_status = outcome.payment_status;
        order.status_reason = None;
        order.payment_meta = Some(PaymentMeta {
            val_id: payment.val_id.clone(),
            bank_tran_id: payment.bank_tran_id.clone(),
            card_type: payment.card_type.clone(),
            currency: payment.currency.clone(),
            amount: payment.amount,
            settled_at: now,
        });
        order.updated_at = now;
        uow.stage_order(order);
        Ok(outcome)
    }

    async fn stage_pos_sale(
        &self,
        uow: &mut UnitOfWork<'_, B>,
        sale: &NewPosSale,
    ) -> Result<SettlementOutcome, SettlementError> {
        if let Some(existing) = uow.existing_pos_sale(&sale.id).await? {
            return match existing.status {
                LifecycleStatus::Canceled => Err(SettlementError::ValidationRejected(format!(
                    "POS sale {} was previously rejected. {}",
                    sale.id,
                    existing.status_reason.unwrap_or_default()
                ))),
                _ => Err(SettlementError::AlreadySettled(sale.id.clone())),
            };
        }
        validate_pos_sale(sale)?;
        let mut outcome = SettlementOutcome {
            id: sale.id.clone(),
            kind: SettlementKind::PosSale,
            user_id: sale.user_id.clone(),
            status: LifecycleStatus::Settled,
            payment_status: PaymentStatus::Paid,
            amount_paid: sale.totals.total_amount,
            gift_card_debited: Money::zero(),
            points_redeemed: 0,
            points_earned: 0,
            stock_lines: 0,
            tier_change: None,
            attempts: 0,
        };
        let movements = inventory_ledger::reserve_and_commit(uow, Some(&sale.outlet_id), &sale.items).await?;
        outcome.stock_lines = movements.len();
        if let Some(code) = sale.gift_card_code.as_deref() {
            wallet_rewards::debit_gift_card(uow, code, sale.totals.gift_card_discount).await?;
            outcome.gift_card_debited = sale.totals.gift_card_discount;
        }
        match sale.user_id.as_deref() {
            Some(user_id) => {
                if sale.points_used > 0 {
                    wallet_rewards::redeem_points(uow, user_id, sale.points_used, &sale.id).await?;
                    outcome.points_redeemed = sale.points_used;
                }
                // Points accrue at the tier the customer held when they walked in
                let reason = sale.id.as_str().to_string();
                let rates = &self.config.points_rates;
                outcome.points_earned =
                    wallet_rewards::accrue_points(uow, user_id, sale.totals.total_amount, rates, reason).await?;
                outcome.tier_change = self.record_spend(uow, user_id, sale.totals.total_amount).await?;
            },
            None if sale.points_used > 0 => {
                return Err(SettlementError::ValidationRejected(format!(
                    "POS sale {} redeems points but has no customer",
                    sale.id
                )));
            },
            None => {},
        }
        let record = sale.clone().into_sale(LifecycleStatus::Settled, PaymentStatus::Paid, outcome.points_earned);
        uow.insert_pos_sale(record);
        Ok(outcome)
    }

    /// Adds `amount` to the user's cumulative spend and stages a promotion if a threshold has been crossed.
    async fn record_spend(
        &self,
        uow: &mut UnitOfWork<'_, B>,
        user_id: &str,
        amount: Money,
    ) -> Result<Option<TierChange>, SettlementError> {
        let mut user = uow.user(user_id).await?;
        user.total_spent += amount;
        let from = user.membership_tier;
        let to = tier_evaluator::evaluate(from, user.total_spent, &self.config.thresholds);
        user.membership_tier = to;
        let change = (to != from).then(|| TierChange {
            user_id: user_id.to_string(),
            from,
            to,
            total_spent: user.total_spent,
        });
        if let Some(c) = &change {
            debug!("🧾️ {user_id} is promoted from {} to {} at a spend of {}", c.from, c.to, c.total_spent);
        }
        uow.stage_user(user);
        Ok(change)
    }

    async fn cancel_order(&self, id: &SettlementId, e: SettlementError) -> SettlementError {
        let record = FailureRecord::Order { id: id.clone(), reason: status_reason(&e) };
        self.handle_failure(record, &e).await;
        e
    }

    /// Records a failed settlement if the error calls for it, and notifies the failure hooks. Errors here are logged
    /// and swallowed; the caller reports the original failure.
    async fn handle_failure(&self, record: FailureRecord, e: &SettlementError) {
        let id = record.id().clone();
        let mut canceled = false;
        if e.requires_cancellation() {
            match self.db.record_failure(&record).await {
                Ok(true) => {
                    info!("🧾️ {id} has been canceled. {}", record.reason());
                    canceled = true;
                },
                Ok(false) => debug!("🧾️ {id} was not pending, so it was not canceled"),
                Err(err) => error!("🧾️ Could not record the failure of {id}: {err}. Original error: {e}"),
            }
        } else if let SettlementError::AlreadySettled(_) = e {
            info!("🧾️ Duplicate settlement of {id} ignored");
        } else {
            warn!("🧾️ Settlement of {id} failed and has been left pending. {e}");
        }
        let event = SettlementFailedEvent { id, kind: e.kind().to_string(), reason: e.to_string(), canceled };
        for emitter in &self.producers.settlement_failed_producer {
            emitter.try_publish_event(event.clone());
        }
    }

    fn call_settlement_completed_hooks(&self, outcome: &SettlementOutcome) {
        for emitter in &self.producers.settlement_completed_producer {
            debug!("📬️ Notifying settlement completed hook subscribers");
            emitter.try_publish_event(SettlementCompletedEvent::new(outcome.clone()));
        }
        if let Some(change) = &outcome.tier_change {
            for emitter in &self.producers.tier_promoted_producer {
                debug!("📬️ Notifying tier promotion hook subscribers");
                emitter.try_publish_event(TierPromotedEvent::new(outcome.id.clone(), change.clone()));
            }
        }
    }
}

/// The cancellation reason stored on a record: the error kind, followed by its description.
fn status_reason(e: &SettlementError) -> String {
    format!("{}: {e}", e.kind())
}

fn failure_record_for(request: &SettlementRequest, e: &SettlementError) -> FailureRecord {
    let reason = status_reason(e);
    match request {
        SettlementRequest::Online { id, .. } => FailureRecord::Order { id: id.clone(), reason },
        SettlementRequest::Pos(sale) => FailureRecord::PosSale { sale: Box::new(sale.clone()), reason },
    }
}

fn validate_pos_sale(sale: &NewPosSale) -> Result<(), SettlementError> {
    if sale.items.is_empty() {
        return Err(SettlementError::ValidationRejected(format!("POS sale {} has no line items", sale.id)));
    }
    if let Some(line) = sale.items.iter().find(|l| l.quantity <= 0) {
        return Err(SettlementError::ValidationRejected(format!(
            "POS sale {} has a non-positive quantity for {}/{}",
            sale.id, line.product_id, line.sku
        )));
    }
    let expected = sale.totals.computed_total();
    if !expected.matches_within(sale.totals.total_amount, AMOUNT_TOLERANCE) {
        return Err(SettlementError::ValidationRejected(format!(
            "POS sale {} total {} does not match its subtotal less discounts, {expected}",
            sale.id, sale.totals.total_amount
        )));
    }
    if sale.totals.total_amount.is_negative() {
        return Err(SettlementError::ValidationRejected(format!("POS sale {} has a negative total", sale.id)));
    }
    Ok(())
}
