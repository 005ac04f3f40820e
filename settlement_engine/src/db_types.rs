use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use settlement_common::Money;
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {field}: {value}")]
pub struct ConversionError {
    pub field: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(field: &'static str, value: &str) -> Self {
        Self { field, value: value.to_string() }
    }
}

//--------------------------------------     SettlementId      --------------------------------------------------------
/// The globally unique identifier of an order or POS sale. For online orders this is also the gateway `tran_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct SettlementId(pub String);

impl FromStr for SettlementId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError::new("settlement id", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for SettlementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for SettlementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl SettlementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   LifecycleStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Created by the storefront; waiting for the gateway to confirm payment.
    AwaitingPayment,
    /// The deposit for a pre-order has been settled.
    PreOrdered,
    /// The vendor has asked for the balance of a pre-order.
    AwaitingFinalPayment,
    /// Payment is settled and all stock, wallet and points effects have been applied.
    Settled,
    /// The order has been delivered, and deferred loyalty points have been awarded.
    Completed,
    /// Settlement failed. `status_reason` says why.
    Canceled,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::PreOrdered => "pre_ordered",
            Self::AwaitingFinalPayment => "awaiting_final_payment",
            Self::Settled => "settled",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }

    /// States from which a payment settlement may still proceed.
    pub fn is_pre_settlement(&self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::AwaitingFinalPayment)
    }
}

impl Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "pre_ordered" => Ok(Self::PreOrdered),
            "awaiting_final_payment" => Ok(Self::AwaitingFinalPayment),
            "settled" => Ok(Self::Settled),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            s => Err(ConversionError::new("lifecycle status", s)),
        }
    }
}

//--------------------------------------    PaymentStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    DepositPaid,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::DepositPaid => write!(f, "DepositPaid"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "DepositPaid" => Ok(Self::DepositPaid),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError::new("payment status", s)),
        }
    }
}

//--------------------------------------    MembershipTier     --------------------------------------------------------
/// Customer membership level. The derived ordering is the promotion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Silver,
    Gold,
    Platinum,
}

impl Default for MembershipTier {
    fn default() -> Self {
        Self::Silver
    }
}

impl Display for MembershipTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipTier::Silver => write!(f, "silver"),
            MembershipTier::Gold => write!(f, "gold"),
            MembershipTier::Platinum => write!(f, "platinum"),
        }
    }
}

impl FromStr for MembershipTier {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            _ => Err(ConversionError::new("membership tier", s)),
        }
    }
}

//--------------------------------------       LineItem        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// The outlet that fulfils this line. Falls back to the order's assigned outlet when absent.
    #[serde(default)]
    pub outlet_id: Option<String>,
}

impl LineItem {
    pub fn new<P: Into<String>, S: Into<String>>(product_id: P, sku: S, quantity: i64, unit_price: Money) -> Self {
        Self { product_id: product_id.into(), sku: sku.into(), quantity, unit_price, outlet_id: None }
    }

    pub fn at_outlet<S: Into<String>>(mut self, outlet_id: S) -> Self {
        self.outlet_id = Some(outlet_id.into());
        self
    }

    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------      OrderTotals      --------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub loyalty_discount: Money,
    pub gift_card_discount: Money,
    /// The final payable amount.
    pub total_amount: Money,
}

impl OrderTotals {
    pub fn with_total(total_amount: Money) -> Self {
        Self { subtotal: total_amount, total_amount, ..Default::default() }
    }

    /// The payable amount implied by the subtotal and the discounts.
    pub fn computed_total(&self) -> Money {
        self.subtotal - self.discount - self.loyalty_discount - self.gift_card_discount
    }
}

//--------------------------------------     PaymentMeta       --------------------------------------------------------
/// Gateway metadata attached to an order when its payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMeta {
    pub val_id: Option<String>,
    pub bank_tran_id: Option<String>,
    pub card_type: Option<String>,
    pub currency: Option<String>,
    pub amount: Money,
    pub settled_at: DateTime<Utc>,
}

//--------------------------------------         Order         --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: SettlementId,
    pub user_id: Option<String>,
    /// The outlet assigned to fulfil this order.
    pub outlet_id: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub is_pre_order: bool,
    /// For pre-orders, the value of the whole order. `totals.total_amount` holds the deposit.
    pub full_order_value: Option<Money>,
    pub gift_card_code: Option<String>,
    pub points_used: i64,
    pub sales_agent: Option<String>,
    pub status: LifecycleStatus,
    pub payment_status: PaymentStatus,
    pub status_reason: Option<String>,
    pub payment_meta: Option<PaymentMeta>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The amount the customer must pay in the next settlement of this order.
    pub fn expected_payable(&self) -> Money {
        match self.status {
            LifecycleStatus::AwaitingFinalPayment => {
                self.full_order_value.unwrap_or(self.totals.total_amount) - self.totals.total_amount
            },
            _ => self.totals.total_amount,
        }
    }

    /// The full value of the order, used for loyalty accrual on completion.
    pub fn order_value(&self) -> Money {
        self.full_order_value.unwrap_or(self.totals.total_amount)
    }
}

//--------------------------------------       NewOrder        --------------------------------------------------------
/// An order as created by the storefront, before any settlement.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: SettlementId,
    pub user_id: Option<String>,
    pub outlet_id: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub is_pre_order: bool,
    pub full_order_value: Option<Money>,
    pub gift_card_code: Option<String>,
    pub points_used: i64,
    pub sales_agent: Option<String>,
}

impl NewOrder {
    pub fn new(id: SettlementId, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::line_total).sum();
        Self {
            id,
            user_id: None,
            outlet_id: None,
            items,
            totals: OrderTotals::with_total(total),
            is_pre_order: false,
            full_order_value: None,
            gift_card_code: None,
            points_used: 0,
            sales_agent: None,
        }
    }

    pub fn for_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn at_outlet<S: Into<String>>(mut self, outlet_id: S) -> Self {
        self.outlet_id = Some(outlet_id.into());
        self
    }

    pub fn with_gift_card<S: Into<String>>(mut self, code: S, amount: Money) -> Self {
        self.gift_card_code = Some(code.into());
        self.totals.gift_card_discount = amount;
        self.totals.total_amount = self.totals.computed_total();
        self
    }

    pub fn with_points(mut self, points: i64, loyalty_discount: Money) -> Self {
        self.points_used = points;
        self.totals.loyalty_discount = loyalty_discount;
        self.totals.total_amount = self.totals.computed_total();
        self
    }

    /// Marks the order as a pre-order where only `deposit` is payable up front.
    pub fn as_pre_order(mut self, deposit: Money) -> Self {
        self.is_pre_order = true;
        self.full_order_value = Some(self.totals.total_amount);
        self.totals.total_amount = deposit;
        self
    }
}

//--------------------------------------        PosSale        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosSale {
    pub id: SettlementId,
    pub outlet_id: String,
    pub user_id: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub gift_card_code: Option<String>,
    pub points_used: i64,
    pub points_earned: i64,
    pub sales_agent: Option<String>,
    pub payment_method: String,
    pub status: LifecycleStatus,
    pub payment_status: PaymentStatus,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A completed sale as reported by a POS terminal. It is already paid at the time it is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosSale {
    pub id: SettlementId,
    pub outlet_id: String,
    pub user_id: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub gift_card_code: Option<String>,
    #[serde(default)]
    pub points_used: i64,
    pub sales_agent: Option<String>,
    pub payment_method: String,
}

impl NewPosSale {
    pub fn new<S: Into<String>>(id: SettlementId, outlet_id: S, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::line_total).sum();
        Self {
            id,
            outlet_id: outlet_id.into(),
            user_id: None,
            items,
            totals: OrderTotals::with_total(total),
            gift_card_code: None,
            points_used: 0,
            sales_agent: None,
            payment_method: "cash".to_string(),
        }
    }

    pub fn for_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_gift_card<S: Into<String>>(mut self, code: S, amount: Money) -> Self {
        self.gift_card_code = Some(code.into());
        self.totals.gift_card_discount = amount;
        self.totals.total_amount = self.totals.computed_total();
        self
    }

    pub fn with_points(mut self, points: i64, loyalty_discount: Money) -> Self {
        self.points_used = points;
        self.totals.loyalty_discount = loyalty_discount;
        self.totals.total_amount = self.totals.computed_total();
        self
    }

    pub fn into_sale(self, status: LifecycleStatus, payment_status: PaymentStatus, points_earned: i64) -> PosSale {
        PosSale {
            id: self.id,
            outlet_id: self.outlet_id,
            user_id: self.user_id,
            items: self.items,
            totals: self.totals,
            gift_card_code: self.gift_card_code,
            points_used: self.points_used,
            points_earned,
            sales_agent: self.sales_agent,
            payment_method: self.payment_method,
            status,
            payment_status,
            status_reason: None,
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------   Product / Variant   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub sku: String,
    /// Global stock. Always the sum of `outlet_stocks`.
    pub stock: i64,
    #[serde(default, alias = "outletStocks")]
    pub outlet_stocks: BTreeMap<String, i64>,
}

impl Variant {
    pub fn new<S: Into<String>>(sku: S, outlet_stocks: &[(&str, i64)]) -> Self {
        let outlet_stocks: BTreeMap<String, i64> =
            outlet_stocks.iter().map(|(outlet, n)| (outlet.to_string(), *n)).collect();
        let stock = outlet_stocks.values().sum();
        Self { sku: sku.into(), stock, outlet_stocks }
    }

    pub fn outlet_stock(&self, outlet_id: &str) -> i64 {
        self.outlet_stocks.get(outlet_id).copied().unwrap_or(0)
    }

    pub fn outlet_total(&self) -> i64 {
        self.outlet_stocks.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Pre-order products are fulfilled from the vendor's production run, not from outlet stock.
    pub is_pre_order: bool,
    pub variants: Vec<Variant>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn variant(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.sku == sku)
    }

    pub fn variant_mut(&mut self, sku: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.sku == sku)
    }
}

/// Variants have historically been stored either as a list, or as an object keyed by SKU. Both shapes are accepted
/// and normalized into a list sorted by SKU.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredVariants {
    List(Vec<Variant>),
    Keyed(BTreeMap<String, KeyedVariant>),
}

#[derive(Debug, Deserialize)]
struct KeyedVariant {
    #[serde(default)]
    stock: Option<i64>,
    #[serde(default, alias = "outletStocks")]
    outlet_stocks: BTreeMap<String, i64>,
}

pub fn normalize_variants(json: &str) -> Result<Vec<Variant>, serde_json::Error> {
    let stored: StoredVariants = serde_json::from_str(json)?;
    let mut variants = match stored {
        StoredVariants::List(v) => v,
        StoredVariants::Keyed(map) => map
            .into_iter()
            .map(|(sku, v)| {
                let stock = v.stock.unwrap_or_else(|| v.outlet_stocks.values().sum());
                Variant { sku, stock, outlet_stocks: v.outlet_stocks }
            })
            .collect(),
    };
    for v in &variants {
        if v.stock != v.outlet_total() {
            warn!("🗃️ Variant {} has drifted. Global stock {} != outlet total {}", v.sku, v.stock, v.outlet_total());
        }
    }
    variants.sort_by(|a, b| a.sku.cmp(&b.sku));
    Ok(variants)
}

//--------------------------------------       GiftCard        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCard {
    pub code: String,
    pub balance: Money,
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl GiftCard {
    pub fn new<S: Into<String>>(code: S, balance: Money) -> Self {
        Self { code: code.into(), balance, enabled: true, expires_at: None, version: 0 }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

//--------------------------------------      UserProfile      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    /// Cached balance. Always equal to the sum of the user's points history.
    pub loyalty_points: i64,
    pub total_spent: Money,
    pub membership_tier: MembershipTier,
    pub version: i64,
}

impl UserProfile {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            loyalty_points: 0,
            total_spent: Money::zero(),
            membership_tier: MembershipTier::Silver,
            version: 0,
        }
    }
}

//--------------------------------------     PointsEntry       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsEntryType {
    Earn,
    Redeem,
}

impl Display for PointsEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointsEntryType::Earn => write!(f, "earn"),
            PointsEntryType::Redeem => write!(f, "redeem"),
        }
    }
}

impl FromStr for PointsEntryType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earn" => Ok(Self::Earn),
            "redeem" => Ok(Self::Redeem),
            s => Err(ConversionError::new("points entry type", s)),
        }
    }
}

/// An immutable record of a single change to a user's loyalty balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEntry {
    pub id: i64,
    pub user_id: String,
    pub delta: i64,
    pub entry_type: PointsEntryType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPointsEntry {
    pub user_id: String,
    pub delta: i64,
    pub entry_type: PointsEntryType,
    pub reason: String,
}

impl NewPointsEntry {
    pub fn earn<S: Into<String>>(user_id: S, points: i64, reason: String) -> Self {
        Self { user_id: user_id.into(), delta: points, entry_type: PointsEntryType::Earn, reason }
    }

    pub fn redeem<S: Into<String>>(user_id: S, points: i64, reason: String) -> Self {
        Self { user_id: user_id.into(), delta: -points, entry_type: PointsEntryType::Redeem, reason }
    }
}
