use std::fmt::Display;

use crate::db_types::{GiftCard, NewPointsEntry, NewPosSale, Order, PosSale, Product, SettlementId, UserProfile};

/// A reference to a versioned document in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentRef {
    Order(SettlementId),
    Product(String),
    User(String),
    GiftCard(String),
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRef::Order(id) => write!(f, "orders/{}", id.as_str()),
            DocumentRef::Product(id) => write!(f, "products/{id}"),
            DocumentRef::User(id) => write!(f, "users/{id}"),
            DocumentRef::GiftCard(code) => write!(f, "gift_cards/{code}"),
        }
    }
}

/// Every write a unit of work has staged, together with the versions of the documents it read but did not modify.
///
/// Modified documents carry the version they were read at in their own `version` field. A backend must apply the
/// whole set atomically, and only if none of the documents has changed since it was read. Otherwise it returns
/// [`crate::SettlementError::Contention`] and applies nothing.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub orders: Vec<Order>,
    pub products: Vec<Product>,
    pub users: Vec<UserProfile>,
    pub gift_cards: Vec<GiftCard>,
    pub unchanged: Vec<(DocumentRef, i64)>,
    pub new_pos_sales: Vec<PosSale>,
    pub points_entries: Vec<NewPointsEntry>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() &&
            self.products.is_empty() &&
            self.users.is_empty() &&
            self.gift_cards.is_empty() &&
            self.new_pos_sales.is_empty() &&
            self.points_entries.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.orders.len() +
            self.products.len() +
            self.users.len() +
            self.gift_cards.len() +
            self.new_pos_sales.len() +
            self.points_entries.len()
    }
}

/// What a failed settlement should leave behind.
#[derive(Debug, Clone)]
pub enum FailureRecord {
    /// Cancel an online order, if it is still awaiting payment.
    Order { id: SettlementId, reason: String },
    /// Record a rejected POS sale, unless one with the same id already exists.
    PosSale { sale: Box<NewPosSale>, reason: String },
}

impl FailureRecord {
    pub fn id(&self) -> &SettlementId {
        match self {
            FailureRecord::Order { id, .. } => id,
            FailureRecord::PosSale { sale, .. } => &sale.id,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            FailureRecord::Order { reason, .. } => reason,
            FailureRecord::PosSale { reason, .. } => reason,
        }
    }
}
