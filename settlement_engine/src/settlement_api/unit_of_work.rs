//! The unit of work is the single transaction context of a settlement attempt.
//!
//! Every document is read through the unit of work, which keeps a working copy along with the version it was read at.
//! Components stage their changes by replacing the working copy. Nothing touches the store until the unit of work is
//! turned into a [`ChangeSet`] and committed, so an attempt that fails part-way leaves no trace, and an attempt that
//! is retried starts again from a fresh unit of work.
use std::collections::HashMap;

use log::*;

use crate::{
    db_types::{GiftCard, NewPointsEntry, Order, PosSale, Product, SettlementId, UserProfile},
    traits::{ChangeSet, DocumentRef, SettlementDatabase},
    SettlementError,
};

#[derive(Debug)]
struct Tracked<T> {
    doc: T,
    dirty: bool,
}

impl<T> Tracked<T> {
    fn clean(doc: T) -> Self {
        Self { doc, dirty: false }
    }
}

pub struct UnitOfWork<'a, B> {
    db: &'a B,
    orders: HashMap<SettlementId, Tracked<Order>>,
    products: HashMap<String, Tracked<Product>>,
    users: HashMap<String, Tracked<UserProfile>>,
    gift_cards: HashMap<String, Tracked<GiftCard>>,
    new_pos_sales: Vec<PosSale>,
    points_entries: Vec<NewPointsEntry>,
}

impl<'a, B> UnitOfWork<'a, B>
where B: SettlementDatabase
{
    pub fn new(db: &'a B) -> Self {
        Self {
            db,
            orders: HashMap::new(),
            products: HashMap::new(),
            users: HashMap::new(),
            gift_cards: HashMap::new(),
            new_pos_sales: Vec::new(),
            points_entries: Vec::new(),
        }
    }

    /// The current working copy of the order, reading it from the store the first time it is requested.
    pub async fn order(&mut self, id: &SettlementId) -> Result<Order, SettlementError> {
        if let Some(t) = self.orders.get(id) {
            return Ok(t.doc.clone());
        }
        let order = self.db.fetch_order(id).await?.ok_or_else(|| SettlementError::not_found("order", id))?;
        trace!("🧾️ Read order {id} at version {}", order.version);
        self.orders.insert(id.clone(), Tracked::clean(order.clone()));
        Ok(order)
    }

    pub async fn product(&mut self, product_id: &str) -> Result<Product, SettlementError> {
        if let Some(t) = self.products.get(product_id) {
            return Ok(t.doc.clone());
        }
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("product", product_id))?;
        trace!("🧾️ Read product {product_id} at version {}", product.version);
        self.products.insert(product_id.to_string(), Tracked::clean(product.clone()));
        Ok(product)
    }

    pub async fn user(&mut self, user_id: &str) -> Result<UserProfile, SettlementError> {
        if let Some(t) = self.users.get(user_id) {
            return Ok(t.doc.clone());
        }
        let user = self.db.fetch_user(user_id).await?.ok_or_else(|| SettlementError::not_found("user", user_id))?;
        trace!("🧾️ Read user {user_id} at version {}", user.version);
        self.users.insert(user_id.to_string(), Tracked::clean(user.clone()));
        Ok(user)
    }

    pub async fn gift_card(&mut self, code: &str) -> Result<GiftCard, SettlementError> {
        if let Some(t) = self.gift_cards.get(code) {
            return Ok(t.doc.clone());
        }
        let card = self.db.fetch_gift_card(code).await?.ok_or_else(|| SettlementError::not_found("gift card", code))?;
        trace!("🧾️ Read gift card {code} at version {}", card.version);
        self.gift_cards.insert(code.to_string(), Tracked::clean(card.clone()));
        Ok(card)
    }

    /// An existing POS sale with this id, if any. POS sales are immutable once written, so they are not tracked.
    pub async fn existing_pos_sale(&self, id: &SettlementId) -> Result<Option<PosSale>, SettlementError> {
        self.db.fetch_pos_sale(id).await
    }

    pub fn stage_order(&mut self, order: Order) {
        stage(&mut self.orders, order.id.clone(), order);
    }

    pub fn stage_product(&mut self, product: Product) {
        stage(&mut self.products, product.id.clone(), product);
    }

    pub fn stage_user(&mut self, user: UserProfile) {
        stage(&mut self.users, user.id.clone(), user);
    }

    pub fn stage_gift_card(&mut self, card: GiftCard) {
        stage(&mut self.gift_cards, card.code.clone(), card);
    }

    pub fn insert_pos_sale(&mut self, sale: PosSale) {
        self.new_pos_sales.push(sale);
    }

    pub fn append_points(&mut self, entry: NewPointsEntry) {
        self.points_entries.push(entry);
    }

    /// Consumes the unit of work, splitting the tracked documents into writes and version checks.
    pub fn into_change_set(self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (id, t) in self.orders {
            if t.dirty {
                changes.orders.push(t.doc);
            } else {
                changes.unchanged.push((DocumentRef::Order(id), t.doc.version));
            }
        }
        for (id, t) in self.products {
            if t.dirty {
                changes.products.push(t.doc);
            } else {
                changes.unchanged.push((DocumentRef::Product(id), t.doc.version));
            }
        }
        for (id, t) in self.users {
            if t.dirty {
                changes.users.push(t.doc);
            } else {
                changes.unchanged.push((DocumentRef::User(id), t.doc.version));
            }
        }
        for (code, t) in self.gift_cards {
            if t.dirty {
                changes.gift_cards.push(t.doc);
            } else {
                changes.unchanged.push((DocumentRef::GiftCard(code), t.doc.version));
            }
        }
        changes.new_pos_sales = self.new_pos_sales;
        changes.points_entries = self.points_entries;
        changes
    }
}

/// Replaces the working copy. The version a document was first read at always wins, so that a component cannot
/// accidentally bypass the conflict check.
fn stage<K: std::hash::Hash + Eq, T: Versioned>(docs: &mut HashMap<K, Tracked<T>>, key: K, mut doc: T) {
    match docs.get_mut(&key) {
        Some(t) => {
            doc.set_version(t.doc.version());
            t.doc = doc;
            t.dirty = true;
        },
        None => {
            docs.insert(key, Tracked { doc, dirty: true });
        },
    }
}

trait Versioned {
    fn version(&self) -> i64;
    fn set_version(&mut self, v: i64);
}

macro_rules! versioned {
    ($($t:ty),*) => {
        $(impl Versioned for $t {
            fn version(&self) -> i64 {
                self.version
            }

            fn set_version(&mut self, v: i64) {
                self.version = v;
            }
        })*
    };
}

versioned!(Order, Product, UserProfile, GiftCard);
