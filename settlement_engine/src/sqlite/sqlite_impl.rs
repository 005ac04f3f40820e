//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use settlement_common::Money;
use sqlx::{migrate::Migrator, SqliteConnection, SqlitePool};

use super::{
    db::{db_url, gift_cards, new_pool, orders, points, pos_sales, products, users},
    SqliteDatabaseError,
};
use crate::{
    db_types::{
        GiftCard,
        LifecycleStatus,
        MembershipTier,
        NewOrder,
        NewPointsEntry,
        Order,
        PaymentStatus,
        PointsEntry,
        PosSale,
        Product,
        SettlementId,
        UserProfile,
    },
    traits::{ChangeSet, DocumentRef, FailureRecord, SettlementDatabase},
    SettlementError,
};

static MIGRATOR: Migrator = sqlx::migrate!("./src/sqlite/migrations");

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_order(&self, id: &SettlementId) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn fetch_pos_sale(&self, id: &SettlementId) -> Result<Option<PosSale>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        pos_sales::fetch_pos_sale(id, &mut conn).await
    }

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserProfile>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn fetch_gift_card(&self, code: &str) -> Result<Option<GiftCard>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        gift_cards::fetch_gift_card(code, &mut conn).await
    }

    async fn fetch_points_history(&self, user_id: &str) -> Result<Vec<PointsEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        points::fetch_history(user_id, &mut conn).await
    }

    /// Writes go first, so the transaction takes SQLite's write lock before it checks any versions. Every check
    /// therefore sees the latest committed state, and no other writer can slip in before the commit.
    async fn commit(&self, changes: ChangeSet) -> Result<(), SettlementError> {
        if changes.is_empty() && changes.unchanged.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for order in &changes.orders {
            ensure(orders::update_versioned(order, &mut tx).await?, || DocumentRef::Order(order.id.clone()))?;
        }
        for product in &changes.products {
            ensure(products::update_versioned(product, &mut tx).await?, || DocumentRef::Product(product.id.clone()))?;
        }
        for user in &changes.users {
            ensure(users::update_versioned(user, &mut tx).await?, || DocumentRef::User(user.id.clone()))?;
        }
        for card in &changes.gift_cards {
            ensure(gift_cards::update_versioned(card, &mut tx).await?, || DocumentRef::GiftCard(card.code.clone()))?;
        }
        for (doc, version) in &changes.unchanged {
            let current = fetch_version(doc, &mut tx).await?;
            ensure(current == Some(*version), || doc.clone())?;
        }
        for sale in &changes.new_pos_sales {
            pos_sales::insert_pos_sale(sale, false, &mut tx).await?;
        }
        for entry in &changes.points_entries {
            points::append_entry(entry, &mut tx).await?;
        }
        tx.commit().await?;
        trace!("🗃️ Committed {} writes", changes.write_count());
        Ok(())
    }

    async fn record_failure(&self, failure: &FailureRecord) -> Result<bool, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let written = match failure {
            FailureRecord::Order { id, reason } => orders::cancel_if_pending(id, reason, &mut conn).await?,
            FailureRecord::PosSale { sale, reason } => {
                let mut record = (**sale).clone().into_sale(LifecycleStatus::Canceled, PaymentStatus::Failed, 0);
                record.status_reason = Some(reason.clone());
                pos_sales::insert_pos_sale(&record, true, &mut conn).await?
            },
        };
        Ok(written)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Turns a failed version check into a contention error, and drops the transaction (rolling it back).
fn ensure<F: FnOnce() -> DocumentRef>(ok: bool, doc: F) -> Result<(), SettlementError> {
    if ok {
        Ok(())
    } else {
        let doc = doc();
        debug!("🗃️ {doc} changed since it was read");
        Err(SettlementError::Contention(format!("{doc} changed since it was read")))
    }
}

async fn fetch_version(doc: &DocumentRef, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    match doc {
        DocumentRef::Order(id) => orders::fetch_version(id, conn).await,
        DocumentRef::Product(id) => products::fetch_version(id, conn).await,
        DocumentRef::User(id) => users::fetch_version(id, conn).await,
        DocumentRef::GiftCard(code) => gift_cards::fetch_version(code, conn).await,
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        if !url.starts_with("sqlite:") {
            return Err(SqliteDatabaseError::InvalidUrl(format!("{url} is not a SQLite URL")));
        }
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        MIGRATOR.run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    // The methods below belong to the storefront's page layer, which creates the documents the engine settles. They
    // are used for seeding and tests.

    pub async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    pub async fn upsert_product(&self, product: &Product) -> Result<(), SettlementError> {
        let variants = serde_json::to_string(&product.variants)?;
        self.upsert_product_json(&product.id, &product.name, product.is_pre_order, &variants).await
    }

    /// Stores a product with a raw variants document, in either of the supported shapes.
    pub async fn upsert_product_json(
        &self,
        product_id: &str,
        name: &str,
        is_pre_order: bool,
        variants_json: &str,
    ) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product_json(product_id, name, is_pre_order, variants_json, &mut conn).await?;
        Ok(())
    }

    pub async fn upsert_user(
        &self,
        user_id: &str,
        total_spent: Money,
        tier: MembershipTier,
    ) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_user(user_id, total_spent, tier, &mut conn).await?;
        Ok(())
    }

    /// Grants points outside of a settlement (e.g. a sign-up bonus), keeping the cached balance and history in step.
    pub async fn grant_points(&self, user_id: &str, points: i64, reason: &str) -> Result<(), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let entry = NewPointsEntry::earn(user_id, points, reason.to_string());
        points::append_entry(&entry, &mut tx).await?;
        sqlx::query("UPDATE users SET loyalty_points = loyalty_points + $1, version = version + 1 WHERE id = $2")
            .bind(points)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_gift_card(&self, card: &GiftCard) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        gift_cards::insert_gift_card(card, &mut conn).await?;
        Ok(())
    }
}
