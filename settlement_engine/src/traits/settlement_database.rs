use crate::{
    db_types::{GiftCard, Order, PointsEntry, PosSale, Product, SettlementId, UserProfile},
    traits::{ChangeSet, FailureRecord},
    SettlementError,
};

/// This trait defines the behaviour a document store needs to expose to back the settlement engine.
///
/// Reads are plain point lookups. They carry the document's `version`, and no locks are taken. All mutations go through
/// [`SettlementDatabase::commit`], which applies a [`ChangeSet`] atomically with optimistic conflict detection, or
/// through the best-effort [`SettlementDatabase::record_failure`].
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn fetch_order(&self, id: &SettlementId) -> Result<Option<Order>, SettlementError>;

    async fn fetch_pos_sale(&self, id: &SettlementId) -> Result<Option<PosSale>, SettlementError>;

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, SettlementError>;

    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserProfile>, SettlementError>;

    async fn fetch_gift_card(&self, code: &str) -> Result<Option<GiftCard>, SettlementError>;

    /// The user's loyalty ledger, oldest entry first.
    async fn fetch_points_history(&self, user_id: &str) -> Result<Vec<PointsEntry>, SettlementError>;

    /// Applies every write in the change set in a single transaction.
    ///
    /// Each modified document is written only if its stored version still equals the version it was read at, and the
    /// stored version is then incremented. Each unchanged document's version is checked too. If any check fails, or a
    /// new POS sale id already exists, the transaction is rolled back and [`SettlementError::Contention`] is returned.
    async fn commit(&self, changes: ChangeSet) -> Result<(), SettlementError>;

    /// Marks a failed settlement as canceled. This runs outside of any settlement transaction.
    ///
    /// An order is only canceled if it is still awaiting a payment. A POS sale is only recorded if no sale with the
    /// same id exists. Returns `true` if anything was written.
    async fn record_failure(&self, failure: &FailureRecord) -> Result<bool, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}
