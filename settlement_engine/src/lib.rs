//! Storefront Settlement Engine
//!
//! The settlement engine runs when a payment gateway confirms an online payment, or when a point-of-sale terminal
//! commits a sale. In one atomic unit it
//! * moves the order or sale to its settled state,
//! * deducts per-outlet, per-variant stock without ever letting it go negative,
//! * debits gift cards,
//! * redeems and awards loyalty points, keeping an append-only points history,
//! * promotes the customer's membership tier.
//!
//! The library is divided into two main sections:
//! 1. Database backends ([`mod@traits`] and [`SqliteDatabase`]). The engine treats the store as a set of versioned
//!    documents, and relies on optimistic conflict detection rather than locks. The data types used by the backends are
//!    defined in [`mod@db_types`] and are public.
//! 2. The settlement API ([`SettlementFlowApi`]). This provides the public-facing functionality of the engine. Backends
//!    need to implement [`traits::SettlementDatabase`] in order to be driven by it.
//!
//! The engine also publishes events after each settlement. A simple hook system ([`mod@events`]) lets you react to
//! them, for example to notify a customer about a tier promotion.
pub mod db_types;
pub mod events;
mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use settlement_api::{
    errors::SettlementError,
    inventory_ledger,
    retry_policy::RetryPolicy,
    settlement_objects,
    tier_evaluator,
    wallet_rewards,
    SettlementConfig,
    SettlementFlowApi,
    UnitOfWork,
};
