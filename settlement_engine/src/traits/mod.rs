//! # Database backend contracts.
//!
//! The settlement engine treats its store as a collection of versioned documents: orders, POS sales, products (with
//! their variants), users (with their loyalty ledger) and gift cards.
//!
//! * [`SettlementDatabase`] defines the point reads the engine needs, the atomic, version-checked
//!   [`SettlementDatabase::commit`] of a [`ChangeSet`], and the best-effort failure write.
//! * [`PaymentVerifier`] defines the server-to-server check of a gateway payment.
mod data_objects;
mod payment_verifier;
mod settlement_database;

pub use data_objects::{ChangeSet, DocumentRef, FailureRecord};
pub use payment_verifier::{PaymentVerifier, VerificationError};
pub use settlement_database::SettlementDatabase;
