//! SQLite backend for the settlement engine.
//!
//! Documents map onto one row each. Nested collections (line items, variants, payment metadata) are stored as JSON
//! text, and every mutable row carries a `version` column for optimistic conflict detection.
pub mod db;
mod errors;
mod sqlite_impl;

pub use errors::SqliteDatabaseError;
pub use sqlite_impl::SqliteDatabase;
