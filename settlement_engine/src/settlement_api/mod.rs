//! The public settlement API.
//!
//! [`SettlementFlowApi`] coordinates each settlement. It drives the [`inventory_ledger`], [`wallet_rewards`] and
//! [`tier_evaluator`] components through a shared [`UnitOfWork`], and retries lost races according to a
//! [`RetryPolicy`](retry_policy::RetryPolicy).
pub mod errors;
pub mod inventory_ledger;
pub mod retry_policy;
pub mod settlement_flow_api;
pub mod settlement_objects;
pub mod tier_evaluator;
pub mod unit_of_work;
pub mod wallet_rewards;

pub use settlement_flow_api::{SettlementConfig, SettlementFlowApi};
pub use unit_of_work::UnitOfWork;
