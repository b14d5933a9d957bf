//! Apportions shared expenses and works out who owes whom.
//!
//! - [`ledger::split`]: divides one expense among its participants.
//! - [`ledger::balance`]: folds expenses and settlements into a balance per user.
//! - [`ledger::simplify`]: turns balances into a short list of transfers.
//!
//! The rest reads a group's history from CSV and writes reports back.

pub mod error_handler;
pub mod input;
pub mod ledger;
pub mod notify;
pub mod output;
pub mod run;
