//! Driver and admin wallets
//!
//! Balances live on the user record; every change is mirrored by an
//! append-only [`WalletTransaction`].

mod model;
mod service;
mod settlement;

pub use model::*;
pub use service::{WalletError, WalletService};
pub use settlement::{Settlement, SettlementError};
