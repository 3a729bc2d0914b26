//! Capital Pool Ledger
//!
//! The ledger is the single owner of capital truth. It consists of three
//! banks (cost recovery, freight, profit) and an append-only journal of
//! movements. Balances change only by applying a movement's [`BankDelta`].
//!
//! # Invariants
//!
//! - Exactly three banks exist, addressed by [`BankId`]
//! - Movements are never edited; corrections are offsetting movements
//! - `current_capital == cumulative_inflow − cumulative_outflow` when a
//!   bank starts empty

pub mod bank;
pub mod movement;
pub mod book;
pub mod transfer;
pub mod error;

pub use bank::{Bank, BankDelta, BankId};
pub use movement::{Movement, MovementCategory, MovementKind, distribution_movements};
pub use book::BankBook;
pub use transfer::{TransferPlan, plan_transfer};
pub use error::LedgerError;
