//! Port adapters
//!
//! PostgreSQL implementations of the ledger ports. Each adapter translates
//! between domain models and row types and maps database failures to
//! `PortError`.

pub mod ledger_store;

pub use ledger_store::{PostgresLedgerSession, PostgresLedgerStore};
