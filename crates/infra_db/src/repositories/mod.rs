//! SQL access for the ledger tables
//!
//! `rows` holds the decoded row types and PostgreSQL enum mirrors; `ledger`
//! holds the queries. Queries use runtime-checked SQL so the crate builds
//! without a live database.

pub mod rows;
pub mod ledger;
