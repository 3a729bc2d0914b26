//! GYA Ledger Engine
//!
//! Composition root for the ledger: loads [`EngineConfig`], installs the
//! tracing subscriber and wires the sales, returns, treasury, purchasing
//! and metrics services over one [`LedgerStore`](domain_sales::LedgerStore).
//!
//! # Example
//!
//! ```rust,ignore
//! use gya_engine::{postgres_engine, prepare_database, EngineConfig};
//!
//! let config = EngineConfig::from_env()?;
//! let pool = prepare_database(&config).await?;
//! let engine = postgres_engine(pool, &config);
//! let sale = engine.sales.create_sale(input).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::{postgres_engine, prepare_database, BalanceReport, LedgerEngine};
pub use error::EngineError;
pub use telemetry::init_tracing;
