//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the GYA ledger using SQLx.
//!
//! # Architecture
//!
//! - [`pool`]: connection pool, embedded migrations, bank seeding
//! - [`repositories`]: row types and SQL
//! - [`adapters`]: the `LedgerStore` port implementation
//!
//! Every write of one ledger operation runs inside a single SERIALIZABLE
//! transaction; balances are moved only with atomic increments.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, seed_banks, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/gya_ledger")).await?;
//! run_migrations(&pool).await?;
//! seed_banks(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{
    create_pool, create_pool_from_url, run_migrations, seed_banks, DatabaseConfig, DatabasePool,
    DEFAULT_DATABASE_URL,
};
pub use error::DatabaseError;
pub use adapters::{PostgresLedgerSession, PostgresLedgerStore};
