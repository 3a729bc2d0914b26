//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! GYA ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for the reference scenarios
//! - `builders`: Builder patterns for test data construction
//! - `harness`: Sales services wired over the in-memory store
//! - `assertions`: Custom assertion helpers for ledger types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod harness;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use harness::*;
pub use assertions::*;
pub use generators::*;
