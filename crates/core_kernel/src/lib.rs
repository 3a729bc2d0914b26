//! Core Kernel - Foundational types and utilities for the GYA ledger
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Ports infrastructure and the clock abstraction

pub mod money;
pub mod identifiers;
pub mod ports;
pub mod clock;

pub use money::{Money, round_cents, percentage, CENT_PLACES};
pub use identifiers::{
    SaleId, ClientId, ReturnId, PurchaseOrderId, DistributorId, MovementId, UserId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use clock::{Clock, SystemClock, FixedClock};
