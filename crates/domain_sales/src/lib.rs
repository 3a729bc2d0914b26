//! Sales Domain
//!
//! The transactional heart of the GYA ledger: sales and their payments,
//! returns and their reversals, purchase orders and treasury transfers.
//!
//! # Key Concepts
//!
//! - **Sale**: a client purchase whose full distribution is routed into the
//!   three banks at creation
//! - **Return**: a reversal of part or all of a sale, applied only when
//!   processed
//! - **Purchase order (OC)**: distributor stock that sales draw from
//! - **LedgerStore / LedgerSession**: the transactional storage port every
//!   service writes through
//!
//! # Atomicity
//!
//! Each service operation opens one session, performs every read and write
//! through it and commits once. A failed operation leaves no partial effect.

pub mod client;
pub mod sale;
pub mod returns;
pub mod purchase_order;
pub mod ports;
pub mod services;
pub mod error;

pub use client::{Client, ClientAdjustment};
pub use sale::{LifecycleState, LotAllocation, LotRequest, NewSale, PaymentState, Sale};
pub use returns::{
    RefundState, ReturnKind, ReturnReason, ReturnRequest, ReturnState, SaleReturn,
    processed_quantity, returnable_quantity,
};
pub use purchase_order::{DistributorPaymentState, NewPurchaseOrder, PurchaseOrder};
pub use ports::{LedgerSession, LedgerStore, ReturnFilter, DEFAULT_RETURN_PAGE};
pub use services::{PurchasingService, ReturnService, SaleLifecycleService, SalesPolicy, TreasuryService};
pub use error::SalesError;
