//! Row types and enum mappings
//!
//! Every table has a `*Row` struct decoded with [`sqlx::FromRow`] and a
//! conversion into its domain type. PostgreSQL enum types have a `Db*`
//! mirror so the domain crates stay free of SQLx derives.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use core_kernel::{ClientId, DistributorId, Money, MovementId, PurchaseOrderId, ReturnId, SaleId, UserId};
use domain_distribution::Distribution;
use domain_ledger::{Bank, BankId, Movement, MovementCategory, MovementKind};
use domain_sales::{
    Client, LifecycleState, LotAllocation, PaymentState, PurchaseOrder, RefundState, ReturnKind,
    ReturnReason, ReturnState, Sale, SaleReturn,
};

use crate::error::DatabaseError;

/// Declares a PostgreSQL enum mirror of a domain enum, with conversions
/// both ways
macro_rules! db_enum {
    ($db:ident, $type_name:literal, $domain:ident { $($variant:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
        #[sqlx(type_name = $type_name, rename_all = "snake_case")]
        pub enum $db {
            $($variant),+
        }

        impl From<$domain> for $db {
            fn from(value: $domain) -> Self {
                match value {
                    $($domain::$variant => $db::$variant),+
                }
            }
        }

        impl From<$db> for $domain {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => $domain::$variant),+
                }
            }
        }
    };
}

db_enum!(DbBankCode, "bank_code", BankId { CostRecovery, Freight, Profit });
db_enum!(DbMovementKind, "movement_kind", MovementKind { Inflow, Outflow, TransferIn, TransferOut });
db_enum!(DbMovementCategory, "movement_category", MovementCategory {
    Sale,
    Payment,
    Return,
    Cancellation,
    Transfer,
    DistributorPayment,
});
db_enum!(DbPaymentState, "payment_state", PaymentState { Pending, Partial, Complete });
db_enum!(DbLifecycleState, "lifecycle_state", LifecycleState { Active, Returned, Cancelled });
db_enum!(DbReturnState, "return_state", ReturnState { Requested, Approved, Processed, Rejected });
db_enum!(DbReturnKind, "return_kind", ReturnKind { Total, Partial });
db_enum!(DbReturnReason, "return_reason", ReturnReason {
    Defective,
    WrongQuantity,
    WrongPrice,
    CustomerChangedMind,
    WrongProduct,
    Duplicate,
    Other,
});
db_enum!(DbRefundState, "refund_state", RefundState { Pending, NotApplicable, Issued });

/// Reads a non-negative INTEGER column into a count
pub(crate) fn to_count(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value)
        .map_err(|_| DatabaseError::SerializationError(format!("{column} is negative: {value}")))
}

/// Writes a count into an INTEGER column
pub(crate) fn from_count(value: u32, column: &str) -> Result<i32, DatabaseError> {
    i32::try_from(value)
        .map_err(|_| DatabaseError::SerializationError(format!("{column} out of range: {value}")))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRow {
    pub id: Uuid,
    pub name: String,
    pub outstanding_balance: Decimal,
    pub total_purchases: Decimal,
    pub total_paid: Decimal,
    pub purchase_count: i32,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ClientRow> for Client {
    type Error = DatabaseError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            id: ClientId::from(row.id),
            name: row.name,
            outstanding_balance: Money::new(row.outstanding_balance),
            total_purchases: Money::new(row.total_purchases),
            total_paid: Money::new(row.total_paid),
            purchase_count: to_count(row.purchase_count, "purchase_count")?,
            last_purchase_at: row.last_purchase_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseOrderRow {
    pub id: Uuid,
    pub distributor_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_freight: Decimal,
    pub total_cost: Decimal,
    pub paid_to_distributor: Decimal,
    pub stock_remaining: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = DatabaseError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        Ok(PurchaseOrder {
            id: PurchaseOrderId::from(row.id),
            distributor_id: DistributorId::from(row.distributor_id),
            quantity: to_count(row.quantity, "quantity")?,
            unit_cost: Money::new(row.unit_cost),
            unit_freight: Money::new(row.unit_freight),
            total_cost: Money::new(row.total_cost),
            paid_to_distributor: Money::new(row.paid_to_distributor),
            stock_remaining: to_count(row.stock_remaining, "stock_remaining")?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub quantity: i32,
    pub unit_sale_price: Decimal,
    pub unit_cost_price: Decimal,
    pub unit_freight: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub payment_state: DbPaymentState,
    pub lifecycle_state: DbLifecycleState,
    pub cost_pool: Decimal,
    pub freight_pool: Decimal,
    pub profit_pool: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleLotRow {
    pub sale_id: Uuid,
    pub position: i16,
    pub purchase_order_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

impl TryFrom<SaleLotRow> for LotAllocation {
    type Error = DatabaseError;

    fn try_from(row: SaleLotRow) -> Result<Self, Self::Error> {
        Ok(LotAllocation {
            purchase_order_id: PurchaseOrderId::from(row.purchase_order_id),
            quantity: to_count(row.quantity, "sale_lots.quantity")?,
            unit_cost: Money::new(row.unit_cost),
        })
    }
}

impl SaleRow {
    /// Assembles the sale with its lots, which live in their own table
    pub fn into_sale(self, lots: Vec<SaleLotRow>) -> Result<Sale, DatabaseError> {
        let total = Money::new(self.total_amount);
        Ok(Sale {
            id: SaleId::from(self.id),
            client_id: ClientId::from(self.client_id),
            quantity: to_count(self.quantity, "quantity")?,
            unit_sale_price: Money::new(self.unit_sale_price),
            unit_cost_price: Money::new(self.unit_cost_price),
            unit_freight: Money::new(self.unit_freight),
            total_amount: total,
            paid_amount: Money::new(self.paid_amount),
            remaining_amount: Money::new(self.remaining_amount),
            payment_state: self.payment_state.into(),
            lifecycle_state: self.lifecycle_state.into(),
            distribution: Distribution {
                cost_pool: Money::new(self.cost_pool),
                freight_pool: Money::new(self.freight_pool),
                profit_pool: Money::new(self.profit_pool),
                total,
            },
            lots: lots
                .into_iter()
                .map(LotAllocation::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReturnRow {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub client_id: Uuid,
    pub kind: DbReturnKind,
    pub reason: DbReturnReason,
    pub notes: Option<String>,
    pub state: DbReturnState,
    pub original_quantity: i32,
    pub requested_quantity: i32,
    pub proportion: Decimal,
    pub reversal_cost: Decimal,
    pub reversal_freight: Decimal,
    pub reversal_profit: Decimal,
    pub reversal_total: Decimal,
    pub refund_amount: Decimal,
    pub forgiven_amount: Decimal,
    pub refund_state: DbRefundState,
    pub restock: bool,
    pub restock_purchase_order_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReturnRow> for SaleReturn {
    type Error = DatabaseError;

    fn try_from(row: ReturnRow) -> Result<Self, Self::Error> {
        Ok(SaleReturn {
            id: ReturnId::from(row.id),
            sale_id: SaleId::from(row.sale_id),
            client_id: ClientId::from(row.client_id),
            kind: row.kind.into(),
            reason: row.reason.into(),
            notes: row.notes,
            state: row.state.into(),
            original_quantity: to_count(row.original_quantity, "original_quantity")?,
            requested_quantity: to_count(row.requested_quantity, "requested_quantity")?,
            proportion: row.proportion,
            reversal: Distribution {
                cost_pool: Money::new(row.reversal_cost),
                freight_pool: Money::new(row.reversal_freight),
                profit_pool: Money::new(row.reversal_profit),
                total: Money::new(row.reversal_total),
            },
            refund_amount: Money::new(row.refund_amount),
            forgiven_amount: Money::new(row.forgiven_amount),
            refund_state: row.refund_state.into(),
            restock: row.restock,
            restock_purchase_order_id: row.restock_purchase_order_id.map(PurchaseOrderId::from),
            requested_at: row.requested_at,
            approved_by: row.approved_by.map(UserId::from),
            approved_at: row.approved_at,
            processed_by: row.processed_by.map(UserId::from),
            processed_at: row.processed_at,
            rejection_reason: row.rejection_reason,
            rejected_at: row.rejected_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BankRow {
    pub code: DbBankCode,
    pub current_capital: Decimal,
    pub cumulative_inflow: Decimal,
    pub cumulative_outflow: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<BankRow> for Bank {
    fn from(row: BankRow) -> Self {
        Bank {
            id: row.code.into(),
            current_capital: Money::new(row.current_capital),
            cumulative_inflow: Money::new(row.cumulative_inflow),
            cumulative_outflow: Money::new(row.cumulative_outflow),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub bank: DbBankCode,
    pub related_sale_id: Option<Uuid>,
    pub kind: DbMovementKind,
    pub amount: Decimal,
    pub concept: String,
    pub category: DbMovementCategory,
    pub created_at: DateTime<Utc>,
}

impl From<MovementRow> for Movement {
    fn from(row: MovementRow) -> Self {
        Movement {
            id: MovementId::from(row.id),
            bank: row.bank.into(),
            related_sale_id: row.related_sale_id.map(SaleId::from),
            kind: row.kind.into(),
            amount: Money::new(row.amount),
            concept: row.concept,
            category: row.category.into(),
            created_at: row.created_at,
        }
    }
}
