//! Ledger queries
//!
//! Every function takes a `&mut PgConnection` so the same SQL serves both
//! pooled reads and the statements of an open session. Functions with a
//! `lock` flag append `FOR UPDATE` when asked.
//!
//! Running figures (bank balances, client totals, purchase order stock)
//! are only ever changed with `column = column + $n`.

use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{ClientId, Money, PurchaseOrderId, ReturnId, SaleId};
use domain_ledger::{Bank, BankId, Movement};
use domain_sales::{Client, ClientAdjustment, PurchaseOrder, ReturnFilter, ReturnState, Sale, SaleReturn};

use super::rows::*;
use crate::error::DatabaseError;

const CLIENT_COLUMNS: &str = "id, name, outstanding_balance, total_purchases, total_paid, \
     purchase_count, last_purchase_at, created_at";

const PURCHASE_ORDER_COLUMNS: &str = "id, distributor_id, quantity, unit_cost, unit_freight, \
     total_cost, paid_to_distributor, stock_remaining, created_at";

const SALE_COLUMNS: &str = "id, client_id, quantity, unit_sale_price, unit_cost_price, unit_freight, \
     total_amount, paid_amount, remaining_amount, payment_state, lifecycle_state, \
     cost_pool, freight_pool, profit_pool, notes, created_at, updated_at";

const LOT_COLUMNS: &str = "sale_id, position, purchase_order_id, quantity, unit_cost";

const RETURN_COLUMNS: &str = "id, sale_id, client_id, kind, reason, notes, state, \
     original_quantity, requested_quantity, proportion, \
     reversal_cost, reversal_freight, reversal_profit, reversal_total, \
     refund_amount, forgiven_amount, refund_state, restock, restock_purchase_order_id, \
     requested_at, approved_by, approved_at, processed_by, processed_at, \
     rejection_reason, rejected_at";

const BANK_COLUMNS: &str =
    "code, current_capital, cumulative_inflow, cumulative_outflow, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, bank, related_sale_id, kind, amount, concept, category, created_at";

fn lock_clause(lock: bool) -> &'static str {
    if lock {
        " FOR UPDATE"
    } else {
        ""
    }
}

// ============================================================================
// Clients
// ============================================================================

pub async fn fetch_client(
    conn: &mut PgConnection,
    id: ClientId,
    lock: bool,
) -> Result<Option<Client>, DatabaseError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1{}", lock_clause(lock));
    sqlx::query_as::<_, ClientRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .map(Client::try_from)
        .transpose()
}

pub async fn insert_client(conn: &mut PgConnection, client: &Client) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO clients (
            id, name, outstanding_balance, total_purchases, total_paid,
            purchase_count, last_purchase_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::from(client.id))
    .bind(&client.name)
    .bind(client.outstanding_balance.amount())
    .bind(client.total_purchases.amount())
    .bind(client.total_paid.amount())
    .bind(from_count(client.purchase_count, "purchase_count")?)
    .bind(client.last_purchase_at)
    .bind(client.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn adjust_client(
    conn: &mut PgConnection,
    id: ClientId,
    adjustment: &ClientAdjustment,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE clients SET
            outstanding_balance = outstanding_balance + $2,
            total_purchases = total_purchases + $3,
            total_paid = total_paid + $4,
            purchase_count = GREATEST(purchase_count + $5, 0),
            last_purchase_at = COALESCE($6, last_purchase_at)
        WHERE id = $1
        "#,
    )
    .bind(Uuid::from(id))
    .bind(adjustment.balance.amount())
    .bind(adjustment.purchases.amount())
    .bind(adjustment.paid.amount())
    .bind(adjustment.purchase_count)
    .bind(adjustment.last_purchase_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Client", id));
    }
    Ok(())
}

// ============================================================================
// Purchase orders
// ============================================================================

pub async fn fetch_purchase_order(
    conn: &mut PgConnection,
    id: PurchaseOrderId,
    lock: bool,
) -> Result<Option<PurchaseOrder>, DatabaseError> {
    let sql = format!(
        "SELECT {PURCHASE_ORDER_COLUMNS} FROM purchase_orders WHERE id = $1{}",
        lock_clause(lock)
    );
    sqlx::query_as::<_, PurchaseOrderRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .map(PurchaseOrder::try_from)
        .transpose()
}

pub async fn insert_purchase_order(conn: &mut PgConnection, order: &PurchaseOrder) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO purchase_orders (
            id, distributor_id, quantity, unit_cost, unit_freight,
            total_cost, paid_to_distributor, stock_remaining, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(Uuid::from(order.id))
    .bind(Uuid::from(order.distributor_id))
    .bind(from_count(order.quantity, "quantity")?)
    .bind(order.unit_cost.amount())
    .bind(order.unit_freight.amount())
    .bind(order.total_cost.amount())
    .bind(order.paid_to_distributor.amount())
    .bind(from_count(order.stock_remaining, "stock_remaining")?)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn adjust_purchase_order(
    conn: &mut PgConnection,
    id: PurchaseOrderId,
    stock_delta: i64,
    paid_delta: Money,
) -> Result<(), DatabaseError> {
    let stock_delta = i32::try_from(stock_delta)
        .map_err(|_| DatabaseError::SerializationError(format!("stock delta out of range: {stock_delta}")))?;

    let result = sqlx::query(
        r#"
        UPDATE purchase_orders SET
            stock_remaining = stock_remaining + $2,
            paid_to_distributor = paid_to_distributor + $3
        WHERE id = $1
        "#,
    )
    .bind(Uuid::from(id))
    .bind(stock_delta)
    .bind(paid_delta.amount())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("PurchaseOrder", id));
    }
    Ok(())
}

// ============================================================================
// Sales
// ============================================================================

async fn fetch_lots(conn: &mut PgConnection, sale_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<SaleLotRow>>, DatabaseError> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM sale_lots WHERE sale_id = ANY($1) ORDER BY sale_id, position");
    let rows = sqlx::query_as::<_, SaleLotRow>(&sql)
        .bind(sale_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut lots: HashMap<Uuid, Vec<SaleLotRow>> = HashMap::new();
    for row in rows {
        lots.entry(row.sale_id).or_default().push(row);
    }
    Ok(lots)
}

async fn assemble_sales(conn: &mut PgConnection, rows: Vec<SaleRow>) -> Result<Vec<Sale>, DatabaseError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut lots = fetch_lots(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let sale_lots = lots.remove(&row.id).unwrap_or_default();
            row.into_sale(sale_lots)
        })
        .collect()
}

pub async fn fetch_sale(conn: &mut PgConnection, id: SaleId, lock: bool) -> Result<Option<Sale>, DatabaseError> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1{}", lock_clause(lock));
    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(assemble_sales(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn insert_sale(conn: &mut PgConnection, sale: &Sale) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, client_id, quantity, unit_sale_price, unit_cost_price, unit_freight,
            total_amount, paid_amount, remaining_amount, payment_state, lifecycle_state,
            cost_pool, freight_pool, profit_pool, notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(Uuid::from(sale.id))
    .bind(Uuid::from(sale.client_id))
    .bind(from_count(sale.quantity, "quantity")?)
    .bind(sale.unit_sale_price.amount())
    .bind(sale.unit_cost_price.amount())
    .bind(sale.unit_freight.amount())
    .bind(sale.total_amount.amount())
    .bind(sale.paid_amount.amount())
    .bind(sale.remaining_amount.amount())
    .bind(DbPaymentState::from(sale.payment_state))
    .bind(DbLifecycleState::from(sale.lifecycle_state))
    .bind(sale.distribution.cost_pool.amount())
    .bind(sale.distribution.freight_pool.amount())
    .bind(sale.distribution.profit_pool.amount())
    .bind(&sale.notes)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, lot) in sale.lots.iter().enumerate() {
        let position = i16::try_from(position)
            .map_err(|_| DatabaseError::SerializationError(format!("too many lots on sale {}", sale.id)))?;
        sqlx::query(
            r#"
            INSERT INTO sale_lots (sale_id, position, purchase_order_id, quantity, unit_cost)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(sale.id))
        .bind(position)
        .bind(Uuid::from(lot.purchase_order_id))
        .bind(from_count(lot.quantity, "sale_lots.quantity")?)
        .bind(lot.unit_cost.amount())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Writes the mutable part of a sale: payment progress and lifecycle
pub async fn update_sale(conn: &mut PgConnection, sale: &Sale) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE sales SET
            paid_amount = $2,
            remaining_amount = $3,
            payment_state = $4,
            lifecycle_state = $5,
            notes = $6,
            updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(Uuid::from(sale.id))
    .bind(sale.paid_amount.amount())
    .bind(sale.remaining_amount.amount())
    .bind(DbPaymentState::from(sale.payment_state))
    .bind(DbLifecycleState::from(sale.lifecycle_state))
    .bind(&sale.notes)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Sale", sale.id));
    }
    Ok(())
}

pub async fn sales_for_purchase_order(
    conn: &mut PgConnection,
    id: PurchaseOrderId,
) -> Result<Vec<Sale>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {SALE_COLUMNS} FROM sales
        WHERE EXISTS (
            SELECT 1 FROM sale_lots
            WHERE sale_lots.sale_id = sales.id AND sale_lots.purchase_order_id = $1
        )
        ORDER BY created_at, id
        "#
    );
    let rows = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_all(&mut *conn)
        .await?;
    assemble_sales(conn, rows).await
}

// ============================================================================
// Returns
// ============================================================================

pub async fn fetch_return(
    conn: &mut PgConnection,
    id: ReturnId,
    lock: bool,
) -> Result<Option<SaleReturn>, DatabaseError> {
    let sql = format!("SELECT {RETURN_COLUMNS} FROM returns WHERE id = $1{}", lock_clause(lock));
    sqlx::query_as::<_, ReturnRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .map(SaleReturn::try_from)
        .transpose()
}

/// Returns of a sale, oldest first
pub async fn returns_for_sale(
    conn: &mut PgConnection,
    sale_id: SaleId,
    lock: bool,
) -> Result<Vec<SaleReturn>, DatabaseError> {
    let sql = format!(
        "SELECT {RETURN_COLUMNS} FROM returns WHERE sale_id = $1 ORDER BY requested_at, id{}",
        lock_clause(lock)
    );
    sqlx::query_as::<_, ReturnRow>(&sql)
        .bind(Uuid::from(sale_id))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(SaleReturn::try_from)
        .collect()
}

pub async fn insert_return(conn: &mut PgConnection, ret: &SaleReturn) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO returns (
            id, sale_id, client_id, kind, reason, notes, state,
            original_quantity, requested_quantity, proportion,
            reversal_cost, reversal_freight, reversal_profit, reversal_total,
            refund_amount, forgiven_amount, refund_state, restock, restock_purchase_order_id,
            requested_at, approved_by, approved_at, processed_by, processed_at,
            rejection_reason, rejected_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
        )
        "#,
    )
    .bind(Uuid::from(ret.id))
    .bind(Uuid::from(ret.sale_id))
    .bind(Uuid::from(ret.client_id))
    .bind(DbReturnKind::from(ret.kind))
    .bind(DbReturnReason::from(ret.reason))
    .bind(&ret.notes)
    .bind(DbReturnState::from(ret.state))
    .bind(from_count(ret.original_quantity, "original_quantity")?)
    .bind(from_count(ret.requested_quantity, "requested_quantity")?)
    .bind(ret.proportion)
    .bind(ret.reversal.cost_pool.amount())
    .bind(ret.reversal.freight_pool.amount())
    .bind(ret.reversal.profit_pool.amount())
    .bind(ret.reversal.total.amount())
    .bind(ret.refund_amount.amount())
    .bind(ret.forgiven_amount.amount())
    .bind(DbRefundState::from(ret.refund_state))
    .bind(ret.restock)
    .bind(ret.restock_purchase_order_id.map(Uuid::from))
    .bind(ret.requested_at)
    .bind(ret.approved_by.map(Uuid::from))
    .bind(ret.approved_at)
    .bind(ret.processed_by.map(Uuid::from))
    .bind(ret.processed_at)
    .bind(&ret.rejection_reason)
    .bind(ret.rejected_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes the workflow part of a return: state, amounts and audit stamps
pub async fn update_return(conn: &mut PgConnection, ret: &SaleReturn) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE returns SET
            state = $2,
            reversal_cost = $3,
            reversal_freight = $4,
            reversal_profit = $5,
            reversal_total = $6,
            refund_amount = $7,
            forgiven_amount = $8,
            refund_state = $9,
            restock_purchase_order_id = $10,
            approved_by = $11,
            approved_at = $12,
            processed_by = $13,
            processed_at = $14,
            rejection_reason = $15,
            rejected_at = $16
        WHERE id = $1
        "#,
    )
    .bind(Uuid::from(ret.id))
    .bind(DbReturnState::from(ret.state))
    .bind(ret.reversal.cost_pool.amount())
    .bind(ret.reversal.freight_pool.amount())
    .bind(ret.reversal.profit_pool.amount())
    .bind(ret.reversal.total.amount())
    .bind(ret.refund_amount.amount())
    .bind(ret.forgiven_amount.amount())
    .bind(DbRefundState::from(ret.refund_state))
    .bind(ret.restock_purchase_order_id.map(Uuid::from))
    .bind(ret.approved_by.map(Uuid::from))
    .bind(ret.approved_at)
    .bind(ret.processed_by.map(Uuid::from))
    .bind(ret.processed_at)
    .bind(&ret.rejection_reason)
    .bind(ret.rejected_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Return", ret.id));
    }
    Ok(())
}

/// Returns matching `filter`, newest first
pub async fn list_returns(conn: &mut PgConnection, filter: &ReturnFilter) -> Result<Vec<SaleReturn>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {RETURN_COLUMNS} FROM returns
        WHERE ($1::return_state IS NULL OR state = $1)
          AND ($2::uuid IS NULL OR client_id = $2)
          AND ($3::uuid IS NULL OR sale_id = $3)
        ORDER BY requested_at DESC, id DESC
        LIMIT $4
        "#
    );
    let limit = i64::try_from(filter.page_size()).unwrap_or(i64::MAX);
    sqlx::query_as::<_, ReturnRow>(&sql)
        .bind(filter.state.map(DbReturnState::from))
        .bind(filter.client_id.map(Uuid::from))
        .bind(filter.sale_id.map(Uuid::from))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(SaleReturn::try_from)
        .collect()
}

pub async fn count_returns(conn: &mut PgConnection, state: ReturnState) -> Result<u64, DatabaseError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM returns WHERE state = $1")
        .bind(DbReturnState::from(state))
        .fetch_one(&mut *conn)
        .await?;
    u64::try_from(count).map_err(|_| DatabaseError::SerializationError(format!("negative count: {count}")))
}

// ============================================================================
// Banks and movements
// ============================================================================

pub async fn fetch_bank(conn: &mut PgConnection, id: BankId, lock: bool) -> Result<Bank, DatabaseError> {
    let sql = format!("SELECT {BANK_COLUMNS} FROM banks WHERE code = $1{}", lock_clause(lock));
    sqlx::query_as::<_, BankRow>(&sql)
        .bind(DbBankCode::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .map(Bank::from)
        .ok_or_else(|| DatabaseError::not_found("Bank", id))
}

/// The banks in posting order
pub async fn fetch_banks(conn: &mut PgConnection) -> Result<Vec<Bank>, DatabaseError> {
    let sql = format!("SELECT {BANK_COLUMNS} FROM banks ORDER BY posting_order");
    Ok(sqlx::query_as::<_, BankRow>(&sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Bank::from)
        .collect())
}

/// Appends the movement and applies its delta to the bank row
pub async fn apply_movement(conn: &mut PgConnection, movement: &Movement) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO movements (id, bank, related_sale_id, kind, amount, concept, category, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::from(movement.id))
    .bind(DbBankCode::from(movement.bank))
    .bind(movement.related_sale_id.map(Uuid::from))
    .bind(DbMovementKind::from(movement.kind))
    .bind(movement.amount.amount())
    .bind(&movement.concept)
    .bind(DbMovementCategory::from(movement.category))
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    let delta = movement.delta();
    let result = sqlx::query(
        r#"
        UPDATE banks SET
            current_capital = current_capital + $2,
            cumulative_inflow = cumulative_inflow + $3,
            cumulative_outflow = cumulative_outflow + $4,
            updated_at = $5
        WHERE code = $1
        "#,
    )
    .bind(DbBankCode::from(movement.bank))
    .bind(delta.capital.amount())
    .bind(delta.inflow.amount())
    .bind(delta.outflow.amount())
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Bank", movement.bank));
    }
    Ok(())
}

/// Movements linked to a sale, oldest first
pub async fn movements_for_sale(conn: &mut PgConnection, sale_id: SaleId) -> Result<Vec<Movement>, DatabaseError> {
    let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE related_sale_id = $1 ORDER BY seq");
    Ok(sqlx::query_as::<_, MovementRow>(&sql)
        .bind(Uuid::from(sale_id))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Movement::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_clause() {
        assert_eq!(lock_clause(true), " FOR UPDATE");
        assert_eq!(lock_clause(false), "");
    }

    #[test]
    fn test_column_lists_match_row_arity() {
        let count = |columns: &str| columns.split(',').count();
        assert_eq!(count(CLIENT_COLUMNS), 8);
        assert_eq!(count(PURCHASE_ORDER_COLUMNS), 9);
        assert_eq!(count(SALE_COLUMNS), 17);
        assert_eq!(count(LOT_COLUMNS), 5);
        assert_eq!(count(RETURN_COLUMNS), 26);
        assert_eq!(count(BANK_COLUMNS), 5);
        assert_eq!(count(MOVEMENT_COLUMNS), 8);
    }
}
