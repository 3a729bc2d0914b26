//! Return workflow and reversal

use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{Clock, Money, PortError, ReturnId, UserId};
use domain_ledger::{distribution_movements, MovementCategory, MovementKind};

use crate::client::ClientAdjustment;
use crate::error::SalesError;
use crate::ports::{LedgerSession, LedgerStore, ReturnFilter};
use crate::returns::{processed_quantity, returnable_quantity, ReturnRequest, ReturnState, SaleReturn};
use super::complete;

/// Drives returns through request, approval and processing
pub struct ReturnService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> ReturnService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records a return request; nothing in the ledger changes yet
    ///
    /// # Errors
    ///
    /// - `SaleNotFound` if the sale does not exist
    /// - `SaleClosed` if the sale was returned or cancelled
    /// - `DuplicateReturnRequest` if a request is already pending for the sale
    /// - `InvalidReturnQuantity` if the quantity is zero or exceeds what is
    ///   still returnable
    #[instrument(skip(self, request), fields(sale_id = %request.sale_id, quantity = request.quantity))]
    pub async fn request_return(&self, request: ReturnRequest) -> Result<SaleReturn, SalesError> {
        let mut session = self.store.begin().await?;
        let outcome = self.request_return_in(&mut session, &request).await;
        let ret = complete(session, outcome).await?;

        info!(
            return_id = %ret.id,
            kind = ret.kind.code(),
            reversal = %ret.reversal.total,
            refund = %ret.refund_amount,
            "Return requested"
        );
        Ok(ret)
    }

    async fn request_return_in(
        &self,
        session: &mut S::Session,
        request: &ReturnRequest,
    ) -> Result<SaleReturn, SalesError> {
        let sale = session
            .sale_for_update(request.sale_id)
            .await?
            .ok_or(SalesError::SaleNotFound(request.sale_id))?;
        sale.ensure_open()?;

        let existing = session.returns_for_sale(sale.id).await?;
        if existing.iter().any(|r| r.state == ReturnState::Requested) {
            warn!("Duplicate return request");
            return Err(SalesError::DuplicateReturnRequest(sale.id));
        }

        let available = returnable_quantity(&sale, &existing);
        let mut ret = SaleReturn::request(&sale, request, available, self.clock.now())?;
        ret.settle(&sale, &existing);
        session.insert_return(&ret).await.map_err(|error| match error {
            PortError::Conflict { .. } => SalesError::DuplicateReturnRequest(sale.id),
            other => other.into(),
        })?;
        Ok(ret)
    }

    /// Approves a requested return
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn approve_return(&self, return_id: ReturnId, approver: UserId) -> Result<SaleReturn, SalesError> {
        let mut session = self.store.begin().await?;
        let outcome: Result<SaleReturn, SalesError> = async {
            let mut ret = self.locked_return(&mut session, return_id).await?;
            ret.approve(approver, self.clock.now())?;
            session.update_return(&ret).await?;
            Ok(ret)
        }
        .await;
        let ret = complete(session, outcome).await?;

        info!(approved_by = %approver, "Return approved");
        Ok(ret)
    }

    /// Applies an approved return to the ledger
    ///
    /// In one transaction: the refund is settled against the sale's current
    /// payments, one outflow per bank covers the reversal, the
    /// client's balance drops by the forgiven and refunded amounts, the
    /// units go back to stock when requested and the sale is marked
    /// returned once every unit has come back.
    ///
    /// # Errors
    ///
    /// - `ReturnNotFound` if the return does not exist
    /// - `InvalidStateTransition` unless the return is approved
    /// - `SaleClosed` if the sale was cancelled meanwhile
    /// - `TransactionFailed` if the store aborts
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn process_return(&self, return_id: ReturnId, processor: UserId) -> Result<SaleReturn, SalesError> {
        let mut session = self.store.begin().await?;
        let outcome = self.process_return_in(&mut session, return_id, processor).await;
        let ret = complete(session, outcome).await?;

        info!(
            sale_id = %ret.sale_id,
            cost = %ret.reversal.cost_pool,
            freight = %ret.reversal.freight_pool,
            profit = %ret.reversal.profit_pool,
            refund = %ret.refund_amount,
            "Return processed"
        );
        Ok(ret)
    }

    async fn process_return_in(
        &self,
        session: &mut S::Session,
        return_id: ReturnId,
        processor: UserId,
    ) -> Result<SaleReturn, SalesError> {
        let mut ret = self.locked_return(session, return_id).await?;
        ret.ensure_transition(ReturnState::Processed)?;
        let now = self.clock.now();

        let mut sale = session
            .sale_for_update(ret.sale_id)
            .await?
            .ok_or(SalesError::SaleNotFound(ret.sale_id))?;
        sale.ensure_open()?;

        let previous = session.returns_for_sale(sale.id).await?;
        ret.settle(&sale, &previous);
        ret.mark_processed(processor, now)?;

        let short = ret.id.short();
        let movements = distribution_movements(
            &ret.reversal,
            MovementKind::Outflow,
            MovementCategory::Return,
            sale.id,
            now,
            |bank| format!("Return #{} reversal ({})", short, bank.pool_label()),
        )?;
        for movement in &movements {
            session.apply_movement(movement).await?;
        }

        session
            .adjust_client(
                sale.client_id,
                &ClientAdjustment::return_settlement(ret.reversal.total, ret.forgiven_amount, ret.refund_amount),
            )
            .await?;

        if let Some(order_id) = ret.restock_purchase_order_id.filter(|_| ret.restock) {
            let order = session
                .purchase_order_for_update(order_id)
                .await?
                .ok_or(SalesError::PurchaseOrderNotFound(order_id))?;
            let units = order.restockable(ret.requested_quantity);
            if units > 0 {
                session
                    .adjust_purchase_order(order_id, i64::from(units), Money::zero())
                    .await?;
            }
        }

        let returned = processed_quantity(&previous) + ret.requested_quantity;
        if returned >= sale.quantity {
            sale.mark_returned(now)?;
            session.update_sale(&sale).await?;
        }

        session.update_return(&ret).await?;
        Ok(ret)
    }

    /// Rejects a requested return; no ledger effect
    #[instrument(skip(self, reason), fields(return_id = %return_id))]
    pub async fn reject_return(&self, return_id: ReturnId, reason: &str) -> Result<SaleReturn, SalesError> {
        let mut session = self.store.begin().await?;
        let outcome: Result<SaleReturn, SalesError> = async {
            let mut ret = self.locked_return(&mut session, return_id).await?;
            ret.reject(reason, self.clock.now())?;
            session.update_return(&ret).await?;
            Ok(ret)
        }
        .await;
        let ret = complete(session, outcome).await?;

        info!(reason, "Return rejected");
        Ok(ret)
    }

    pub async fn get_return(&self, return_id: ReturnId) -> Result<SaleReturn, SalesError> {
        self.store
            .sale_return(return_id)
            .await?
            .ok_or(SalesError::ReturnNotFound(return_id))
    }

    /// Returns matching `filter`, newest first
    pub async fn list_returns(&self, filter: &ReturnFilter) -> Result<Vec<SaleReturn>, SalesError> {
        Ok(self.store.list_returns(filter).await?)
    }

    /// Number of returns waiting for a decision
    pub async fn count_pending_returns(&self) -> Result<u64, SalesError> {
        Ok(self.store.count_returns(ReturnState::Requested).await?)
    }

    async fn locked_return(&self, session: &mut S::Session, return_id: ReturnId) -> Result<SaleReturn, SalesError> {
        session
            .return_for_update(return_id)
            .await?
            .ok_or(SalesError::ReturnNotFound(return_id))
    }
}
