//! Purchase orders and distributor payments

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{Clock, Money, PurchaseOrderId};
use domain_ledger::{BankId, Movement, MovementCategory, MovementKind};

use crate::error::SalesError;
use crate::ports::{LedgerSession, LedgerStore};
use crate::purchase_order::{NewPurchaseOrder, PurchaseOrder};
use super::complete;

/// Records distributor purchases and settles what is owed on them
pub struct PurchasingService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> PurchasingService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records a purchase order with its full quantity in stock
    ///
    /// An initial payment is taken as settled at order time and does not
    /// move capital; later payments go through [`Self::pay_distributor`].
    #[instrument(skip(self, input), fields(distributor_id = %input.distributor_id, quantity = input.quantity))]
    pub async fn create_purchase_order(&self, input: NewPurchaseOrder) -> Result<PurchaseOrder, SalesError> {
        let order = PurchaseOrder::new(&input, self.clock.now())?;

        let mut session = self.store.begin().await?;
        let outcome = session.insert_purchase_order(&order).await.map_err(SalesError::from);
        complete(session, outcome).await?;

        info!(purchase_order_id = %order.id, total_cost = %order.total_cost, "Purchase order created");
        Ok(order)
    }

    /// Pays part of a purchase order's debt out of `origin`
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `PurchaseOrderNotFound` if the order does not exist
    /// - `ExcessPayment` if `amount` exceeds the remaining debt
    /// - `InsufficientFunds` if `origin` cannot cover `amount`
    #[instrument(skip(self), fields(purchase_order_id = %order_id, amount = %amount, origin = %origin))]
    pub async fn pay_distributor(
        &self,
        order_id: PurchaseOrderId,
        amount: Money,
        origin: BankId,
    ) -> Result<PurchaseOrder, SalesError> {
        if !amount.is_positive() {
            return Err(SalesError::InvalidAmount(amount.amount()));
        }

        let mut session = self.store.begin().await?;
        let outcome = self.pay_distributor_in(&mut session, order_id, amount, origin).await;
        let order = complete(session, outcome).await?;

        info!(paid = %order.paid_to_distributor, debt = %order.debt(), "Distributor paid");
        Ok(order)
    }

    async fn pay_distributor_in(
        &self,
        session: &mut S::Session,
        order_id: PurchaseOrderId,
        amount: Money,
        origin: BankId,
    ) -> Result<PurchaseOrder, SalesError> {
        let mut order = session
            .purchase_order_for_update(order_id)
            .await?
            .ok_or(SalesError::PurchaseOrderNotFound(order_id))?;
        let debt = order.debt();
        if amount > debt {
            return Err(SalesError::ExcessPayment {
                amount: amount.amount(),
                remaining: debt.amount(),
            });
        }

        let bank = session.bank_for_update(origin).await?;
        bank.ensure_available(amount)?;

        let movement = Movement::record(
            origin,
            MovementKind::Outflow,
            amount,
            format!("OC #{} distributor payment", order.id.short()),
            MovementCategory::DistributorPayment,
            self.clock.now(),
        )?;
        session.apply_movement(&movement).await?;
        session.adjust_purchase_order(order.id, 0, amount).await?;

        order.paid_to_distributor += amount;
        Ok(order)
    }

    pub async fn get_purchase_order(&self, order_id: PurchaseOrderId) -> Result<PurchaseOrder, SalesError> {
        self.store
            .purchase_order(order_id)
            .await?
            .ok_or(SalesError::PurchaseOrderNotFound(order_id))
    }
}
