//! Sale lifecycle: creation, payments, cancellation

use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{Clock, Money, SaleId};
use domain_distribution::{validate_margin, validate_sale_input, Distribution, ValidationReport};
use domain_ledger::{distribution_movements, BankId, Movement, MovementCategory, MovementKind};

use crate::client::ClientAdjustment;
use crate::error::SalesError;
use crate::ports::{LedgerSession, LedgerStore};
use crate::returns::ReturnState;
use crate::sale::{LotAllocation, NewSale, Sale};
use super::{complete, SalesPolicy};

/// Owns the sale state machine and its ledger effects
pub struct SaleLifecycleService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: SalesPolicy,
}

impl<S: LedgerStore> SaleLifecycleService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            policy: SalesPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SalesPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SalesPolicy {
        &self.policy
    }

    /// Computes the distribution a sale would produce, without recording it
    pub fn compute_distribution(&self, input: &NewSale) -> Result<Distribution, SalesError> {
        Ok(input.economics(self.policy.default_freight).distribution()?)
    }

    /// Checks a sale line without touching the store
    pub fn validate_sale_input(&self, input: &NewSale) -> ValidationReport {
        validate_sale_input(&input.economics(self.policy.default_freight))
    }

    /// Records a sale and routes its full distribution into the three banks
    ///
    /// In one transaction: lot stock is drawn, the sale is inserted, one
    /// inflow per bank is appended and the client's balance grows by the
    /// sale total.
    ///
    /// # Errors
    ///
    /// - `InvalidSaleInput` with every field error of the sale line
    /// - `InvalidLots` if lot quantities do not cover the sale
    /// - `ClientNotFound` if the client does not exist
    /// - `NegativeMargin` if the profit pool would be negative
    /// - `PurchaseOrderNotFound` / `InsufficientStock` for a bad lot
    /// - `TransactionFailed` if the store aborts
    #[instrument(skip(self, input), fields(client_id = %input.client_id, quantity = input.quantity))]
    pub async fn create_sale(&self, input: NewSale) -> Result<Sale, SalesError> {
        let report = self.validate_sale_input(&input);
        if !report.is_valid() {
            warn!(errors = ?report.errors, "Sale input rejected");
            return Err(SalesError::InvalidSaleInput(report.errors));
        }
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        let distribution = self.compute_distribution(&input)?;
        input.validate_lots()?;

        let mut session = self.store.begin().await?;
        let outcome = self.create_sale_in(&mut session, &input, distribution).await;
        let sale = complete(session, outcome).await?;

        info!(
            sale_id = %sale.id,
            total = %sale.total_amount,
            cost = %sale.distribution.cost_pool,
            freight = %sale.distribution.freight_pool,
            profit = %sale.distribution.profit_pool,
            "Sale created"
        );
        Ok(sale)
    }

    async fn create_sale_in(
        &self,
        session: &mut S::Session,
        input: &NewSale,
        distribution: Distribution,
    ) -> Result<Sale, SalesError> {
        session
            .client_for_update(input.client_id)
            .await?
            .ok_or(SalesError::ClientNotFound(input.client_id))?;

        let margin = validate_margin(&distribution, self.policy.low_margin_percent);
        if !margin.allowed {
            warn!(margin_percent = %margin.margin_percent, "Sale rejected for negative margin");
            return Err(SalesError::NegativeMargin {
                margin_percent: margin.margin_percent,
            });
        }
        for warning in &margin.warnings {
            warn!(margin_percent = %margin.margin_percent, "{}", warning);
        }

        let mut lots = Vec::with_capacity(input.lots.len());
        for lot in &input.lots {
            let order = session
                .purchase_order_for_update(lot.purchase_order_id)
                .await?
                .ok_or(SalesError::PurchaseOrderNotFound(lot.purchase_order_id))?;
            order.ensure_stock(lot.quantity)?;
            session
                .adjust_purchase_order(order.id, -i64::from(lot.quantity), Money::zero())
                .await?;
            lots.push(LotAllocation {
                purchase_order_id: order.id,
                quantity: lot.quantity,
                unit_cost: order.unit_landed_cost(),
            });
        }

        let now = self.clock.now();
        let economics = input.economics(self.policy.default_freight);
        let sale = Sale::open(input, &economics, distribution, lots, now);
        session.insert_sale(&sale).await?;

        let short = sale.id.short();
        let movements = distribution_movements(
            &sale.distribution,
            MovementKind::Inflow,
            MovementCategory::Sale,
            sale.id,
            now,
            |bank| match bank {
                BankId::Profit => format!("Sale #{} profit ({}%)", short, margin.margin_percent),
                other => format!("Sale #{} {}", short, other.pool_label()),
            },
        )?;
        for movement in &movements {
            session.apply_movement(movement).await?;
        }

        session
            .adjust_client(sale.client_id, &ClientAdjustment::sale(sale.total_amount, now))
            .await?;
        Ok(sale)
    }

    /// Applies a payment toward a sale
    ///
    /// The remaining amount is re-read under lock inside the transaction, so
    /// concurrent payments against one sale can never overpay it. The whole
    /// payment lands in the cost-recovery bank.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `SaleNotFound` if the sale does not exist
    /// - `SaleClosed` if the sale was returned or cancelled
    /// - `ExcessPayment` if `amount` exceeds the remaining balance
    /// - `TransactionFailed` if the store aborts
    #[instrument(skip(self), fields(sale_id = %sale_id, amount = %amount))]
    pub async fn register_payment(&self, sale_id: SaleId, amount: Money) -> Result<Sale, SalesError> {
        if !amount.is_positive() {
            return Err(SalesError::InvalidAmount(amount.amount()));
        }

        let mut session = self.store.begin().await?;
        let outcome = self.register_payment_in(&mut session, sale_id, amount).await;
        let sale = complete(session, outcome).await?;

        info!(
            paid = %sale.paid_amount,
            remaining = %sale.remaining_amount,
            payment_state = %sale.payment_state,
            "Payment registered"
        );
        Ok(sale)
    }

    async fn register_payment_in(
        &self,
        session: &mut S::Session,
        sale_id: SaleId,
        amount: Money,
    ) -> Result<Sale, SalesError> {
        let mut sale = session
            .sale_for_update(sale_id)
            .await?
            .ok_or(SalesError::SaleNotFound(sale_id))?;

        let now = self.clock.now();
        if let Err(error) = sale.apply_payment(amount, now) {
            warn!(error = %error, "Payment rejected");
            return Err(error);
        }
        session.update_sale(&sale).await?;

        let movement = Movement::record(
            BankId::CostRecovery,
            MovementKind::Inflow,
            amount,
            format!("Sale #{} payment", sale.id.short()),
            MovementCategory::Payment,
            now,
        )?
        .for_sale(sale.id);
        session.apply_movement(&movement).await?;

        session
            .adjust_client(sale.client_id, &ClientAdjustment::payment(amount))
            .await?;
        Ok(sale)
    }

    /// Voids an unpaid sale and reverses everything its creation did
    ///
    /// # Errors
    ///
    /// - `SaleNotFound` if the sale does not exist
    /// - `SaleClosed` if the sale was already returned or cancelled
    /// - `InvalidStateTransition` if the sale has payments or open returns
    /// - `TransactionFailed` if the store aborts
    #[instrument(skip(self, reason), fields(sale_id = %sale_id))]
    pub async fn cancel_sale(&self, sale_id: SaleId, reason: &str) -> Result<Sale, SalesError> {
        let mut session = self.store.begin().await?;
        let outcome = self.cancel_sale_in(&mut session, sale_id, reason).await;
        let sale = complete(session, outcome).await?;

        info!(total = %sale.total_amount, reason, "Sale cancelled");
        Ok(sale)
    }

    async fn cancel_sale_in(
        &self,
        session: &mut S::Session,
        sale_id: SaleId,
        reason: &str,
    ) -> Result<Sale, SalesError> {
        let mut sale = session
            .sale_for_update(sale_id)
            .await?
            .ok_or(SalesError::SaleNotFound(sale_id))?;
        sale.ensure_open()?;

        let returns = session.returns_for_sale(sale_id).await?;
        if returns.iter().any(|r| r.state != ReturnState::Rejected) {
            return Err(SalesError::InvalidStateTransition {
                entity: "sale",
                from: "active with returns".to_string(),
                to: "cancelled".to_string(),
            });
        }

        let now = self.clock.now();
        sale.cancel(now)?;
        session.update_sale(&sale).await?;

        let short = sale.id.short();
        let movements = distribution_movements(
            &sale.distribution,
            MovementKind::Outflow,
            MovementCategory::Cancellation,
            sale.id,
            now,
            |bank| format!("Sale #{} {} cancelled: {}", short, bank.pool_label(), reason),
        )?;
        for movement in &movements {
            session.apply_movement(movement).await?;
        }

        session
            .adjust_client(sale.client_id, &ClientAdjustment::cancellation(sale.total_amount))
            .await?;

        for lot in &sale.lots {
            session
                .adjust_purchase_order(lot.purchase_order_id, i64::from(lot.quantity), Money::zero())
                .await?;
        }
        Ok(sale)
    }

    /// Reads a sale
    pub async fn get_sale(&self, sale_id: SaleId) -> Result<Sale, SalesError> {
        self.store
            .sale(sale_id)
            .await?
            .ok_or(SalesError::SaleNotFound(sale_id))
    }

    /// The paid share of a sale's distribution, computed on demand
    pub async fn payment_distribution(&self, sale_id: SaleId) -> Result<Distribution, SalesError> {
        Ok(self.get_sale(sale_id).await?.payment_distribution())
    }
}
