//! Transfers between banks

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{Clock, Money};
use domain_ledger::{plan_transfer, Bank, BankId, LedgerError, TransferPlan};

use crate::error::SalesError;
use crate::ports::{LedgerSession, LedgerStore};
use super::complete;

/// Moves capital between the three banks
pub struct TreasuryService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> TreasuryService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Transfers `amount` from one bank to another
    ///
    /// The origin balance is checked under lock inside the transaction.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `Ledger(SameBankTransfer)` if both ends are the same bank
    /// - `InsufficientFunds` if the origin cannot cover `amount`
    /// - `TransactionFailed` if the store aborts
    #[instrument(skip(self, concept), fields(from = %from, to = %to, amount = %amount))]
    pub async fn transfer_between_banks(
        &self,
        from: BankId,
        to: BankId,
        amount: Money,
        concept: &str,
    ) -> Result<TransferPlan, SalesError> {
        if !amount.is_positive() {
            return Err(SalesError::InvalidAmount(amount.amount()));
        }
        if from == to {
            return Err(LedgerError::SameBankTransfer(from).into());
        }

        let mut session = self.store.begin().await?;
        let outcome = self.transfer_in(&mut session, from, to, amount, concept).await;
        let plan = complete(session, outcome).await?;

        info!("Transfer completed");
        Ok(plan)
    }

    async fn transfer_in(
        &self,
        session: &mut S::Session,
        from: BankId,
        to: BankId,
        amount: Money,
        concept: &str,
    ) -> Result<TransferPlan, SalesError> {
        // Lock both banks in a fixed order so opposing transfers cannot deadlock
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first = session.bank_for_update(first).await?;
        let second = session.bank_for_update(second).await?;
        let origin = if first.id == from { first } else { second };

        let plan = plan_transfer(&origin, to, amount, concept, self.clock.now())?;
        session.apply_movement(&plan.outgoing).await?;
        session.apply_movement(&plan.incoming).await?;
        Ok(plan)
    }

    /// Current balances of the three banks
    pub async fn bank_balances(&self) -> Result<Vec<Bank>, SalesError> {
        Ok(self.store.banks().await?)
    }
}
