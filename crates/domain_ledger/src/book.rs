//! In-memory bank book
//!
//! Holds the three banks and the movement journal behind the in-memory
//! store adapter.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use core_kernel::{Money, SaleId};
use crate::bank::{Bank, BankId};
use crate::movement::Movement;

/// The three banks plus their journal
#[derive(Debug, Clone)]
pub struct BankBook {
    banks: BTreeMap<BankId, Bank>,
    journal: Vec<Movement>,
}

impl BankBook {
    /// Creates a book with all three banks empty
    pub fn new() -> Self {
        Self {
            banks: BankId::ALL.iter().map(|id| (*id, Bank::empty(*id))).collect(),
            journal: Vec::new(),
        }
    }

    /// Appends a movement and applies its delta to the target bank
    pub fn apply(&mut self, movement: Movement) {
        let delta = movement.delta();
        let at: DateTime<Utc> = movement.created_at;
        self.banks
            .entry(movement.bank)
            .or_insert_with(|| Bank::empty(movement.bank))
            .apply(&delta, at);
        self.journal.push(movement);
    }

    pub fn bank(&self, id: BankId) -> Bank {
        self.banks.get(&id).cloned().unwrap_or_else(|| Bank::empty(id))
    }

    /// All banks in posting order
    pub fn banks(&self) -> Vec<Bank> {
        BankId::ALL.iter().map(|id| self.bank(*id)).collect()
    }

    pub fn journal(&self) -> &[Movement] {
        &self.journal
    }

    /// Movements linked to a sale, oldest first
    pub fn movements_for_sale(&self, sale_id: SaleId) -> Vec<Movement> {
        self.journal
            .iter()
            .filter(|m| m.related_sale_id == Some(sale_id))
            .cloned()
            .collect()
    }

    /// Sum of current capital across all banks
    pub fn total_capital(&self) -> Money {
        self.banks.values().map(|b| b.current_capital).sum()
    }
}

impl Default for BankBook {
    fn default() -> Self {
        Self::new()
    }
}
