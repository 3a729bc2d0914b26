//! Read-side services over the ledger store

use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{Clock, PurchaseOrderId};
use domain_sales::LedgerStore;

use crate::error::AnalyticsError;
use crate::oc_metrics::{DownstreamSale, MetricsThresholds, PurchaseOrderMetrics};

/// Computes purchase order metrics from committed data
///
/// Reads happen outside any transaction; the result is a point-in-time
/// projection and is never written back.
pub struct PurchaseOrderMetricsService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    thresholds: MetricsThresholds,
}

impl<S: LedgerStore> PurchaseOrderMetricsService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            thresholds: MetricsThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MetricsThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &MetricsThresholds {
        &self.thresholds
    }

    #[instrument(skip(self), fields(purchase_order_id = %order_id))]
    pub async fn get_purchase_order_metrics(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrderMetrics, AnalyticsError> {
        let order = self
            .store
            .purchase_order(order_id)
            .await?
            .ok_or(AnalyticsError::PurchaseOrderNotFound(order_id))?;

        let sales: Vec<DownstreamSale> = self
            .store
            .sales_for_purchase_order(order_id)
            .await?
            .iter()
            .filter_map(|sale| DownstreamSale::attributable(sale, order_id))
            .collect();
        debug!(sales = sales.len(), "Computing purchase order metrics");

        Ok(PurchaseOrderMetrics::compute(&order, &sales, &self.thresholds, self.clock.now()))
    }
}
