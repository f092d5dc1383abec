//! Application State

use std::sync::Arc;

use gym_payments::{Gateways, MemoryInvoiceStore, MemoryPlanStore, PurchaseService};

/// Plan purchase service over the in-memory stores
pub type Purchases = PurchaseService<MemoryPlanStore, MemoryInvoiceStore>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment gateways, built from configuration at startup
    pub gateways: Arc<Gateways>,

    /// Membership plan catalogue
    pub plans: Arc<MemoryPlanStore>,

    /// Plan purchase flow (plans + invoices + gateways)
    pub purchases: Arc<Purchases>,
}

impl AppState {
    pub fn new(gateways: Gateways, plans: MemoryPlanStore, invoices: MemoryInvoiceStore) -> Self {
        let gateways = Arc::new(gateways);
        let plans = Arc::new(plans);
        let purchases = Arc::new(PurchaseService::new(
            plans.clone(),
            Arc::new(invoices),
            gateways.clone(),
        ));

        Self {
            gateways,
            plans,
            purchases,
        }
    }
}
