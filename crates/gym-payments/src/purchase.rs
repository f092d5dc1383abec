//! Plan Purchase
//!
//! Looks up the plan, records a pending invoice and hands back the gateway
//! redirect. The invoice id is the order reference the gateway echoes back.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::TransactionIntent;
use crate::error::{PaymentError, Result};
use crate::gateway::{Gateways, PaymentMethod};
use crate::invoice::{Invoice, InvoiceId, InvoiceStatus, InvoiceStore};
use crate::plan::PlanStore;

/// Attempts at inserting under a fresh id when another writer took it
const INVOICE_ID_ATTEMPTS: usize = 5;

/// Request to buy a plan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub plan_id: String,

    /// Authenticated member id
    pub user_id: String,

    #[serde(default)]
    pub method: PaymentMethod,

    #[serde(default)]
    pub client_ip: Option<IpAddr>,
}

/// Result of starting a purchase
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub invoice_id: InvoiceId,

    /// Gateway URL to redirect the member to
    pub pay_url: String,
}

/// Purchase flow over a plan catalogue and an invoice store
pub struct PurchaseService<P: PlanStore, I: InvoiceStore> {
    plans: Arc<P>,
    invoices: Arc<I>,
    gateways: Arc<Gateways>,

    /// Millis of the last invoice id handed out
    last_issued: AtomicI64,
}

impl<P: PlanStore, I: InvoiceStore> PurchaseService<P, I> {
    pub const fn new(plans: Arc<P>, invoices: Arc<I>, gateways: Arc<Gateways>) -> Self {
        Self {
            plans,
            invoices,
            gateways,
            last_issued: AtomicI64::new(0),
        }
    }

    /// Start a purchase.
    ///
    /// No invoice is written when the plan is unknown or the method is not
    /// available. If the redirect cannot be built after the invoice was
    /// written, the invoice is marked failed before the error is returned.
    pub fn start(&self, request: &PurchaseRequest) -> Result<PurchaseOutcome> {
        let plan = self
            .plans
            .get(&request.plan_id)?
            .ok_or_else(|| PaymentError::PlanNotFound(request.plan_id.clone()))?;

        let gateway = self.gateways.for_method(request.method)?;
        let invoice = self.insert_pending(request, &plan.id, plan.price)?;

        tracing::info!(
            invoice_id = %invoice.id,
            user_id = %request.user_id,
            plan = %plan.id,
            method = %request.method,
            "Created pending invoice"
        );

        let intent = TransactionIntent::new(invoice.id.as_str(), plan.price, plan.order_info())
            .with_client_ip(request.client_ip);
        let payment = match gateway.create_payment(&intent) {
            Ok(payment) => payment,
            Err(e) => {
                tracing::warn!(invoice_id = %invoice.id, error = %e, "Redirect failed, marking invoice failed");
                self.invoices.set_status(&invoice.id, InvoiceStatus::Failed)?;
                return Err(e);
            }
        };

        Ok(PurchaseOutcome {
            invoice_id: invoice.id,
            pay_url: payment.pay_url,
        })
    }

    fn insert_pending(&self, request: &PurchaseRequest, plan_id: &str, amount: Decimal) -> Result<Invoice> {
        let mut last_err = None;

        for _ in 0..INVOICE_ID_ATTEMPTS {
            let invoice = Invoice::pending_at(
                request.user_id.as_str(),
                plan_id,
                amount,
                request.method,
                self.next_invoice_time(),
            );

            match self.invoices.insert(&invoice) {
                Ok(()) => return Ok(invoice),
                Err(e @ PaymentError::DuplicateInvoice(_)) => {
                    tracing::debug!(invoice_id = %invoice.id, "Invoice id taken, issuing the next one");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| PaymentError::Storage("no invoice id available".into())))
    }

    /// Creation time for the next invoice, strictly after the last one issued.
    ///
    /// Ids are millisecond timestamps, so a burst within one millisecond is
    /// spread over the following ones.
    fn next_invoice_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now_millis = now.timestamp_millis();
        let next = |last: i64| now_millis.max(last + 1);

        let issued = match self
            .last_issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(next(last)))
        {
            Ok(last) | Err(last) => next(last),
        };

        DateTime::from_timestamp_millis(issued).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::tests::test_config;
    use crate::encoding::FieldSet;
    use crate::gateway::VnPayGateway;
    use crate::invoice::MemoryInvoiceStore;
    use crate::plan::{MemoryPlanStore, Plan, default_plans};

    fn service() -> (PurchaseService<MemoryPlanStore, MemoryInvoiceStore>, Arc<MemoryInvoiceStore>) {
        let invoices = Arc::new(MemoryInvoiceStore::new());
        let gateways = Arc::new(Gateways::new(VnPayGateway::new(test_config()).unwrap()));
        let service = PurchaseService::new(Arc::new(MemoryPlanStore::default()), invoices.clone(), gateways);
        (service, invoices)
    }

    fn request(plan_id: &str, method: PaymentMethod) -> PurchaseRequest {
        PurchaseRequest {
            plan_id: plan_id.into(),
            user_id: "user-1".into(),
            method,
            client_ip: None,
        }
    }

    #[test]
    fn test_purchase_creates_pending_invoice_and_url() {
        let (service, invoices) = service();
        let outcome = service.start(&request("standard", PaymentMethod::VnPay)).unwrap();

        let invoice = invoices.get(&outcome.invoice_id).unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.amount, dec!(499000));
        assert_eq!(invoice.plan_id, "standard");

        let (_, query) = outcome.pay_url.split_once('?').unwrap();
        let fields = FieldSet::from_query(query).unwrap();
        assert_eq!(fields.get("vnp_Amount"), Some("49900000"));
        assert_eq!(fields.get("vnp_OrderInfo"), Some("ThanhtoanGymX Standard"));
        assert_eq!(
            fields.get("vnp_TxnRef"),
            outcome.invoice_id.as_str().strip_prefix("INV")
        );
    }

    #[test]
    fn test_unknown_plan_writes_nothing() {
        let (service, invoices) = service();
        let err = service.start(&request("platinum", PaymentMethod::VnPay)).unwrap_err();
        assert!(matches!(err, PaymentError::PlanNotFound(id) if id == "platinum"));
        assert_eq!(invoices.len().unwrap(), 0);
    }

    #[test]
    fn test_momo_rejected_before_invoice() {
        let (service, invoices) = service();
        let err = service.start(&request("pro", PaymentMethod::Momo)).unwrap_err();
        assert!(matches!(err, PaymentError::MethodUnavailable(PaymentMethod::Momo)));
        assert_eq!(invoices.len().unwrap(), 0);
    }

    #[test]
    fn test_back_to_back_purchases_get_distinct_invoices() {
        let (service, invoices) = service();
        let first = service.start(&request("starter", PaymentMethod::VnPay)).unwrap();
        let second = service.start(&request("starter", PaymentMethod::VnPay)).unwrap();
        assert_ne!(first.invoice_id, second.invoice_id);
        assert_eq!(invoices.len().unwrap(), 2);
    }

    #[test]
    fn test_burst_of_purchases_all_succeed() {
        let (service, invoices) = service();
        let mut ids = HashSet::new();

        for _ in 0..200 {
            let outcome = service.start(&request("starter", PaymentMethod::VnPay)).unwrap();
            assert!(outcome.invoice_id.as_str().starts_with("INV"));
            assert!(ids.insert(outcome.invoice_id));
        }

        assert_eq!(invoices.len().unwrap(), 200);
    }

    #[test]
    fn test_ids_taken_by_another_writer_are_skipped() {
        let (service, invoices) = service();
        let now = Utc::now();
        for offset in 0..3 {
            let taken = Invoice::pending_at(
                "other",
                "pro",
                dec!(799000),
                PaymentMethod::VnPay,
                now + Duration::milliseconds(offset),
            );
            invoices.insert(&taken).unwrap();
        }

        let outcome = service.start(&request("starter", PaymentMethod::VnPay)).unwrap();
        let invoice = invoices.get(&outcome.invoice_id).unwrap().unwrap();
        assert_eq!(invoice.user_id, "user-1");
        assert_eq!(invoices.len().unwrap(), 4);
    }

    #[test]
    fn test_failed_redirect_marks_invoice_failed() {
        let invoices = Arc::new(MemoryInvoiceStore::new());
        let gateways = Arc::new(Gateways::new(VnPayGateway::new(test_config()).unwrap()));
        let free = Plan {
            price: dec!(0),
            ..default_plans().remove(0)
        };
        let service = PurchaseService::new(Arc::new(MemoryPlanStore::with_plans([free])), invoices.clone(), gateways);

        let err = service.start(&request("starter", PaymentMethod::VnPay)).unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        assert_eq!(invoices.len().unwrap(), 1);
        let id = InvoiceId::at(DateTime::from_timestamp_millis(service.last_issued.load(Ordering::Acquire)).unwrap());
        assert_eq!(invoices.get(&id).unwrap().unwrap().status, InvoiceStatus::Failed);
    }
}
