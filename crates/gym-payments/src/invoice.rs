//! Invoice Records
//!
//! A pending invoice is written before the member is redirected to the
//! gateway; its id doubles as the order reference.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::gateway::PaymentMethod;

/// Invoice id (formatted: INV<epoch millis>)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(String);

impl InvoiceId {
    /// Id for an invoice created at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(format!("INV{}", now.timestamp_millis()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// An invoice record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,

    /// Member who is paying
    pub user_id: String,

    pub plan_id: String,

    /// Amount in VND
    pub amount: Decimal,

    pub method: PaymentMethod,

    pub status: InvoiceStatus,

    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a pending invoice
    pub fn pending(
        user_id: impl Into<String>,
        plan_id: impl Into<String>,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Self {
        Self::pending_at(user_id, plan_id, amount, method, Utc::now())
    }

    pub fn pending_at(
        user_id: impl Into<String>,
        plan_id: impl Into<String>,
        amount: Decimal,
        method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceId::at(created_at),
            user_id: user_id.into(),
            plan_id: plan_id.into(),
            amount,
            method,
            status: InvoiceStatus::Pending,
            created_at,
        }
    }
}

/// Invoice storage trait
pub trait InvoiceStore: Send + Sync {
    /// Insert a new invoice; an existing id is an error
    fn insert(&self, invoice: &Invoice) -> Result<()>;

    /// Get invoice by id
    fn get(&self, id: &InvoiceId) -> Result<Option<Invoice>>;

    /// Update the status of an existing invoice
    fn set_status(&self, id: &InvoiceId, status: InvoiceStatus) -> Result<()>;
}

/// In-memory invoice store (for development)
#[derive(Default)]
pub struct MemoryInvoiceStore {
    invoices: RwLock<HashMap<InvoiceId, Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored invoices
    pub fn len(&self) -> Result<usize> {
        self.invoices
            .read()
            .map(|invoices| invoices.len())
            .map_err(|_| PaymentError::Storage("invoice store lock poisoned".into()))
    }
}

impl InvoiceStore for MemoryInvoiceStore {
    fn insert(&self, invoice: &Invoice) -> Result<()> {
        let mut invoices = self
            .invoices
            .write()
            .map_err(|_| PaymentError::Storage("invoice store lock poisoned".into()))?;

        if invoices.contains_key(&invoice.id) {
            return Err(PaymentError::DuplicateInvoice(invoice.id.to_string()));
        }

        invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    fn get(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        let invoices = self
            .invoices
            .read()
            .map_err(|_| PaymentError::Storage("invoice store lock poisoned".into()))?;
        Ok(invoices.get(id).cloned())
    }

    fn set_status(&self, id: &InvoiceId, status: InvoiceStatus) -> Result<()> {
        let mut invoices = self
            .invoices
            .write()
            .map_err(|_| PaymentError::Storage("invoice store lock poisoned".into()))?;

        let invoice = invoices
            .get_mut(id)
            .ok_or_else(|| PaymentError::Storage(format!("invoice {id} not found")))?;
        invoice.status = status;
        Ok(())
    }
}
