//! # gym-payments
//!
//! Membership checkout for GymX: plan catalogue, invoices and signed
//! redirects to the VNPAY hosted payment page.
//!
//! ## Hosted redirect flow
//!
//! ```text
//! ┌─────────────┐  signed URL  ┌─────────────────┐  signed callback  ┌─────────────┐
//! │  Checkout   │─────────────▶│  VNPAY Hosted   │──────────────────▶│  Return /   │
//! │  (plan)     │              │  Payment Page   │                   │  IPN URL    │
//! └─────────────┘              └─────────────────┘                   └─────────────┘
//! ```
//!
//! The redirect URL is `base?<canonical query>&vnp_SecureHash=<hmac>`:
//!
//! 1. Fields are sorted by name (byte order).
//! 2. Each value is percent-encoded with the RFC 3986 unreserved set, so a
//!    space is `%20` and `! ' ( ) *` are escaped.
//! 3. The resulting string is signed with HMAC-SHA512 and sent unchanged;
//!    the bytes the gateway verifies are the bytes that were signed.
//!
//! Callbacks are checked with the same encoder and signer in reverse.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gym_payments::{GatewayConfig, TransactionIntent, create_payment_request};
//! use rust_decimal_macros::dec;
//!
//! let config = GatewayConfig::from_env()?;
//! let intent = TransactionIntent::new("INV1714529103000", dec!(299000), "ThanhtoanGymX Starter");
//!
//! let request = create_payment_request(&intent, &config)?;
//! // Redirect the member to: request.pay_url
//! ```

mod callback;
mod checkout;
mod config;
mod encoding;
mod error;
mod gateway;
mod invoice;
mod plan;
mod purchase;
mod signer;

pub use callback::{GatewayCallback, verify_callback, verify_signed_fields};
pub use checkout::{
    PaymentRequest, SECURE_HASH_FIELD, TransactionIntent, create_payment_request, format_create_date,
    normalize_order_reference, to_minor_units,
};
pub use config::GatewayConfig;
pub use encoding::{FieldSet, canonical_query, encode_component};
pub use error::{PaymentError, Result};
pub use gateway::{Gateways, MethodStatus, PaymentGateway, PaymentMethod, VnPayGateway};
pub use invoice::{Invoice, InvoiceId, InvoiceStatus, InvoiceStore, MemoryInvoiceStore};
pub use plan::{MemoryPlanStore, Plan, PlanStore, default_plans};
pub use purchase::{PurchaseOutcome, PurchaseRequest, PurchaseService};
pub use signer::{Signature, sign, verify};
