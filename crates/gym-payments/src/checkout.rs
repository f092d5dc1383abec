//! VNPAY Checkout Integration
//!
//! Turns a transaction intent into a signed redirect URL for the hosted
//! VNPAY payment page. Nothing here talks to the network; following the
//! redirect is the browser's job.

use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, FixedOffset, Local};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::encoding::{FieldSet, canonical_query};
use crate::error::{PaymentError, Result};
use crate::signer::{Signature, sign};

pub const VNP_VERSION: &str = "2.1.0";
pub const VNP_COMMAND_PAY: &str = "pay";
pub const VNP_CURRENCY: &str = "VND";
pub const VNP_ORDER_TYPE: &str = "other";

/// Query parameter carrying the signature; never part of the signed payload
pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";

/// Longest transaction reference the gateway accepts
pub const MAX_TXN_REF_LEN: usize = 32;

/// One checkout attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Caller's order identifier, e.g. an invoice id
    pub order_reference: String,

    /// Amount in the major currency unit (VND)
    pub amount: Decimal,

    /// Free-text order description shown by the gateway
    pub description: String,

    /// Creation time; its wall clock becomes `vnp_CreateDate`
    pub created_at: DateTime<FixedOffset>,

    /// Member's IP address, if known
    #[serde(default)]
    pub client_ip: Option<IpAddr>,
}

impl TransactionIntent {
    /// Create an intent stamped with the local server clock
    pub fn new(order_reference: impl Into<String>, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            order_reference: order_reference.into(),
            amount,
            description: description.into(),
            created_at: Local::now().fixed_offset(),
            client_ip: None,
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<FixedOffset>) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }
}

/// Signed redirect produced for one intent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Full URL to send the member's browser to
    pub pay_url: String,

    /// Canonical query that was signed; also the redirect query verbatim
    pub signing_payload: String,

    pub signature: Signature,

    /// Normalized reference sent as `vnp_TxnRef`
    pub txn_ref: String,

    /// True when the caller's reference had no digits and was replaced
    pub reference_substituted: bool,
}

/// Build the signed VNPAY redirect for `intent`.
///
/// Fails with `PaymentError::Config` when a required setting is blank and
/// with `PaymentError::Validation` when the amount does not round to a
/// positive integer that still fits after the ×100 conversion.
pub fn create_payment_request(intent: &TransactionIntent, config: &GatewayConfig) -> Result<PaymentRequest> {
    config.validate()?;

    let amount = to_minor_units(intent.amount)?;
    let (txn_ref, reference_substituted) = normalize_order_reference(&intent.order_reference, intent.created_at);

    if reference_substituted {
        tracing::warn!(
            order_reference = %intent.order_reference,
            txn_ref = %txn_ref,
            "Order reference has no digits; substituted timestamp"
        );
    }

    let ip = intent.client_ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let mut fields = FieldSet::new();
    fields.insert("vnp_Version", VNP_VERSION);
    fields.insert("vnp_Command", VNP_COMMAND_PAY);
    fields.insert("vnp_TmnCode", config.merchant_code.as_str());
    fields.insert("vnp_Amount", amount.to_string());
    fields.insert("vnp_CurrCode", VNP_CURRENCY);
    fields.insert("vnp_ReturnUrl", config.return_url.as_str());
    fields.insert("vnp_TxnRef", txn_ref.as_str());
    fields.insert("vnp_OrderInfo", intent.description.as_str());
    fields.insert("vnp_OrderType", VNP_ORDER_TYPE);
    fields.insert("vnp_Locale", config.locale.as_str());
    fields.insert("vnp_CreateDate", format_create_date(intent.created_at));
    fields.insert("vnp_IpAddr", ip.to_string());
    fields.insert("vnp_IpnUrl", config.callback_url.as_str());

    // Signed once, sent as-is: the redirect query is this exact string.
    let signing_payload = canonical_query(&fields);
    let signature = sign(&signing_payload, &config.hash_secret);
    let pay_url = format!(
        "{}?{signing_payload}&{SECURE_HASH_FIELD}={signature}",
        config.base_url
    );

    tracing::debug!(
        txn_ref = %txn_ref,
        amount,
        signing_payload = %signing_payload,
        "Created VNPAY payment request"
    );

    Ok(PaymentRequest {
        pay_url,
        signing_payload,
        signature,
        txn_ref,
        reference_substituted,
    })
}

/// Digits-only reference, at most 32 characters.
///
/// Falls back to the epoch milliseconds of `created_at` when `raw` has no
/// digits; the second value reports whether that happened.
pub fn normalize_order_reference(raw: &str, created_at: DateTime<FixedOffset>) -> (String, bool) {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let (mut reference, substituted) = if digits.is_empty() {
        (created_at.timestamp_millis().to_string(), true)
    } else {
        (digits, false)
    };

    reference.truncate(MAX_TXN_REF_LEN);
    (reference, substituted)
}

/// Round half-up to a whole major unit, then multiply by 100.
pub fn to_minor_units(amount: Decimal) -> Result<u64> {
    let whole = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    if whole <= Decimal::ZERO {
        return Err(PaymentError::Validation(format!("amount must be positive, got {amount}")));
    }

    whole
        .to_u64()
        .and_then(|units| units.checked_mul(100))
        .ok_or_else(|| PaymentError::Validation(format!("amount {amount} is too large")))
}

/// `YYYYMMDDHHMMSS` of the timestamp's own wall clock
pub fn format_create_date(at: DateTime<FixedOffset>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}
