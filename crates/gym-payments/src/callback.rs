//! VNPAY Callback Verification
//!
//! The gateway reports results by calling the return and IPN URLs with its
//! own signed field set. Verification rebuilds the canonical query with the
//! same encoder used for outgoing requests and checks the HMAC.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::SECURE_HASH_FIELD;
use crate::encoding::{FieldSet, canonical_query};
use crate::error::{PaymentError, Result};
use crate::invoice::InvoiceStatus;
use crate::signer::verify;

/// Optional hash-algorithm hint some gateway versions append; never signed
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Gateway response code meaning "approved"
pub const RESPONSE_SUCCESS: &str = "00";

const FIELD_PREFIX: &str = "vnp_";

/// Verified payment result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCallback {
    /// Our transaction reference echoed back
    pub txn_ref: String,

    /// Amount in the major unit
    pub amount: Decimal,

    pub response_code: String,

    pub transaction_status: String,

    /// Gateway-side transaction number
    pub transaction_no: Option<String>,

    pub bank_code: Option<String>,

    /// Merchant code the gateway signed for
    pub merchant_code: Option<String>,
}

impl GatewayCallback {
    /// Both the response code and the transaction status report success
    pub fn is_success(&self) -> bool {
        self.response_code == RESPONSE_SUCCESS && self.transaction_status == RESPONSE_SUCCESS
    }

    /// Invoice status this result settles to
    pub fn invoice_status(&self) -> InvoiceStatus {
        if self.is_success() {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Failed
        }
    }
}

/// Check the signature on a gateway field set.
///
/// Returns the signed fields (only `vnp_`-prefixed ones, without the hash
/// fields) once the HMAC matches.
pub fn verify_signed_fields(fields: &FieldSet, secret: &str) -> Result<FieldSet> {
    let mut signed = fields.clone();
    let supplied = signed
        .remove(SECURE_HASH_FIELD)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PaymentError::Signature(format!("{SECURE_HASH_FIELD} missing")))?;

    signed.remove(SECURE_HASH_TYPE_FIELD);
    signed.retain(|name| name.starts_with(FIELD_PREFIX));

    let payload = canonical_query(&signed);
    if !verify(&payload, secret, &supplied) {
        tracing::warn!(payload = %payload, "Gateway signature mismatch");
        return Err(PaymentError::Signature("HMAC does not match".into()));
    }

    Ok(signed)
}

/// Verify and parse a gateway callback
pub fn verify_callback(fields: &FieldSet, secret: &str) -> Result<GatewayCallback> {
    let signed = verify_signed_fields(fields, secret)?;

    let required = |name: &str| {
        signed
            .get(name)
            .map(str::to_owned)
            .ok_or_else(|| PaymentError::Validation(format!("{name} missing from callback")))
    };
    let optional = |name: &str| signed.get(name).filter(|v| !v.is_empty()).map(str::to_owned);

    let raw_amount = required("vnp_Amount")?;
    let minor: u64 = raw_amount
        .parse()
        .map_err(|_| PaymentError::Validation(format!("vnp_Amount is not an integer: {raw_amount}")))?;

    let callback = GatewayCallback {
        txn_ref: required("vnp_TxnRef")?,
        amount: Decimal::from(minor) / Decimal::ONE_HUNDRED,
        response_code: required("vnp_ResponseCode")?,
        transaction_status: required("vnp_TransactionStatus")?,
        transaction_no: optional("vnp_TransactionNo"),
        bank_code: optional("vnp_BankCode"),
        merchant_code: optional("vnp_TmnCode"),
    };

    tracing::info!(
        txn_ref = %callback.txn_ref,
        response_code = %callback.response_code,
        success = callback.is_success(),
        "Verified VNPAY callback"
    );

    Ok(callback)
}
