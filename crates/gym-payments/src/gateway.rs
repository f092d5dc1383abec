//! Payment Gateways
//!
//! Each payment method the checkout page offers maps to a gateway. Methods
//! that are announced but not built yet are a real state, not a string
//! comparison at the call site.

use serde::{Deserialize, Serialize};

use crate::callback::{GatewayCallback, verify_callback};
use crate::checkout::{PaymentRequest, TransactionIntent, create_payment_request};
use crate::config::GatewayConfig;
use crate::encoding::FieldSet;
use crate::error::{PaymentError, Result};

/// Payment methods offered at checkout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "VNPAY")]
    VnPay,

    /// MoMo e-wallet (coming soon)
    #[serde(rename = "MOMO")]
    Momo,
}

/// Whether a method can take payments today
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodStatus {
    Available,
    NotYetImplemented,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VnPay => "VNPAY",
            Self::Momo => "MOMO",
        }
    }

    pub const fn status(self) -> MethodStatus {
        match self {
            Self::VnPay => MethodStatus::Available,
            Self::Momo => MethodStatus::NotYetImplemented,
        }
    }

    pub const fn is_available(self) -> bool {
        matches!(self.status(), MethodStatus::Available)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VNPAY" => Ok(Self::VnPay),
            "MOMO" => Ok(Self::Momo),
            other => Err(PaymentError::Validation(format!("unknown payment method: {other}"))),
        }
    }
}

/// A hosted payment gateway reached by browser redirect
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Build the signed redirect for one checkout attempt
    fn create_payment(&self, intent: &TransactionIntent) -> Result<PaymentRequest>;

    /// Verify a signed result the gateway sent back
    fn verify_callback(&self, fields: &FieldSet) -> Result<GatewayCallback>;
}

/// VNPAY gateway
#[derive(Clone, Debug)]
pub struct VnPayGateway {
    config: GatewayConfig,
}

impl VnPayGateway {
    /// Create a gateway, rejecting incomplete configuration up front
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl PaymentGateway for VnPayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::VnPay
    }

    fn create_payment(&self, intent: &TransactionIntent) -> Result<PaymentRequest> {
        create_payment_request(intent, &self.config)
    }

    fn verify_callback(&self, fields: &FieldSet) -> Result<GatewayCallback> {
        let callback = verify_callback(fields, &self.config.hash_secret)?;

        match callback.merchant_code.as_deref() {
            Some(code) if code != self.config.merchant_code => Err(PaymentError::Validation(format!(
                "callback is for merchant {code}"
            ))),
            _ => Ok(callback),
        }
    }
}

/// Gateways by payment method
#[derive(Clone, Debug)]
pub struct Gateways {
    vnpay: VnPayGateway,
}

impl Gateways {
    pub const fn new(vnpay: VnPayGateway) -> Self {
        Self { vnpay }
    }

    /// Gateway for `method`, or `MethodUnavailable` for methods not built yet
    pub fn for_method(&self, method: PaymentMethod) -> Result<&dyn PaymentGateway> {
        match method {
            PaymentMethod::VnPay => Ok(&self.vnpay),
            PaymentMethod::Momo => {
                tracing::info!(method = %method, "Payment method requested before launch");
                Err(PaymentError::MethodUnavailable(method))
            }
        }
    }

    pub const fn vnpay(&self) -> &VnPayGateway {
        &self.vnpay
    }
}
