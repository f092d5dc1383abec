//! Gateway Configuration
//!
//! Merchant credentials and URLs are loaded once at startup and handed to
//! the orchestrator explicitly.

use crate::error::{PaymentError, Result};

pub const ENV_MERCHANT_CODE: &str = "VNP_TMN_CODE";
pub const ENV_HASH_SECRET: &str = "VNP_HASH_SECRET";
pub const ENV_BASE_URL: &str = "VNP_URL";
pub const ENV_RETURN_URL: &str = "VNP_RETURN_URL";
pub const ENV_CALLBACK_URL: &str = "VNP_IPN_URL";
pub const ENV_LOCALE: &str = "VNP_LOCALE";

/// Locale sent when `VNP_LOCALE` is not set
pub const DEFAULT_LOCALE: &str = "vn";

/// VNPAY merchant configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Merchant (terminal) code issued by the gateway
    pub merchant_code: String,

    /// Shared HMAC secret
    pub hash_secret: String,

    /// Hosted payment page, e.g. `https://sandbox.vnpayment.vn/paymentv2/vpcpay.html`
    pub base_url: String,

    /// Where the member's browser lands after paying
    pub return_url: String,

    /// Server-to-server notification URL
    pub callback_url: String,

    pub locale: String,
}

impl GatewayConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// Missing and blank values are both treated as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{name} not set")))
        };

        let config = Self {
            merchant_code: required(ENV_MERCHANT_CODE)?,
            hash_secret: required(ENV_HASH_SECRET)?,
            base_url: required(ENV_BASE_URL)?,
            return_url: required(ENV_RETURN_URL)?,
            callback_url: required(ENV_CALLBACK_URL)?,
            locale: lookup(ENV_LOCALE)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.into()),
        };

        tracing::debug!(
            merchant_code = %config.merchant_code,
            base_url = %config.base_url,
            locale = %config.locale,
            "Loaded gateway configuration"
        );

        Ok(config)
    }

    /// Fail with `PaymentError::Config` naming the first blank required value
    pub fn validate(&self) -> Result<()> {
        let required = [
            (ENV_MERCHANT_CODE, &self.merchant_code),
            (ENV_HASH_SECRET, &self.hash_secret),
            (ENV_BASE_URL, &self.base_url),
            (ENV_RETURN_URL, &self.return_url),
            (ENV_CALLBACK_URL, &self.callback_url),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(PaymentError::Config(format!("{name} not set"))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("merchant_code", &self.merchant_code)
            .field("hash_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("return_url", &self.return_url)
            .field("callback_url", &self.callback_url)
            .field("locale", &self.locale)
            .finish()
    }
}
