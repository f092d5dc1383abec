//! Payment Error Types

use thiserror::Error;

use crate::gateway::PaymentMethod;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Required gateway configuration missing or blank
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed transaction input (amount, callback fields, query string)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Callback signature missing or not matching
    #[error("Signature invalid: {0}")]
    Signature(String),

    /// Payment method exists but is not implemented yet
    #[error("Payment method not available: {0}")]
    MethodUnavailable(PaymentMethod),

    /// Plan not found in the catalogue
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// Invoice id already taken
    #[error("Invoice already exists: {0}")]
    DuplicateInvoice(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::DuplicateInvoice(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Validation(_) => "Payment details are invalid. Please check and try again.",
            Self::Signature(_) => "Payment result could not be verified.",
            Self::MethodUnavailable(_) => "This payment method is coming soon. Please choose VNPAY.",
            Self::PlanNotFound(_) => "The selected plan no longer exists.",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) | Self::DuplicateInvoice(_) => "Could not create the invoice. Please try again.",
        }
    }
}

#[cfg(feature = "axum-handlers")]
mod http {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    use super::PaymentError;

    impl PaymentError {
        /// HTTP status used when this error reaches a handler boundary
        pub const fn status_code(&self) -> StatusCode {
            match self {
                Self::Validation(_) | Self::Signature(_) => StatusCode::BAD_REQUEST,
                Self::PlanNotFound(_) => StatusCode::NOT_FOUND,
                Self::MethodUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
                Self::DuplicateInvoice(_) => StatusCode::CONFLICT,
                Self::Config(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for PaymentError {
        fn into_response(self) -> Response {
            let body = Json(json!({ "ok": false, "error": self.user_message() }));
            (self.status_code(), body).into_response()
        }
    }
}
