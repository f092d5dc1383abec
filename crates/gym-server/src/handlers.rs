//! HTTP Handlers

use std::net::IpAddr;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gym_payments::{
    PaymentError, PaymentGateway, PaymentMethod, Plan, PlanStore, PurchaseRequest,
    TransactionIntent,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub methods: Vec<MethodInfo>,
}

#[derive(Serialize)]
pub struct MethodInfo {
    pub method: PaymentMethod,
    pub available: bool,
}

/// Body of `POST /api/vnpay/create`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub order_info: String,
}

/// Body of `POST /api/checkout`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_id: String,
    pub user_id: String,
    #[serde(default)]
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayUrlResponse {
    pub ok: bool,
    pub pay_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    let methods = [PaymentMethod::VnPay, PaymentMethod::Momo]
        .into_iter()
        .map(|method| MethodInfo {
            method,
            available: method.is_available(),
        })
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        methods,
    })
}

/// List membership plans
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, PaymentError> {
    let plans = state
        .plans
        .list()
        .inspect_err(|e| tracing::error!(error = %e, "Listing plans failed"))?;
    Ok(Json(plans))
}

/// Create a signed VNPAY redirect for an existing order
pub async fn create_vnpay_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<Json<PayUrlResponse>, PaymentError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Rejected payment request body");
        PaymentError::Validation(e.body_text())
    })?;

    let intent = TransactionIntent::new(payload.order_id, payload.amount, payload.order_info)
        .with_client_ip(client_ip(&headers));

    let request = state
        .gateways
        .vnpay()
        .create_payment(&intent)
        .inspect_err(|e| tracing::error!(error = %e, order_id = %intent.order_reference, "VNPAY create failed"))?;

    Ok(Json(PayUrlResponse {
        ok: true,
        pay_url: request.pay_url,
        invoice_id: None,
    }))
}

/// Buy a plan: record a pending invoice and return the gateway redirect
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<PayUrlResponse>, PaymentError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Rejected checkout body");
        PaymentError::Validation(e.body_text())
    })?;

    let request = PurchaseRequest {
        plan_id: payload.plan_id,
        user_id: payload.user_id,
        method: payload.method,
        client_ip: client_ip(&headers),
    };

    let outcome = state.purchases.start(&request).inspect_err(|e| match e {
        PaymentError::MethodUnavailable(_) | PaymentError::PlanNotFound(_) => {
            tracing::warn!(error = %e, plan = %request.plan_id, "Checkout refused");
        }
        _ => tracing::error!(error = %e, plan = %request.plan_id, "Checkout failed"),
    })?;

    Ok(Json(PayUrlResponse {
        ok: true,
        pay_url: outcome.pay_url,
        invoice_id: Some(outcome.invoice_id.to_string()),
    }))
}

/// Member IP from the first `X-Forwarded-For` hop, then `X-Real-IP`
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use gym_payments::{FieldSet, GatewayConfig, Gateways, MemoryInvoiceStore, MemoryPlanStore, VnPayGateway, verify};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::app;

    fn test_state() -> AppState {
        let config = GatewayConfig {
            merchant_code: "TESTCODE".into(),
            hash_secret: "SECRET123".into(),
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "https://gym.example/checkout/result".into(),
            callback_url: "https://gym.example/api/vnpay/ipn".into(),
            locale: "vn".into(),
        };
        AppState::new(
            Gateways::new(VnPayGateway::new(config).unwrap()),
            MemoryPlanStore::default(),
            MemoryInvoiceStore::new(),
        )
    }

    async fn post(uri: &str, body: Value, forwarded_for: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(ip) = forwarded_for {
            builder = builder.header("x-forwarded-for", ip);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        send(request).await
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app(test_state()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn query_fields(pay_url: &str) -> FieldSet {
        FieldSet::from_query(pay_url.split_once('?').unwrap().1).unwrap()
    }

    #[tokio::test]
    async fn test_create_payment_returns_signed_url() {
        let (status, body) = post(
            "/api/vnpay/create",
            json!({ "orderId": "INV42", "amount": 500000, "orderInfo": "ThanhtoanGymX Starter" }),
            Some("203.0.113.7, 10.0.0.1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let pay_url = body["payUrl"].as_str().unwrap();
        assert!(pay_url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

        let mut fields = query_fields(pay_url);
        assert_eq!(fields.get("vnp_TxnRef"), Some("42"));
        assert_eq!(fields.get("vnp_Amount"), Some("50000000"));
        assert_eq!(fields.get("vnp_IpAddr"), Some("203.0.113.7"));

        let signature = fields.remove("vnp_SecureHash").unwrap();
        assert!(verify(&gym_payments::canonical_query(&fields), "SECRET123", &signature));
    }

    #[tokio::test]
    async fn test_fractional_amount_rounds_half_up() {
        let (status, body) = post(
            "/api/vnpay/create",
            json!({ "orderId": "INV42", "amount": 299000.5, "orderInfo": "x" }),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let fields = query_fields(body["payUrl"].as_str().unwrap());
        assert_eq!(fields.get("vnp_Amount"), Some("29900100"));
        assert_eq!(fields.get("vnp_IpAddr"), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_uniform_failure() {
        let (status, body) = post(
            "/api/vnpay/create",
            json!({ "orderId": "INV42", "amount": 0, "orderInfo": "x" }),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
        assert!(body.get("payUrl").is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_is_uniform_failure() {
        let (status, body) = post("/api/vnpay/create", json!({ "orderId": "INV42" }), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_checkout_creates_invoice() {
        let (status, body) = post(
            "/api/checkout",
            json!({ "planId": "pro", "userId": "user-1", "method": "VNPAY" }),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let invoice_id = body["invoiceId"].as_str().unwrap();
        assert!(invoice_id.starts_with("INV"));

        let fields = query_fields(body["payUrl"].as_str().unwrap());
        assert_eq!(fields.get("vnp_Amount"), Some("79900000"));
        assert_eq!(fields.get("vnp_TxnRef"), invoice_id.strip_prefix("INV"));
    }

    #[tokio::test]
    async fn test_checkout_momo_not_implemented() {
        let (status, body) = post(
            "/api/checkout",
            json!({ "planId": "pro", "userId": "user-1", "method": "MOMO" }),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_checkout_unknown_plan() {
        let (status, body) = post(
            "/api/checkout",
            json!({ "planId": "platinum", "userId": "user-1" }),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_list_plans() {
        let request = Request::builder().uri("/api/plans").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["starter", "standard", "pro"]);
    }

    #[tokio::test]
    async fn test_health_reports_methods() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["methods"][0], json!({ "method": "VNPAY", "available": true }));
        assert_eq!(body["methods"][1], json!({ "method": "MOMO", "available": false }));
    }

    #[test]
    fn test_client_ip_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers), Some("198.51.100.2".parse().unwrap()));

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.insert("x-forwarded-for", "garbage".parse().unwrap());
        assert_eq!(client_ip(&headers), Some("198.51.100.2".parse().unwrap()));
    }
}
