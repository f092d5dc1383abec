//! GymX HTTP Server
//!
//! Axum-based server for the membership site's checkout API: plan listing,
//! plan purchase and signed VNPAY redirects.

mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gym_payments::{Gateways, MemoryInvoiceStore, MemoryPlanStore, VnPayGateway};

use crate::handlers::{checkout, create_vnpay_payment, health_check, list_plans};
use crate::state::AppState;

/// Build the router
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/plans", get(list_plans))
        .route("/api/checkout", post(checkout))
        .route("/api/vnpay/create", post(create_vnpay_payment))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Gateway credentials are required; refuse to start without them
    let vnpay = VnPayGateway::from_env().inspect_err(|e| {
        tracing::error!("✗ VNPAY not configured: {}", e);
        tracing::error!("  Set VNP_TMN_CODE, VNP_HASH_SECRET, VNP_URL, VNP_RETURN_URL and VNP_IPN_URL in .env");
    })?;

    tracing::info!(
        merchant_code = %vnpay.config().merchant_code,
        base_url = %vnpay.config().base_url,
        "✓ VNPAY configured"
    );

    let plans = MemoryPlanStore::default();
    let state = AppState::new(Gateways::new(vnpay), plans, MemoryInvoiceStore::new());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🏋 GymX server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  GET  /api/plans         - List membership plans");
    tracing::info!("  POST /api/checkout      - Buy a plan (invoice + redirect)");
    tracing::info!("  POST /api/vnpay/create  - Signed VNPAY redirect for an order");
    tracing::info!("");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
