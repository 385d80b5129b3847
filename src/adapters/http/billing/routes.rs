//! Axum router for the billing endpoints.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{
    flow_webhook, health, mercadopago_webhook, payment_return, refresh_payment_link,
    BillingAppState,
};

/// Gateway callbacks.
///
/// # Routes
/// - `POST /mercadopago` - Mercado Pago payment notifications
/// - `POST /flow` - Flow payment confirmations
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/mercadopago", post(mercadopago_webhook))
        .route("/flow", post(flow_webhook))
}

/// The complete billing router with request tracing.
///
/// - `/webhooks/*` - gateway callbacks
/// - `GET /payments/return` - payer return landing
/// - `POST /payment-links/:reference/refresh` - manual re-query
/// - `GET /health`
pub fn billing_router(state: BillingAppState) -> Router {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .route("/payments/return", get(payment_return))
        .route("/payment-links/:reference/refresh", post(refresh_payment_link))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
