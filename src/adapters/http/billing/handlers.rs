//! HTTP handlers for gateway callbacks and payment link refresh.
//!
//! Every callback answers with a definitive status so gateways know
//! whether to retry: 2xx acknowledged, 4xx never retried, 5xx retried.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use super::dto::{
    ErrorResponse, FlowConfirmation, MercadoPagoNotification, ReconciliationResponse,
    ReconciliationResult, ReturnParams,
};
use crate::application::{PaymentReconciler, ReconcileError, ReconciliationOutcome};
use crate::domain::reconciliation::{Gateway, MercadoPagoSignatureVerifier, WebhookError};

/// Shared state for the billing routes.
#[derive(Clone)]
pub struct BillingAppState {
    pub reconciler: Arc<PaymentReconciler>,

    /// Signature checks are skipped when no webhook secret is configured.
    pub mercadopago_verifier: Option<Arc<MercadoPagoSignatureVerifier>>,
}

impl BillingAppState {
    pub fn new(reconciler: Arc<PaymentReconciler>) -> Self {
        Self {
            reconciler,
            mercadopago_verifier: None,
        }
    }

    pub fn with_mercadopago_secret(mut self, secret: impl Into<String>) -> Self {
        self.mercadopago_verifier = Some(Arc::new(MercadoPagoSignatureVerifier::new(secret)));
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/mercadopago
///
/// The payment id comes from `data.id` in the body, or the `data.id` query
/// parameter for older notifications. Status and amount in the body are
/// ignored; the payment is fetched from Mercado Pago.
pub async fn mercadopago_webhook(
    State(state): State<BillingAppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<ReconciliationResponse>, WebhookApiError> {
    let notification: MercadoPagoNotification = if body.is_empty() {
        MercadoPagoNotification::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| WebhookError::ParseError(e.to_string()))?
    };

    let kind = notification
        .kind
        .clone()
        .or_else(|| query.get("type").or_else(|| query.get("topic")).cloned());
    if let Some(kind) = kind.filter(|k| k != "payment") {
        tracing::debug!(kind = %kind, action = ?notification.action, "Ignoring Mercado Pago notification");
        return Err(WebhookError::Ignored(format!("notification type {}", kind)).into());
    }

    let payment_id = notification
        .payment_id()
        .or_else(|| query.get("data.id").or_else(|| query.get("id")).cloned())
        .ok_or(WebhookError::MissingField("data.id"))?;

    if let Some(verifier) = &state.mercadopago_verifier {
        let signature = header(&headers, "x-signature").ok_or(WebhookError::InvalidSignature)?;
        let request_id = header(&headers, "x-request-id").ok_or(WebhookError::InvalidSignature)?;
        verifier.verify(signature, request_id, &payment_id)?;
    }

    let outcome = state
        .reconciler
        .handle_mercadopago_notification(&payment_id)
        .await?;
    acknowledge(outcome, &payment_id)
}

/// POST /webhooks/flow
///
/// Flow posts `token` form encoded; the status is queried with it.
pub async fn flow_webhook(
    State(state): State<BillingAppState>,
    form: Result<Form<FlowConfirmation>, FormRejection>,
) -> Result<Json<ReconciliationResponse>, WebhookApiError> {
    let Form(confirmation) = form.map_err(|e| WebhookError::ParseError(e.body_text()))?;
    let token = confirmation
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or(WebhookError::MissingField("token"))?;

    let outcome = state.reconciler.confirm_flow_payment(&token).await?;
    acknowledge(outcome, &token)
}

/// GET /payments/return
///
/// Landing for payers coming back from a checkout. Re-queries the gateway
/// by its own id.
pub async fn payment_return(
    State(state): State<BillingAppState>,
    Query(params): Query<ReturnParams>,
) -> Result<Json<ReconciliationResponse>, WebhookApiError> {
    let (gateway, external_id) = return_target(&params)?;
    let outcome = state.reconciler.handle_return(gateway, &external_id).await?;
    acknowledge(outcome, &external_id)
}

/// POST /payment-links/:reference/refresh
pub async fn refresh_payment_link(
    State(state): State<BillingAppState>,
    Path(reference): Path<String>,
) -> Response {
    match state.reconciler.refresh_payment_link(&reference).await {
        Ok(Some(outcome)) => Json(ReconciliationResponse::from(outcome)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "PAYMENT_LINK_NOT_FOUND",
                format!("Payment link not found: {}", reference),
            )),
        )
            .into_response(),
        Err(err) => WebhookApiError::from(err).into_response(),
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

// ════════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════════

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn acknowledge(
    outcome: Option<ReconciliationOutcome>,
    external_id: &str,
) -> Result<Json<ReconciliationResponse>, WebhookApiError> {
    match outcome {
        Some(outcome) => Ok(Json(outcome.into())),
        None => Err(WebhookError::UnknownReference(external_id.to_string()).into()),
    }
}

/// Which gateway a return is from, and its id there.
fn return_target(params: &ReturnParams) -> Result<(Gateway, String), WebhookError> {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "null")
            .map(str::to_string)
    };
    let requested = params.gateway.as_deref().and_then(Gateway::parse);

    if requested != Some(Gateway::MercadoPago) {
        if let Some(token) = present(&params.token) {
            return Ok((Gateway::Flow, token));
        }
    }
    if requested != Some(Gateway::Flow) {
        if let Some(id) = present(&params.payment_id).or_else(|| present(&params.collection_id)) {
            return Ok((Gateway::MercadoPago, id));
        }
    }
    Err(WebhookError::MissingField("payment_id"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that turns webhook failures into definitive responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl From<ReconcileError> for WebhookApiError {
    fn from(err: ReconcileError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        match &self.0 {
            WebhookError::UnknownReference(id) => {
                tracing::error!(external_id = %id, "Callback for unknown payment reference");
                let body = ReconciliationResponse::without_link(ReconciliationResult::UnknownReference);
                (status, Json(body)).into_response()
            }
            WebhookError::Ignored(reason) => {
                tracing::info!(reason = %reason, "Callback ignored");
                let body = ReconciliationResponse::without_link(ReconciliationResult::Ignored);
                (status, Json(body)).into_response()
            }
            err => {
                if err.is_retryable() {
                    tracing::error!(error = %err, "Callback failed; gateway will retry");
                } else {
                    tracing::warn!(error = %err, "Callback rejected");
                }
                let code = match err {
                    WebhookError::InvalidSignature => "INVALID_SIGNATURE",
                    WebhookError::ParseError(_) => "PARSE_ERROR",
                    WebhookError::MissingField(_) => "MISSING_FIELD",
                    WebhookError::Gateway(_) => "GATEWAY_UNAVAILABLE",
                    _ => "INTERNAL_ERROR",
                };
                (status, Json(ErrorResponse::new(code, err.to_string()))).into_response()
            }
        }
    }
}
