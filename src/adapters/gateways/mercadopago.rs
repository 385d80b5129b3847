//! Mercado Pago checkout adapter.
//!
//! Creates Checkout Pro preferences and reads payments back from the
//! payments API. Preference ids are what we store as the link's external
//! id; notifications carry payment ids, which resolve through
//! `external_reference`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::domain::reconciliation::{extract_payer, Gateway};
use crate::ports::{
    GatewayError, GatewayPaymentStatus, PaymentGateway, PaymentIntent, PaymentIntentRequest,
};

/// Mercado Pago API configuration.
#[derive(Clone)]
pub struct MercadoPagoConfig {
    access_token: SecretString,

    /// Base URL for the API (default: https://api.mercadopago.com).
    api_base_url: String,

    timeout: Duration,

    /// Send payers to the sandbox checkout.
    sandbox: bool,
}

impl MercadoPagoConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            api_base_url: "https://api.mercadopago.com".to_string(),
            timeout: Duration::from_secs(30),
            sandbox: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

#[derive(Debug, Serialize)]
struct PreferenceItem<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    quantity: u32,
    currency_id: &'a str,
    unit_price: i64,
    category_id: &'static str,
}

#[derive(Debug, Serialize)]
struct BackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferencePayer<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferenceRequest<'a> {
    items: Vec<PreferenceItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<PreferencePayer<'a>>,
    back_urls: BackUrls<'a>,
    notification_url: &'a str,
    external_reference: &'a str,
    auto_return: &'static str,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

/// Mercado Pago gateway adapter.
pub struct MercadoPagoGateway {
    config: MercadoPagoConfig,
    http_client: reqwest::Client,
}

impl MercadoPagoGateway {
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn new(config: MercadoPagoConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GatewayError::from_reqwest)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn preference_body<'a>(request: &'a PaymentIntentRequest) -> PreferenceRequest<'a> {
        PreferenceRequest {
            items: vec![PreferenceItem {
                id: &request.reference_id,
                title: &request.description,
                description: &request.description,
                quantity: 1,
                currency_id: &request.currency,
                unit_price: request.amount,
                category_id: "subscriptions",
            }],
            payer: request
                .payer_email
                .as_deref()
                .map(|email| PreferencePayer { email }),
            back_urls: BackUrls {
                success: &request.return_url,
                failure: &request.return_url,
                pending: &request.return_url,
            },
            notification_url: &request.notify_url,
            external_reference: &request.reference_id,
            auto_return: "approved",
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %body, "Mercado Pago request failed");
            return Err(GatewayError::from_status(status.as_u16(), body));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::malformed(format!("Mercado Pago response: {}", e)))
    }
}

/// Read a `/v1/payments` resource.
fn payment_from_value(payment: Value) -> Result<GatewayPaymentStatus, GatewayError> {
    let status = payment
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::malformed("payment without status"))?
        .to_string();
    let external_id = match payment.get("id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };
    let reference_id = payment
        .get("external_reference")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let amount = payment
        .get("transaction_amount")
        .and_then(Value::as_f64)
        .map(|a| a.round() as i64);

    Ok(GatewayPaymentStatus {
        status,
        reference_id,
        external_id,
        amount,
        payer: extract_payer(&payment),
        raw_payload: payment,
    })
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    fn gateway(&self) -> Gateway {
        Gateway::MercadoPago
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if request.amount <= 0 {
            return Err(GatewayError::invalid_request("amount must be positive"));
        }
        let url = format!("{}/checkout/preferences", self.config.api_base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&Self::preference_body(request))
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                reference_id = %request.reference_id,
                status = status.as_u16(),
                error = %body,
                "Mercado Pago preference creation failed"
            );
            return Err(GatewayError::from_status(status.as_u16(), body));
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::malformed(format!("Mercado Pago preference: {}", e)))?;
        let redirect_url = match (self.config.sandbox, preference.sandbox_init_point) {
            (true, Some(sandbox)) => sandbox,
            _ => preference.init_point,
        };

        tracing::info!(
            reference_id = %request.reference_id,
            preference_id = %preference.id,
            "Mercado Pago preference created"
        );
        Ok(PaymentIntent {
            redirect_url,
            external_id: preference.id,
        })
    }

    async fn get_payment_status(
        &self,
        external_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let url = format!("{}/v1/payments/{}", self.config.api_base_url, external_id);
        payment_from_value(self.get_json(&url).await?)
    }

    async fn find_payment_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<GatewayPaymentStatus>, GatewayError> {
        let url = format!(
            "{}/v1/payments/search?external_reference={}&sort=date_created&criteria=desc",
            self.config.api_base_url, reference_id
        );
        let body = self.get_json(&url).await?;
        let latest = body
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .cloned();
        latest.map(payment_from_value).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> PaymentIntentRequest {
        PaymentIntentRequest {
            amount: 25_000,
            currency: "CLP".into(),
            reference_id: "3f1c".into(),
            description: "Suscripción Mensual ME000001".into(),
            payer_email: None,
            return_url: "https://billing.example.cl/payments/return".into(),
            notify_url: "https://billing.example.cl/webhooks/mercadopago".into(),
        }
    }

    #[test]
    fn preference_carries_reference_and_urls() {
        let req = request();
        let body = serde_json::to_value(MercadoPagoGateway::preference_body(&req)).unwrap();

        assert_eq!(body["external_reference"], "3f1c");
        assert_eq!(body["items"][0]["unit_price"], 25_000);
        assert_eq!(body["items"][0]["currency_id"], "CLP");
        assert_eq!(body["back_urls"]["failure"], req.return_url);
        assert_eq!(body["notification_url"], req.notify_url);
        assert_eq!(body["auto_return"], "approved");
        assert!(body.get("payer").is_none());
    }

    #[test]
    fn payment_resource_is_read() {
        let payment = payment_from_value(json!({
            "id": 123456789,
            "status": "approved",
            "external_reference": "3f1c",
            "transaction_amount": 25000.0,
            "payer": { "email": "ana@example.cl" }
        }))
        .unwrap();

        assert_eq!(payment.status, "approved");
        assert_eq!(payment.external_id.as_deref(), Some("123456789"));
        assert_eq!(payment.reference_id.as_deref(), Some("3f1c"));
        assert_eq!(payment.amount, Some(25_000));
        assert_eq!(
            payment.payer.and_then(|p| p.email).as_deref(),
            Some("ana@example.cl")
        );
    }

    #[test]
    fn payment_without_status_is_malformed() {
        let err = payment_from_value(json!({ "id": 1 })).unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::MalformedResponse);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected_locally() {
        let gateway = MercadoPagoGateway::new(
            MercadoPagoConfig::new("TEST-token").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let mut req = request();
        req.amount = 0;

        let err = gateway.create_payment_intent(&req).await.unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::InvalidRequest);
    }
}
