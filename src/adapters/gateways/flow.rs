//! Flow (flow.cl) checkout adapter.
//!
//! Every request carries `apiKey` and a signature `s`: HMAC-SHA256 of the
//! parameters sorted by name and concatenated as `name` + `value`, hex
//! encoded.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::reconciliation::{extract_payer, Gateway};
use crate::ports::{
    GatewayError, GatewayErrorCode, GatewayPaymentStatus, PaymentGateway, PaymentIntent,
    PaymentIntentRequest,
};

type HmacSha256 = Hmac<Sha256>;

/// Flow API configuration.
#[derive(Clone)]
pub struct FlowConfig {
    api_key: String,
    secret_key: SecretString,

    /// Base URL including the API prefix (default: https://www.flow.cl/api).
    api_base_url: String,

    timeout: Duration,

    /// Flow requires a payer e-mail; used when the request has none.
    fallback_email: Option<String>,
}

impl FlowConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: SecretString::new(secret_key.into()),
            api_base_url: "https://www.flow.cl/api".to_string(),
            timeout: Duration::from_secs(30),
            fallback_email: None,
        }
    }

    /// Set a custom API base URL (sandbox or tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback_email(mut self, email: impl Into<String>) -> Self {
        self.fallback_email = Some(email.into());
        self
    }
}

/// Sign `params` the way Flow expects.
pub fn sign_params(secret: &str, params: &BTreeMap<String, String>) -> Result<String, GatewayError> {
    let to_sign: String = params.iter().map(|(k, v)| format!("{}{}", k, v)).collect();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::invalid_request(format!("Flow secret key: {}", e)))?;
    mac.update(to_sign.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    url: String,
    token: String,
    flow_order: i64,
}

/// Flow gateway adapter.
pub struct FlowGateway {
    config: FlowConfig,
    http_client: reqwest::Client,
}

impl FlowGateway {
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn new(config: FlowConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GatewayError::from_reqwest)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Add `apiKey` and the signature to `params`.
    fn signed(&self, mut params: BTreeMap<String, String>) -> Result<BTreeMap<String, String>, GatewayError> {
        params.insert("apiKey".to_string(), self.config.api_key.clone());
        let signature = sign_params(self.config.secret_key.expose_secret(), &params)?;
        params.insert("s".to_string(), signature);
        Ok(params)
    }

    async fn call(
        &self,
        endpoint: &str,
        params: BTreeMap<String, String>,
        post: bool,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.config.api_base_url, endpoint);
        let params = self.signed(params)?;
        let request = if post {
            self.http_client.post(&url).form(&params)
        } else {
            self.http_client.get(&url).query(&params)
        };
        let response = request.send().await.map_err(GatewayError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(GatewayError::from_reqwest)?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            tracing::error!(endpoint, status = status.as_u16(), error = %message, "Flow request failed");
            return Err(GatewayError::from_status(status.as_u16(), message));
        }
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::malformed(format!("Flow response from {}: {}", endpoint, e)))
    }
}

/// Read a `/payment/getStatus*` response.
fn status_from_value(payment: Value) -> Result<GatewayPaymentStatus, GatewayError> {
    let status = match payment.get("status") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return Err(GatewayError::malformed("Flow status without status code")),
    };
    let reference_id = payment
        .get("commerceOrder")
        .and_then(Value::as_str)
        .map(str::to_string);
    let external_id = payment
        .get("flowOrder")
        .and_then(Value::as_i64)
        .map(|order| order.to_string());
    let amount = payment
        .get("amount")
        .and_then(|a| a.as_f64().or_else(|| a.as_str().and_then(|s| s.parse().ok())))
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
impl PaymentGateway for FlowGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Flow
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if request.amount <= 0 {
            return Err(GatewayError::invalid_request("amount must be positive"));
        }
        let email = request
            .payer_email
            .clone()
            .or_else(|| self.config.fallback_email.clone())
            .ok_or_else(|| GatewayError::invalid_request("Flow requires a payer e-mail"))?;

        let params: BTreeMap<String, String> = [
            ("commerceOrder", request.reference_id.clone()),
            ("subject", request.description.clone()),
            ("currency", request.currency.clone()),
            ("amount", request.amount.to_string()),
            ("email", email),
            ("urlConfirmation", request.notify_url.clone()),
            ("urlReturn", request.return_url.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let body = self.call("/payment/create", params, true).await?;
        let created: CreatePaymentResponse = serde_json::from_value(body)
            .map_err(|e| GatewayError::malformed(format!("Flow payment/create: {}", e)))?;

        tracing::info!(
            reference_id = %request.reference_id,
            flow_order = created.flow_order,
            "Flow payment created"
        );
        Ok(PaymentIntent {
            redirect_url: format!("{}?token={}", created.url, created.token),
            external_id: created.token,
        })
    }

    async fn get_payment_status(
        &self,
        external_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let params = BTreeMap::from([("token".to_string(), external_id.to_string())]);
        status_from_value(self.call("/payment/getStatus", params, false).await?)
    }

    async fn find_payment_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<GatewayPaymentStatus>, GatewayError> {
        let params = BTreeMap::from([("commerceId".to_string(), reference_id.to_string())]);
        match self.call("/payment/getStatusByCommerceId", params, false).await {
            Ok(body) => status_from_value(body).map(Some),
            Err(err) if err.code == GatewayErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signature_covers_sorted_concatenation() {
        let params = BTreeMap::from([
            ("currency".to_string(), "CLP".to_string()),
            ("amount".to_string(), "5000".to_string()),
            ("apiKey".to_string(), "KEY".to_string()),
        ]);

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"amount5000apiKeyKEYcurrencyCLP");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(sign_params("secret", &params).unwrap(), expected);
    }

    #[test]
    fn signed_params_include_api_key_and_signature() {
        let gateway = FlowGateway::new(FlowConfig::new("KEY", "secret")).unwrap();
        let signed = gateway
            .signed(BTreeMap::from([("token".to_string(), "tok".to_string())]))
            .unwrap();

        assert_eq!(signed.get("apiKey").map(String::as_str), Some("KEY"));
        let mut unsigned = signed.clone();
        let signature = unsigned.remove("s").unwrap();
        assert_eq!(signature, sign_params("secret", &unsigned).unwrap());
    }

    #[test]
    fn status_response_is_read() {
        let status = status_from_value(json!({
            "flowOrder": 8765,
            "commerceOrder": "3f1c",
            "status": 2,
            "amount": 15000,
            "payer": "pagador@example.cl"
        }))
        .unwrap();

        assert_eq!(status.status, "2");
        assert_eq!(status.reference_id.as_deref(), Some("3f1c"));
        assert_eq!(status.external_id.as_deref(), Some("8765"));
        assert_eq!(status.amount, Some(15_000));
        assert_eq!(
            status.payer.and_then(|p| p.email).as_deref(),
            Some("pagador@example.cl")
        );
    }

    #[tokio::test]
    async fn create_without_any_email_is_rejected() {
        let gateway = FlowGateway::new(FlowConfig::new("KEY", "secret")).unwrap();
        let err = gateway
            .create_payment_intent(&PaymentIntentRequest {
                amount: 1_000,
                currency: "CLP".into(),
                reference_id: "r".into(),
                description: "d".into(),
                payer_email: None,
                return_url: "https://x/return".into(),
                notify_url: "https://x/notify".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, GatewayErrorCode::InvalidRequest);
    }
}
