//! Scriptable gateway for tests and local development.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::reconciliation::Gateway;
use crate::ports::{
    GatewayError, GatewayPaymentStatus, PaymentGateway, PaymentIntent, PaymentIntentRequest,
};

#[derive(Debug, Default)]
struct MockState {
    intents: Vec<PaymentIntentRequest>,
    /// Payments keyed by external id.
    payments: HashMap<String, GatewayPaymentStatus>,
    fail_next: Option<GatewayError>,
}

/// In-memory gateway that records intents and serves scripted statuses.
#[derive(Debug, Clone)]
pub struct MockGateway {
    gateway: Gateway,
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            state: Arc::default(),
        }
    }

    /// External id the mock assigns to a checkout for `reference_id`.
    pub fn external_id_for(reference_id: &str) -> String {
        format!("mock-{}", reference_id)
    }

    /// Script the gateway's answer for a payment.
    pub fn set_payment(
        &self,
        external_id: &str,
        reference_id: &str,
        status: &str,
        payer_email: Option<&str>,
    ) {
        let raw_payload = match payer_email {
            Some(email) => json!({
                "id": external_id,
                "status": status,
                "external_reference": reference_id,
                "payer": { "email": email },
            }),
            None => json!({
                "id": external_id,
                "status": status,
                "external_reference": reference_id,
            }),
        };
        let payment = GatewayPaymentStatus {
            status: status.to_string(),
            reference_id: Some(reference_id.to_string()),
            external_id: Some(external_id.to_string()),
            amount: None,
            payer: None,
            raw_payload,
        };
        self.with_state(|s| {
            s.payments.insert(external_id.to_string(), payment);
        });
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.with_state(|s| s.fail_next = Some(error));
    }

    pub fn intents(&self) -> Vec<PaymentIntentRequest> {
        self.with_state(|s| s.intents.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn take_failure(&self) -> Result<(), GatewayError> {
        match self.with_state(|s| s.fail_next.take()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn gateway(&self) -> Gateway {
        self.gateway
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.take_failure()?;
        if request.amount <= 0 {
            return Err(GatewayError::invalid_request("amount must be positive"));
        }
        self.with_state(|s| s.intents.push(request.clone()));
        Ok(PaymentIntent {
            redirect_url: format!("https://mock.gateway/checkout/{}", request.reference_id),
            external_id: Self::external_id_for(&request.reference_id),
        })
    }

    async fn get_payment_status(
        &self,
        external_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        self.take_failure()?;
        self.with_state(|s| s.payments.get(external_id).cloned())
            .ok_or_else(|| GatewayError::from_status(404, format!("payment {} not found", external_id)))
    }

    async fn find_payment_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<GatewayPaymentStatus>, GatewayError> {
        self.take_failure()?;
        Ok(self.with_state(|s| {
            s.payments
                .values()
                .find(|p| p.reference_id.as_deref() == Some(reference_id))
                .cloned()
        }))
    }
}
