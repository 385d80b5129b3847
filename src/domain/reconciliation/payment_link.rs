//! Short-lived checkout handles shared with a payment gateway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Gateway, PayerInfo};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentEventId, PaymentLinkId, StateMachine, SubscriptionId,
    Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLinkStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
}

impl PaymentLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentLinkStatus::Pending => "pending",
            PaymentLinkStatus::Paid => "paid",
            PaymentLinkStatus::Expired => "expired",
            PaymentLinkStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentLinkStatus::Pending),
            "paid" => Some(PaymentLinkStatus::Paid),
            "expired" => Some(PaymentLinkStatus::Expired),
            "cancelled" => Some(PaymentLinkStatus::Cancelled),
            _ => None,
        }
    }
}

impl StateMachine for PaymentLinkStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentLinkStatus::*;
        matches!(
            (self, target),
            (Pending, Paid)
                | (Pending, Expired)
                | (Pending, Cancelled)
                // The gateway may confirm money after we stopped waiting.
                | (Expired, Paid)
                | (Cancelled, Paid)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentLinkStatus::*;
        match self {
            Pending => vec![Paid, Expired, Cancelled],
            Expired | Cancelled => vec![Paid],
            Paid => vec![],
        }
    }
}

/// A gateway checkout for one payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: PaymentLinkId,

    /// Reference shared with the gateway (`external_reference`, `commerceOrder`).
    pub reference_id: String,

    pub subscription_id: Option<SubscriptionId>,
    pub payment_event_id: Option<PaymentEventId>,
    pub gateway: Gateway,

    /// Gateway-side handle: Mercado Pago preference/payment id or Flow token.
    pub external_id: Option<String>,

    pub amount: i64,
    pub description: String,
    pub status: PaymentLinkStatus,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub redirect_url: Option<String>,
    pub expires_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentLink {
    /// Creates a pending link valid for `ttl_days` from `now`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `amount` is not positive.
    pub fn new(
        subscription_id: Option<SubscriptionId>,
        payment_event_id: Option<PaymentEventId>,
        gateway: Gateway,
        amount: i64,
        description: impl Into<String>,
        now: Timestamp,
        ttl_days: u32,
    ) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation(
                "amount",
                format!("Amount must be greater than zero, got {}", amount),
            ));
        }
        Ok(Self {
            id: PaymentLinkId::new(),
            reference_id: Uuid::new_v4().to_string(),
            subscription_id,
            payment_event_id,
            gateway,
            external_id: None,
            amount,
            description: description.into(),
            status: PaymentLinkStatus::Pending,
            payer_email: None,
            payer_name: None,
            redirect_url: None,
            expires_at: now.add_days(i64::from(ttl_days)),
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record where the gateway wants the payer sent.
    pub fn attach_intent(&mut self, external_id: String, redirect_url: String) {
        self.external_id = Some(external_id);
        self.redirect_url = Some(redirect_url);
        self.updated_at = Timestamp::now();
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentLinkStatus::Paid
    }

    /// Pending and not past its expiry.
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.status == PaymentLinkStatus::Pending && now.is_before(&self.expires_at)
    }

    /// Mark paid and expire at once so the checkout cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the link is already paid.
    pub fn mark_paid(&mut self, now: Timestamp, payer: Option<PayerInfo>) -> Result<(), DomainError> {
        self.transition_to(PaymentLinkStatus::Paid)?;
        self.paid_at = Some(now);
        self.expires_at = now;
        if let Some(payer) = payer {
            if payer.email.is_some() {
                self.payer_email = payer.email;
            }
            if payer.name.is_some() {
                self.payer_name = payer.name;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn expire(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(PaymentLinkStatus::Expired)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(PaymentLinkStatus::Cancelled)?;
        self.updated_at = now;
        Ok(())
    }

    fn transition_to(&mut self, target: PaymentLinkStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot move payment link {} from {:?} to {:?}",
                    self.reference_id, self.status, target
                ),
            )
        })?;
        Ok(())
    }
}
