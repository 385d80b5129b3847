//! Scheduled billing occurrences.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentEventId, StateMachine, SubscriptionId, Timestamp,
};

/// Settlement state of a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    Pending,
    Paid,
}

impl PaymentEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventStatus::Pending => "pending",
            PaymentEventStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentEventStatus::Pending),
            "paid" => Some(PaymentEventStatus::Paid),
            _ => None,
        }
    }
}

impl StateMachine for PaymentEventStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (PaymentEventStatus::Pending, PaymentEventStatus::Paid)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PaymentEventStatus::Pending => vec![PaymentEventStatus::Paid],
            PaymentEventStatus::Paid => vec![],
        }
    }
}

/// One expected charge of a subscription.
///
/// At most one pending event exists per subscription; the repository
/// enforces this on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: PaymentEventId,
    pub subscription_id: SubscriptionId,
    pub expected_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub amount: i64,
    pub status: PaymentEventStatus,
    pub notes: String,
    pub created_at: Timestamp,
}

impl PaymentEvent {
    /// Creates a pending event.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `amount` is not positive.
    pub fn pending(
        subscription_id: SubscriptionId,
        expected_date: NaiveDate,
        amount: i64,
        notes: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation(
                "amount",
                format!("Amount must be greater than zero, got {}", amount),
            ));
        }
        Ok(Self {
            id: PaymentEventId::new(),
            subscription_id,
            expected_date,
            paid_date: None,
            amount,
            status: PaymentEventStatus::Pending,
            notes: notes.into(),
            created_at: Timestamp::now(),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentEventStatus::Pending
    }

    /// Settle the event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the event is already paid.
    pub fn mark_paid(&mut self, paid_date: NaiveDate) -> Result<(), DomainError> {
        self.status = self
            .status
            .transition_to(PaymentEventStatus::Paid)
            .map_err(|_| {
                DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    format!("Payment event {} is already paid", self.id),
                )
            })?;
        self.paid_date = Some(paid_date);
        Ok(())
    }
}
