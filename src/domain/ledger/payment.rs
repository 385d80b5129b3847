//! Accounting side-ledger: payments and income/expense transactions.
//!
//! `PaymentEvent` drives billing. These records mirror money movements for
//! bookkeeping and are derived from settlements, never the other way round.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, StateMachine, SubscriptionId, Timestamp, TransactionId,
};

/// Category used for income booked from gateway payment links.
pub const PAYMENT_LINK_CATEGORY: &str = "payment_link";

/// Category used for income booked from completed payments.
pub const SUBSCRIPTION_CATEGORY: &str = "subscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Completed) | (Pending, Failed) | (Pending, Cancelled) | (Failed, Pending)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Completed, Failed, Cancelled],
            Failed => vec![Pending],
            Completed | Cancelled => vec![],
        }
    }
}

/// A discrete money movement tied to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,

    /// Gateway-side identifier of the charge.
    pub gateway_reference: Option<String>,

    pub notes: String,
    pub created_at: Timestamp,
}

impl Payment {
    pub fn pending(
        subscription_id: Option<SubscriptionId>,
        amount: i64,
        due_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation(
                "amount",
                format!("Amount must be greater than zero, got {}", amount),
            ));
        }
        Ok(Self {
            id: PaymentId::new(),
            subscription_id,
            amount,
            status: PaymentStatus::Pending,
            due_date,
            payment_date: None,
            gateway_reference: None,
            notes: String::new(),
            created_at: Timestamp::now(),
        })
    }

    /// Mark the payment completed on `on`.
    pub fn complete(
        &mut self,
        on: NaiveDate,
        gateway_reference: Option<String>,
    ) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Completed)?;
        self.payment_date = Some(on);
        if gateway_reference.is_some() {
            self.gateway_reference = gateway_reference;
        }
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Failed)
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move payment {} from {:?} to {:?}", self.id, self.status, target),
            )
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(TransactionKind::Income),
            "expense" => Some(TransactionKind::Expense),
            _ => None,
        }
    }
}

/// Income/expense ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub category: String,
    pub description: String,
    pub amount: i64,
    pub date: NaiveDate,
    pub payment_id: Option<PaymentId>,

    /// Payment link reference this row was booked for.
    pub source_reference: Option<String>,

    pub notes: String,
    pub created_at: Timestamp,
}

impl Transaction {
    /// Income row for a completed side-ledger payment.
    pub fn income_for_payment(payment: &Payment, description: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Income,
            category: SUBSCRIPTION_CATEGORY.to_string(),
            description: description.into(),
            amount: payment.amount,
            date: payment.payment_date.unwrap_or(payment.due_date),
            payment_id: Some(payment.id),
            source_reference: None,
            notes: String::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Income row for money received through a gateway payment link.
    pub fn income_for_link(
        reference: &str,
        description: impl Into<String>,
        amount: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Income,
            category: PAYMENT_LINK_CATEGORY.to_string(),
            description: description.into(),
            amount,
            date,
            payment_id: None,
            source_reference: Some(reference.to_string()),
            notes: format!("Payment received through payment link {}", reference),
            created_at: Timestamp::now(),
        }
    }
}
