//! Subscription status state machine.
//!
//! `Cancelled` and `Expired` are re-activatable: `renew()` and payment
//! settlement both lead back to `Active`.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a billed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created, awaiting activation. No payment events yet.
    Pending,

    /// Billing is running.
    Active,

    /// Temporarily switched off by an operator.
    Suspended,

    /// Cancelled; pending billing voided.
    Cancelled,

    /// Grace period passed without payment.
    Expired,
}

impl SubscriptionStatus {
    /// Storage/wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Parses a stored status. `inactive` is accepted as a legacy alias of
    /// `suspended`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "suspended" | "inactive" => Some(SubscriptionStatus::Suspended),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }

    /// States `renew()` may start from.
    pub fn is_renewable(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Suspended
                | SubscriptionStatus::Cancelled
                | SubscriptionStatus::Expired
        )
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, Cancelled)
            // From ACTIVE
                | (Active, Suspended)
                | (Active, Cancelled)
                | (Active, Expired)
            // From SUSPENDED
                | (Suspended, Active)
                | (Suspended, Cancelled)
            // From EXPIRED
                | (Expired, Active)
                | (Expired, Suspended)
                | (Expired, Cancelled)
            // From CANCELLED
                | (Cancelled, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Cancelled],
            Active => vec![Suspended, Cancelled, Expired],
            Suspended => vec![Active, Cancelled],
            Expired => vec![Active, Suspended, Cancelled],
            Cancelled => vec![Active],
        }
    }
}
