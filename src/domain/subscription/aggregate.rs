//! Subscription aggregate entity.
//!
//! A Subscription bills one client for one application on a monthly or
//! annual cadence anchored on `start_date`.
//!
//! # Design Decisions
//!
//! - **Money in minor units**: `price` is an i64 amount (CLP has no decimals)
//! - **Derived grace period**: `grace_period_end` is computed from
//!   `current_period_end`, never stored
//! - **Settlement advances dates**: only `record_payment` moves
//!   `current_period_end` except for the auto-renew roll in `check_and_renew`

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{Application, Client, PaymentType, ReferenceId, SubscriptionStatus};
use crate::domain::foundation::{
    ApplicationId, ClientId, DomainError, ErrorCode, QuoteId, StateMachine, SubscriptionId,
    Timestamp,
};

/// Default days between `current_period_end` and expiry.
pub const DEFAULT_GRACE_PERIOD_DAYS: u32 = 15;

/// Commercial terms a subscription is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTerms {
    pub client_id: ClientId,
    pub application_id: ApplicationId,
    pub payment_type: PaymentType,
    pub price: i64,
    pub start_date: NaiveDate,
    pub auto_renewal: bool,
    pub quote_id: Option<QuoteId>,
    pub notes: String,
}

impl SubscriptionTerms {
    /// Terms billing a registered client for one of its applications.
    ///
    /// Auto-renewal is off, with no quote and no notes.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the application is owned by another
    /// client.
    pub fn for_client(
        client: &Client,
        application: &Application,
        payment_type: PaymentType,
        price: i64,
        start_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        if application.owner.is_some_and(|owner| owner != client.id) {
            return Err(DomainError::validation(
                "application_id",
                format!(
                    "Application {} belongs to another client than {}",
                    application.name,
                    client.tax_id()
                ),
            ));
        }
        Ok(Self {
            client_id: client.id,
            application_id: application.id,
            payment_type,
            price,
            start_date,
            auto_renewal: false,
            quote_id: None,
            notes: String::new(),
        })
    }
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - `price > 0`
/// - `reference_id` is unique
/// - Status transitions follow [`SubscriptionStatus`] rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub reference_id: ReferenceId,
    pub client_id: ClientId,
    pub application_id: ApplicationId,

    /// Quote this subscription was generated from, if any.
    pub quote_id: Option<QuoteId>,

    pub status: SubscriptionStatus,
    pub payment_type: PaymentType,

    /// Amount charged per period, in minor currency units.
    pub price: i64,

    /// Billing anchor. Day-of-month (or month/day) is kept across rollovers.
    pub start_date: NaiveDate,

    /// End of the currently paid period.
    pub current_period_end: NaiveDate,

    pub auto_renewal: bool,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    pub notes: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a pending subscription. Nothing is paid yet, so the current
    /// period ends on the start date.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `price` is not positive.
    pub fn create(
        id: SubscriptionId,
        reference_id: ReferenceId,
        terms: SubscriptionTerms,
    ) -> Result<Self, DomainError> {
        if terms.price <= 0 {
            return Err(DomainError::validation(
                "price",
                format!("Price must be greater than zero, got {}", terms.price),
            ));
        }
        let now = Timestamp::now();
        Ok(Self {
            id,
            reference_id,
            client_id: terms.client_id,
            application_id: terms.application_id,
            quote_id: terms.quote_id,
            status: SubscriptionStatus::Pending,
            payment_type: terms.payment_type,
            price: terms.price,
            start_date: terms.start_date,
            current_period_end: terms.start_date,
            auto_renewal: terms.auto_renewal,
            last_payment_date: None,
            next_payment_date: None,
            notes: terms.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Last day before an unpaid active subscription expires.
    pub fn grace_period_end(&self, grace_period_days: u32) -> NaiveDate {
        self.current_period_end + Duration::days(i64::from(grace_period_days))
    }

    /// Active and past the grace period.
    pub fn is_overdue(&self, today: NaiveDate, grace_period_days: u32) -> bool {
        self.status == SubscriptionStatus::Active && today > self.grace_period_end(grace_period_days)
    }

    /// Active with the next charge due on or before `today`.
    pub fn is_payment_due(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active
            && self.next_payment_date.map_or(false, |due| due <= today)
    }

    /// Activate a pending subscription. First payment is due on the start date.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the subscription is pending.
    pub fn activate(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Pending {
            return Err(self.rejected(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.next_payment_date = Some(self.start_date);
        self.touch();
        Ok(())
    }

    /// Cancel from any state other than cancelled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if already cancelled.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Cancelled)?;
        self.touch();
        Ok(())
    }

    /// Suspend an active or expired subscription.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` from any other state.
    pub fn deactivate(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Suspended)?;
        self.touch();
        Ok(())
    }

    /// Restart billing from `today` for a suspended, cancelled or expired
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the subscription is pending or active.
    pub fn renew(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        if !self.status.is_renewable() {
            return Err(self.rejected(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.start_date = today;
        self.current_period_end = today;
        self.next_payment_date = Some(today);
        self.touch();
        Ok(())
    }

    /// Roll the billing period forward once it has elapsed.
    ///
    /// Returns `false` when auto-renewal is off, the subscription is not
    /// active, or the period is still running. Creates no payment event.
    pub fn check_and_renew(&mut self, today: NaiveDate) -> bool {
        if !self.auto_renewal
            || self.status != SubscriptionStatus::Active
            || today < self.current_period_end
        {
            return false;
        }
        let next = self.payment_type.next_billing_date(self.start_date, today);
        self.current_period_end = next;
        self.next_payment_date = Some(next);
        self.touch();
        true
    }

    /// Expire an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the subscription is active.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Expired)?;
        self.touch();
        Ok(())
    }

    /// Apply a settled payment event: move the paid period forward and
    /// reactivate.
    ///
    /// The new period end is the next anchor date after the later of the
    /// paid date and the expected date, so early payment does not shorten
    /// the period.
    pub fn record_payment(
        &mut self,
        paid_date: NaiveDate,
        expected_date: NaiveDate,
    ) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            self.transition_to(SubscriptionStatus::Active)?;
        }
        let base = paid_date.max(expected_date);
        let next = self.payment_type.next_billing_date(self.start_date, base);
        self.last_payment_date = Some(paid_date);
        self.next_payment_date = Some(next);
        self.current_period_end = next;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    fn rejected(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot transition subscription {} from {:?} to {:?}",
                self.reference_id, self.status, target
            ),
        )
    }

    /// Transition to a new status using the state machine.
    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| self.rejected(target))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{Nationality, TaxId};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn terms(payment_type: PaymentType, start: NaiveDate) -> SubscriptionTerms {
        SubscriptionTerms {
            client_id: ClientId::new(),
            application_id: ApplicationId::new(),
            payment_type,
            price: 50_000,
            start_date: start,
            auto_renewal: true,
            quote_id: None,
            notes: String::new(),
        }
    }

    fn pending_monthly() -> Subscription {
        Subscription::create(
            SubscriptionId::new(),
            ReferenceId::sequential(PaymentType::Monthly, 1),
            terms(PaymentType::Monthly, d(2025, 3, 1)),
        )
        .unwrap()
    }

    fn active_monthly() -> Subscription {
        let mut sub = pending_monthly();
        sub.activate().unwrap();
        sub
    }

    fn client() -> Client {
        Client::new(
            ClientId::new(),
            TaxId::new("76543210-K").unwrap(),
            "Ana",
            "Rojas",
            "ana@example.cl",
            Nationality::Chilena,
        )
        .unwrap()
    }

    fn application(owner: Option<ClientId>) -> Application {
        Application {
            id: ApplicationId::new(),
            name: "Intranet".into(),
            description: String::new(),
            owner,
        }
    }

    // Construction tests

    #[test]
    fn terms_for_client_carry_client_and_application() {
        let client = client();
        let app = application(Some(client.id));

        let terms =
            SubscriptionTerms::for_client(&client, &app, PaymentType::Annual, 90_000, d(2025, 3, 1))
                .unwrap();

        assert_eq!(terms.client_id, client.id);
        assert_eq!(terms.application_id, app.id);
        assert!(!terms.auto_renewal);
    }

    #[test]
    fn terms_for_unowned_application_are_accepted() {
        let client = client();
        let result = SubscriptionTerms::for_client(
            &client,
            &application(None),
            PaymentType::Monthly,
            10_000,
            d(2025, 3, 1),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn terms_for_another_clients_application_are_rejected() {
        let err = SubscriptionTerms::for_client(
            &client(),
            &application(Some(ClientId::new())),
            PaymentType::Monthly,
            10_000,
            d(2025, 3, 1),
        )
        .unwrap_err();
        assert!(err.is_validation_of("application_id"));
    }

    #[test]
    fn create_starts_pending_with_period_end_on_start_date() {
        let sub = pending_monthly();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.current_period_end, d(2025, 3, 1));
        assert!(sub.last_payment_date.is_none());
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let mut t = terms(PaymentType::Monthly, d(2025, 3, 1));
        t.price = 0;
        let err = Subscription::create(
            SubscriptionId::new(),
            ReferenceId::sequential(PaymentType::Monthly, 1),
            t,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn grace_period_end_is_fifteen_days_after_period_end() {
        let sub = active_monthly();
        assert_eq!(sub.grace_period_end(DEFAULT_GRACE_PERIOD_DAYS), d(2025, 3, 16));
    }

    // Lifecycle transition tests

    #[test]
    fn activate_sets_first_due_date_to_start() {
        let sub = active_monthly();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.next_payment_date, Some(d(2025, 3, 1)));
    }

    #[test]
    fn activate_twice_is_rejected() {
        let mut sub = active_monthly();
        let err = sub.activate().unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn cancel_twice_is_rejected() {
        let mut sub = active_monthly();
        sub.cancel().unwrap();
        assert!(sub.cancel().unwrap_err().is_invalid_transition());
    }

    #[test]
    fn pending_cannot_be_deactivated() {
        let mut sub = pending_monthly();
        assert!(sub.deactivate().is_err());
        assert_eq!(sub.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn expired_can_be_deactivated() {
        let mut sub = active_monthly();
        sub.expire().unwrap();
        sub.deactivate().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Suspended);
    }

    #[test]
    fn renew_resets_anchor_to_today() {
        let mut sub = active_monthly();
        sub.cancel().unwrap();
        sub.renew(d(2025, 6, 10)).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.start_date, d(2025, 6, 10));
        assert_eq!(sub.current_period_end, d(2025, 6, 10));
    }

    #[test]
    fn renew_is_rejected_for_active_and_pending() {
        let mut active = active_monthly();
        assert!(active.renew(d(2025, 6, 10)).is_err());
        let mut pending = pending_monthly();
        assert!(pending.renew(d(2025, 6, 10)).is_err());
    }

    // Renewal roll tests

    #[test]
    fn check_and_renew_rolls_elapsed_period() {
        let mut sub = active_monthly();
        assert!(sub.check_and_renew(d(2025, 3, 5)));
        assert_eq!(sub.current_period_end, d(2025, 4, 1));
        assert_eq!(sub.next_payment_date, Some(d(2025, 4, 1)));
    }

    #[test]
    fn check_and_renew_skips_running_period_and_manual_renewal() {
        let mut sub = active_monthly();
        sub.record_payment(d(2025, 3, 1), d(2025, 3, 1)).unwrap();
        assert!(!sub.check_and_renew(d(2025, 3, 20)));

        let mut manual = active_monthly();
        manual.auto_renewal = false;
        assert!(!manual.check_and_renew(d(2025, 5, 1)));
    }

    // Settlement tests

    #[test]
    fn record_payment_advances_to_next_anchor() {
        let mut sub = active_monthly();
        sub.record_payment(d(2025, 3, 1), d(2025, 3, 1)).unwrap();
        assert_eq!(sub.last_payment_date, Some(d(2025, 3, 1)));
        assert_eq!(sub.next_payment_date, Some(d(2025, 4, 1)));
        assert_eq!(sub.current_period_end, d(2025, 4, 1));
    }

    #[test]
    fn early_payment_does_not_shorten_period() {
        let mut sub = active_monthly();
        sub.record_payment(d(2025, 2, 20), d(2025, 3, 1)).unwrap();
        assert_eq!(sub.current_period_end, d(2025, 4, 1));
    }

    #[test]
    fn record_payment_reactivates_expired_subscription() {
        let mut sub = active_monthly();
        sub.expire().unwrap();
        sub.record_payment(d(2025, 3, 20), d(2025, 3, 1)).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, d(2025, 4, 1));
    }

    #[test]
    fn annual_payment_rolls_a_year() {
        let mut sub = Subscription::create(
            SubscriptionId::new(),
            ReferenceId::sequential(PaymentType::Annual, 1),
            terms(PaymentType::Annual, d(2024, 2, 29)),
        )
        .unwrap();
        sub.activate().unwrap();
        sub.record_payment(d(2024, 2, 29), d(2024, 2, 29)).unwrap();
        assert_eq!(sub.current_period_end, d(2025, 2, 28));
    }

    #[test]
    fn overdue_only_after_grace_period() {
        let sub = active_monthly();
        assert!(!sub.is_overdue(d(2025, 3, 16), DEFAULT_GRACE_PERIOD_DAYS));
        assert!(sub.is_overdue(d(2025, 3, 17), DEFAULT_GRACE_PERIOD_DAYS));
    }
}
