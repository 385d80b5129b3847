//! PaymentReconciler - applies gateway payment outcomes to billing.
//!
//! All entry points (webhooks, return URL, manual refresh, polling) funnel
//! into [`PaymentReconciler::update_payment_status`]. Status and amount are
//! only ever taken from a gateway query, never from a notification body.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::application::handlers::ledger::PaymentLedger;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::ledger::{Receipt, Transaction};
use crate::domain::reconciliation::{
    extract_payer, map_gateway_status, Gateway, PaymentLink, ReconciledStatus, WebhookError,
};
use crate::domain::subscription::Subscription;
use crate::ports::{
    payment_link_key, subscription_key, Clock, GatewayError, LedgerRepository,
    PaymentEventRepository, PaymentGateways, PaymentLinkRepository, ReceiptNotifier,
    SubscriptionLocker, SubscriptionRepository,
};

/// Settings the reconciler needs from configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub currency: String,
    pub payment_link_ttl_days: u32,
    pub default_gateway: Gateway,
    pub return_url: String,
    pub mercadopago_notify_url: String,
    pub flow_notify_url: String,
}

impl ReconcilerSettings {
    pub fn notify_url(&self, gateway: Gateway) -> &str {
        match gateway {
            Gateway::MercadoPago => &self.mercadopago_notify_url,
            Gateway::Flow => &self.flow_notify_url,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            currency: "CLP".to_string(),
            payment_link_ttl_days: 7,
            default_gateway: Gateway::MercadoPago,
            return_url: "http://localhost:8080/payments/return".to_string(),
            mercadopago_notify_url: "http://localhost:8080/webhooks/mercadopago".to_string(),
            flow_notify_url: "http://localhost:8080/webhooks/flow".to_string(),
        }
    }
}

/// Ports the reconciler is wired with.
#[derive(Clone)]
pub struct ReconcilerPorts {
    pub links: Arc<dyn PaymentLinkRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub events: Arc<dyn PaymentEventRepository>,
    pub book: Arc<dyn LedgerRepository>,
    pub locker: Arc<dyn SubscriptionLocker>,
    pub gateways: PaymentGateways,
    pub notifier: Arc<dyn ReceiptNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// What a reconciliation did.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub link: PaymentLink,
    pub subscription: Option<Subscription>,

    /// `None` when the gateway reported a status we do not recognise.
    pub status: Option<ReconciledStatus>,

    /// True only for the call that moved the link to paid.
    pub newly_paid: bool,
}

/// Failure while reconciling against a gateway.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<ReconcileError> for WebhookError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Gateway(e) => WebhookError::Gateway(e.to_string()),
            ReconcileError::Domain(e) => match e.code {
                ErrorCode::ValidationFailed => WebhookError::ParseError(e.message),
                ErrorCode::PaymentLinkNotFound => WebhookError::UnknownReference(e.message),
                _ => WebhookError::Database(e.to_string()),
            },
        }
    }
}

pub struct PaymentReconciler {
    pub(super) ports: ReconcilerPorts,
    pub(super) ledger: Arc<PaymentLedger>,
    pub(super) settings: ReconcilerSettings,
}

impl PaymentReconciler {
    pub fn new(
        ports: ReconcilerPorts,
        ledger: Arc<PaymentLedger>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            ports,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Apply a gateway-reported status to the link with `reference_id`.
    ///
    /// Returns `Ok(None)` for a reference we never issued; nothing is
    /// written in that case.
    pub async fn update_payment_status(
        &self,
        reference_id: &str,
        gateway_status: &str,
        payload: &Value,
    ) -> Result<Option<ReconciliationOutcome>, DomainError> {
        let Some(link) = self.ports.links.find_by_reference_id(reference_id).await? else {
            tracing::error!(reference_id, "Payment notification for unknown reference");
            return Ok(None);
        };

        let Some(status) = map_gateway_status(link.gateway, gateway_status) else {
            tracing::warn!(
                reference_id,
                gateway = link.gateway.as_str(),
                gateway_status,
                "Unrecognised gateway status, ignoring"
            );
            return self.snapshot(link, None).await.map(Some);
        };

        match status {
            ReconciledStatus::Paid => self.apply_paid(link, payload).await.map(Some),
            ReconciledStatus::Pending => {
                tracing::info!(reference_id, gateway_status, "Payment still pending");
                self.snapshot(link, Some(status)).await.map(Some)
            }
            ReconciledStatus::Cancelled => self.apply_cancelled(link).await.map(Some),
        }
    }

    /// Book the income transaction and issue the receipt for a paid link,
    /// skipping whatever already exists. Delivers a newly issued receipt.
    ///
    /// Returns `true` if anything was created.
    pub async fn process_successful_payment(
        &self,
        link: &PaymentLink,
    ) -> Result<bool, DomainError> {
        let (created, receipt) = {
            let _guard = self.ports.locker.lock(&lock_key(link)).await?;
            self.record_successful_payment(link).await?
        };
        if let Some(receipt) = receipt {
            self.deliver_receipt(&receipt, link).await;
        }
        Ok(created)
    }

    async fn apply_paid(
        &self,
        link: PaymentLink,
        payload: &Value,
    ) -> Result<ReconciliationOutcome, DomainError> {
        let (link, newly_paid, receipt) = {
            let _guard = self.ports.locker.lock(&lock_key(&link)).await?;
            let mut link = self.reload(&link.reference_id).await?;

            let now = self.ports.clock.now();
            let newly_paid = if link.is_paid() {
                tracing::info!(
                    reference_id = %link.reference_id,
                    "Payment link already paid, re-checking side effects"
                );
                self.settle_linked_event(&link, link.paid_at.unwrap_or(now))
                    .await?;
                false
            } else {
                link.mark_paid(now, extract_payer(payload))?;
                // Stored as paid only once its event is settled.
                self.settle_linked_event(&link, now).await?;
                self.ports.links.update(&link).await?;
                tracing::info!(
                    reference_id = %link.reference_id,
                    gateway = link.gateway.as_str(),
                    amount = link.amount,
                    "Payment link paid"
                );
                true
            };

            let (_, receipt) = self.record_successful_payment(&link).await?;
            (link, newly_paid, receipt)
        };

        if let Some(receipt) = receipt {
            self.deliver_receipt(&receipt, &link).await;
        }

        let mut outcome = self.snapshot(link, Some(ReconciledStatus::Paid)).await?;
        outcome.newly_paid = newly_paid;
        Ok(outcome)
    }

    async fn apply_cancelled(&self, link: PaymentLink) -> Result<ReconciliationOutcome, DomainError> {
        let link = {
            let _guard = self.ports.locker.lock(&lock_key(&link)).await?;
            let mut link = self.reload(&link.reference_id).await?;
            let now = self.ports.clock.now();
            match link.cancel(now) {
                Ok(()) => {
                    self.ports.links.update(&link).await?;
                    tracing::info!(reference_id = %link.reference_id, "Payment link cancelled");
                }
                Err(err) if err.is_invalid_transition() => {
                    tracing::info!(
                        reference_id = %link.reference_id,
                        status = link.status.as_str(),
                        "Payment link not pending, cancellation ignored"
                    );
                }
                Err(err) => return Err(err),
            }
            link
        };
        self.snapshot(link, Some(ReconciledStatus::Cancelled)).await
    }

    /// Settle the link's payment event if it is still pending. Caller holds
    /// the lock.
    async fn settle_linked_event(
        &self,
        link: &PaymentLink,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        let Some(event_id) = link.payment_event_id else {
            return Ok(());
        };
        match self.ledger.settle(&event_id, now.date()).await {
            Ok(settled) => {
                if !settled {
                    tracing::info!(event_id = %event_id, "Payment event was already settled");
                }
                Ok(())
            }
            // Pending events are dropped on cancel; the money is still booked.
            Err(err) if err.code == ErrorCode::PaymentEventNotFound => {
                tracing::warn!(
                    reference_id = %link.reference_id,
                    event_id = %event_id,
                    "Paid link refers to a deleted payment event"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Create the missing transaction and receipt. Caller holds the lock.
    async fn record_successful_payment(
        &self,
        link: &PaymentLink,
    ) -> Result<(bool, Option<Receipt>), DomainError> {
        let book = &self.ports.book;
        let mut created = false;

        if book.transaction_exists_for_reference(&link.reference_id).await? {
            tracing::info!(reference_id = %link.reference_id, "Transaction already booked");
        } else {
            let date = link
                .paid_at
                .map(|t| t.date())
                .unwrap_or_else(|| self.ports.clock.today());
            let transaction = Transaction::income_for_link(
                &link.reference_id,
                link.description.clone(),
                link.amount,
                date,
            );
            book.save_transaction(&transaction).await?;
            created = true;
        }

        let receipt = if book
            .find_receipt_by_link_reference(&link.reference_id)
            .await?
            .is_some()
        {
            tracing::info!(reference_id = %link.reference_id, "Receipt already issued");
            None
        } else {
            let receipt = Receipt::issue(
                &link.reference_id,
                link.subscription_id,
                link.amount,
                link.payer_email.clone(),
                link.payer_name.clone(),
            );
            book.save_receipt(&receipt).await?;
            created = true;
            Some(receipt)
        };

        Ok((created, receipt))
    }

    async fn deliver_receipt(&self, receipt: &Receipt, link: &PaymentLink) {
        if let Err(err) = self.ports.notifier.deliver(receipt, link).await {
            tracing::error!(
                receipt_number = %receipt.receipt_number,
                error = %err,
                "Receipt delivery failed"
            );
        }
    }

    pub(super) async fn reload(&self, reference_id: &str) -> Result<PaymentLink, DomainError> {
        self.ports
            .links
            .find_by_reference_id(reference_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PaymentLinkNotFound,
                    format!("Payment link {} not found", reference_id),
                )
            })
    }

    pub(super) async fn snapshot(
        &self,
        link: PaymentLink,
        status: Option<ReconciledStatus>,
    ) -> Result<ReconciliationOutcome, DomainError> {
        let subscription = match link.subscription_id {
            Some(id) => self.ports.subscriptions.find_by_id(&id).await?,
            None => None,
        };
        Ok(ReconciliationOutcome {
            link,
            subscription,
            status,
            newly_paid: false,
        })
    }
}

/// Lock protecting a link: its subscription's lock when it has one.
pub(super) fn lock_key(link: &PaymentLink) -> String {
    match link.subscription_id {
        Some(id) => subscription_key(&id),
        None => payment_link_key(&link.reference_id),
    }
}
