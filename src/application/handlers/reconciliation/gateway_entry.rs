//! Gateway-facing entry points: notifications, returns, refresh, and
//! payment link creation.
//!
//! Each one queries the gateway first, without holding any lock, and then
//! hands the authoritative status to `update_payment_status`.

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::domain::reconciliation::{
    map_gateway_status, Gateway, PaymentLink, PaymentLinkStatus, ReconciledStatus,
};
use crate::ports::{GatewayPaymentStatus, PaymentIntentRequest};

use super::payment_reconciler::{
    lock_key, PaymentReconciler, ReconcileError, ReconciliationOutcome,
};

impl PaymentReconciler {
    /// Mercado Pago webhook: re-fetch the payment named in the notification.
    pub async fn handle_mercadopago_notification(
        &self,
        payment_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, ReconcileError> {
        self.reconcile_from_gateway(Gateway::MercadoPago, payment_id)
            .await
    }

    /// Flow confirmation callback: query the status for the posted token.
    pub async fn confirm_flow_payment(
        &self,
        token: &str,
    ) -> Result<Option<ReconciliationOutcome>, ReconcileError> {
        self.reconcile_from_gateway(Gateway::Flow, token).await
    }

    /// Payer came back from the checkout with the gateway's own id.
    pub async fn handle_return(
        &self,
        gateway: Gateway,
        external_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, ReconcileError> {
        self.reconcile_from_gateway(gateway, external_id).await
    }

    /// Ask the gateway for the latest payment on one of our links.
    ///
    /// Returns `Ok(None)` for an unknown reference.
    pub async fn refresh_payment_link(
        &self,
        reference_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, ReconcileError> {
        let Some(link) = self.ports.links.find_by_reference_id(reference_id).await? else {
            tracing::warn!(reference_id, "Refresh requested for unknown payment link");
            return Ok(None);
        };
        let gateway = self.ports.gateways.require(link.gateway)?;
        match gateway.find_payment_by_reference(reference_id).await? {
            Some(payment) => Ok(self
                .update_payment_status(reference_id, &payment.status, &payment.raw_payload)
                .await?),
            None => {
                tracing::debug!(reference_id, "Gateway has no payment for link yet");
                Ok(Some(
                    self.snapshot(link, Some(ReconciledStatus::Pending)).await?,
                ))
            }
        }
    }

    /// Expire a pending link once past its expiry. Returns `true` if expired.
    ///
    /// The gateway is asked once first. A link it reports as paid is
    /// settled instead.
    pub async fn expire_link_if_stale(
        &self,
        reference_id: &str,
        now: Timestamp,
    ) -> Result<bool, ReconcileError> {
        let Some(link) = self.ports.links.find_by_reference_id(reference_id).await? else {
            return Ok(false);
        };
        if link.status != PaymentLinkStatus::Pending || link.is_open(now) {
            return Ok(false);
        }

        let gateway = self.ports.gateways.require(link.gateway)?;
        if let Some(payment) = gateway.find_payment_by_reference(reference_id).await? {
            if map_gateway_status(link.gateway, &payment.status) == Some(ReconciledStatus::Paid) {
                tracing::info!(reference_id, "Stale payment link was paid, settling it");
                self.update_payment_status(reference_id, &payment.status, &payment.raw_payload)
                    .await?;
                return Ok(false);
            }
        }

        let _guard = self.ports.locker.lock(&lock_key(&link)).await?;
        let mut link = self.reload(reference_id).await?;
        if link.is_paid() || link.is_open(now) {
            return Ok(false);
        }
        if let Err(err) = link.expire(now) {
            if err.is_invalid_transition() {
                return Ok(false);
            }
            return Err(err.into());
        }
        self.ports.links.update(&link).await?;
        tracing::info!(reference_id, "Payment link expired");
        Ok(true)
    }

    /// Issue a checkout for the subscription's pending payment event.
    ///
    /// An open link for the same event is returned instead of creating a
    /// second checkout.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the subscription does not exist
    /// - `ValidationFailed` if it has no pending payment event
    /// - `Gateway` if the checkout could not be created
    pub async fn create_payment_link(
        &self,
        subscription_id: &SubscriptionId,
        gateway: Option<Gateway>,
    ) -> Result<PaymentLink, ReconcileError> {
        let gateway = gateway.unwrap_or(self.settings.default_gateway);
        let subscription = self
            .ports
            .subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription {} not found", subscription_id),
                )
            })?;
        let event = self
            .ports
            .events
            .find_pending_for(subscription_id)
            .await?
            .ok_or_else(|| {
                DomainError::validation(
                    "payment_event",
                    format!(
                        "Subscription {} has no pending payment event",
                        subscription.reference_id
                    ),
                )
            })?;

        let now = self.ports.clock.now();
        if let Some(open) = self.ports.links.find_open_for_event(&event.id, now).await? {
            tracing::info!(
                reference_id = %open.reference_id,
                subscription = %subscription.reference_id,
                "Reusing open payment link"
            );
            return Ok(open);
        }

        let description = format!(
            "Suscripción {} {}",
            subscription.payment_type.label(),
            subscription.reference_id
        );
        let mut link = PaymentLink::new(
            Some(subscription.id),
            Some(event.id),
            gateway,
            event.amount,
            description,
            now,
            self.settings.payment_link_ttl_days,
        )?;

        let adapter = self.ports.gateways.require(gateway)?;
        let intent = adapter
            .create_payment_intent(&PaymentIntentRequest {
                amount: link.amount,
                currency: self.settings.currency.clone(),
                reference_id: link.reference_id.clone(),
                description: link.description.clone(),
                payer_email: None,
                return_url: self.settings.return_url.clone(),
                notify_url: self.settings.notify_url(gateway).to_string(),
            })
            .await?;
        link.attach_intent(intent.external_id, intent.redirect_url);
        self.ports.links.save(&link).await?;

        tracing::info!(
            reference_id = %link.reference_id,
            subscription = %subscription.reference_id,
            gateway = gateway.as_str(),
            amount = link.amount,
            "Payment link created"
        );
        Ok(link)
    }

    async fn reconcile_from_gateway(
        &self,
        gateway: Gateway,
        external_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, ReconcileError> {
        let adapter = self.ports.gateways.require(gateway)?;
        let payment = adapter.get_payment_status(external_id).await?;
        let Some(reference_id) = self.resolve_reference(external_id, &payment).await? else {
            tracing::error!(
                gateway = gateway.as_str(),
                external_id,
                "Gateway payment does not match any payment link"
            );
            return Ok(None);
        };
        Ok(self
            .update_payment_status(&reference_id, &payment.status, &payment.raw_payload)
            .await?)
    }

    async fn resolve_reference(
        &self,
        external_id: &str,
        payment: &GatewayPaymentStatus,
    ) -> Result<Option<String>, DomainError> {
        if let Some(reference) = &payment.reference_id {
            return Ok(Some(reference.clone()));
        }
        Ok(self
            .ports
            .links
            .find_by_external_id(external_id)
            .await?
            .map(|link| link.reference_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::application::test_support::Harness;
    use crate::domain::reconciliation::{Gateway, PaymentLinkStatus, ReconciledStatus};
    use crate::ports::{GatewayError, LedgerRepository, PaymentLinkRepository};
    use crate::adapters::gateways::MockGateway;

    use super::ReconcileError;

    #[tokio::test]
    async fn create_payment_link_uses_pending_event_amount() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;

        let link = h
            .reconciler()
            .create_payment_link(&sub.id, Some(Gateway::Flow))
            .await
            .unwrap();

        assert_eq!(link.amount, 45_000);
        assert_eq!(link.status, PaymentLinkStatus::Pending);
        assert_eq!(link.gateway, Gateway::Flow);
        assert!(link.redirect_url.is_some());
        let intents = h.flow.intents();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].currency, "CLP");
        assert!(intents[0].notify_url.ends_with("/webhooks/flow"));
    }

    #[tokio::test]
    async fn open_link_is_reused() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;

        let first = h.reconciler().create_payment_link(&sub.id, None).await.unwrap();
        let second = h.reconciler().create_payment_link(&sub.id, None).await.unwrap();

        assert_eq!(first.reference_id, second.reference_id);
        assert_eq!(h.mercadopago.intents().len(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_saves_no_link() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;
        h.mercadopago.fail_next(GatewayError::network("unreachable"));

        let err = h.reconciler().create_payment_link(&sub.id, None).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Gateway(_)));
        assert!(h.links.all().await.is_empty());
    }

    #[tokio::test]
    async fn mercadopago_notification_settles_via_gateway_query() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;
        let link = h.reconciler().create_payment_link(&sub.id, None).await.unwrap();
        h.mercadopago
            .set_payment("987", &link.reference_id, "approved", Some("pagador@example.cl"));

        let outcome = h
            .reconciler()
            .handle_mercadopago_notification("987")
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.newly_paid);
        assert_eq!(outcome.status, Some(ReconciledStatus::Paid));
        assert_eq!(outcome.link.payer_email.as_deref(), Some("pagador@example.cl"));
        assert_eq!(h.book.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn flow_confirmation_resolves_reference_by_token() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;
        let link = h
            .reconciler()
            .create_payment_link(&sub.id, Some(Gateway::Flow))
            .await
            .unwrap();
        let token = MockGateway::external_id_for(&link.reference_id);
        h.flow.set_payment(&token, &link.reference_id, "2", None);

        let outcome = h.reconciler().confirm_flow_payment(&token).await.unwrap().unwrap();
        assert!(outcome.link.is_paid());
    }

    #[tokio::test]
    async fn notification_for_foreign_payment_writes_nothing() {
        let h = Harness::new();
        h.mercadopago.set_payment("555", "not-ours", "approved", None);

        let outcome = h
            .reconciler()
            .handle_mercadopago_notification("555")
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(h.book.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn refresh_without_gateway_payment_reports_pending() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;
        let link = h.reconciler().create_payment_link(&sub.id, None).await.unwrap();

        let outcome = h
            .reconciler()
            .refresh_payment_link(&link.reference_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.status, Some(ReconciledStatus::Pending));
        let stored = h.links.find_by_reference_id(&link.reference_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentLinkStatus::Pending);
    }

    #[tokio::test]
    async fn refresh_applies_rejection() {
        let h = Harness::new();
        let sub = h.active_subscription(45_000).await;
        let link = h.reconciler().create_payment_link(&sub.id, None).await.unwrap();
        h.mercadopago.set_payment("42", &link.reference_id, "rejected", None);

        h.reconciler().refresh_payment_link(&link.reference_id).await.unwrap();

        let stored = h.links.find_by_reference_id(&link.reference_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentLinkStatus::Cancelled);
        assert!(h.book.find_receipt_by_link_reference(&link.reference_id).await.unwrap().is_none());
    }
}
