//! Subscription creation, including the monthly/annual pair priced by a quote.

use chrono::NaiveDate;
use std::iter;

use super::SubscriptionLifecycle;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId};
use crate::domain::subscription::{
    PaymentType, Quote, ReferenceId, Subscription, SubscriptionTerms, REFERENCE_ATTEMPTS,
};

/// Command to create a quote's subscription pair.
#[derive(Debug, Clone)]
pub struct CreateFromQuoteCommand {
    pub quote: Quote,
    pub start_date: NaiveDate,
    pub auto_renewal: bool,
}

/// Subscriptions created from one quote.
#[derive(Debug, Clone)]
pub struct CreateFromQuoteResult {
    pub monthly: Subscription,
    pub annual: Subscription,
}

impl SubscriptionLifecycle {
    /// Create a pending subscription with the next free reference id.
    ///
    /// Sequential ids are tried first, stepping forward on collision; a
    /// random suffix is the last resort.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the price is not positive
    /// - `ReferenceIdExhausted` if every candidate reference was taken
    pub async fn create(&self, terms: SubscriptionTerms) -> Result<Subscription, DomainError> {
        let payment_type = terms.payment_type;
        let first = self
            .subscriptions
            .next_reference_sequence(payment_type)
            .await?;
        let candidates = (0..REFERENCE_ATTEMPTS)
            .map(|offset| ReferenceId::sequential(payment_type, first + offset))
            .chain(iter::once(ReferenceId::random(payment_type)));

        for reference in candidates {
            let subscription =
                Subscription::create(SubscriptionId::new(), reference, terms.clone())?;
            match self.subscriptions.save(&subscription).await {
                Ok(()) => {
                    tracing::info!(
                        reference_id = %subscription.reference_id,
                        payment_type = payment_type.as_str(),
                        price = subscription.price,
                        "Subscription created"
                    );
                    return Ok(subscription);
                }
                Err(err) if err.is_validation_of("reference_id") => {
                    tracing::warn!(
                        reference_id = %subscription.reference_id,
                        "Reference id taken, trying next"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(DomainError::new(
            ErrorCode::ReferenceIdExhausted,
            format!("No free {} reference id", payment_type.as_str()),
        ))
    }

    /// Create a monthly and an annual subscription priced by `quote`.
    ///
    /// Both or neither: if the annual one cannot be created, the monthly
    /// one is deleted again before the error is returned.
    pub async fn create_from_quote(
        &self,
        cmd: CreateFromQuoteCommand,
    ) -> Result<CreateFromQuoteResult, DomainError> {
        cmd.quote.validate()?;
        let terms = |payment_type: PaymentType, price: i64| SubscriptionTerms {
            client_id: cmd.quote.client_id,
            application_id: cmd.quote.application_id,
            payment_type,
            price,
            start_date: cmd.start_date,
            auto_renewal: cmd.auto_renewal,
            quote_id: Some(cmd.quote.id),
            notes: format!("Generated from quote: {}", cmd.quote.name),
        };

        let monthly = self
            .create(terms(PaymentType::Monthly, cmd.quote.monthly_fee()))
            .await?;
        let annual = match self
            .create(terms(PaymentType::Annual, cmd.quote.annual_total()))
            .await
        {
            Ok(annual) => annual,
            Err(err) => {
                if let Err(cleanup) = self.subscriptions.delete(&monthly.id).await {
                    tracing::error!(
                        reference_id = %monthly.reference_id,
                        error = %cleanup,
                        "Could not delete monthly subscription of failed quote pair"
                    );
                }
                return Err(err);
            }
        };

        Ok(CreateFromQuoteResult { monthly, annual })
    }
}
