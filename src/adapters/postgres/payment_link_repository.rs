//! PostgreSQL implementation of PaymentLinkRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_unique_violation, parse_column};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentEventId, PaymentLinkId, SubscriptionId, Timestamp,
};
use crate::domain::reconciliation::{Gateway, PaymentLink, PaymentLinkStatus};
use crate::ports::PaymentLinkRepository;

const COLUMNS: &str = "id, reference_id, subscription_id, payment_event_id, gateway, \
     external_id, amount, description, status, payer_email, payer_name, redirect_url, \
     expires_at, paid_at, created_at, updated_at";

pub struct PostgresPaymentLinkRepository {
    pool: PgPool,
}

impl PostgresPaymentLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<PaymentLink>, DomainError> {
        let row: Option<PaymentLinkRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_links WHERE {} = $1 ORDER BY created_at DESC LIMIT 1",
            COLUMNS, filter
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find payment link"))?;

        row.map(PaymentLink::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentLinkRow {
    id: Uuid,
    reference_id: String,
    subscription_id: Option<Uuid>,
    payment_event_id: Option<Uuid>,
    gateway: String,
    external_id: Option<String>,
    amount: i64,
    description: String,
    status: String,
    payer_email: Option<String>,
    payer_name: Option<String>,
    redirect_url: Option<String>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentLinkRow> for PaymentLink {
    type Error = DomainError;

    fn try_from(row: PaymentLinkRow) -> Result<Self, Self::Error> {
        Ok(PaymentLink {
            id: PaymentLinkId::from_uuid(row.id),
            reference_id: row.reference_id,
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            payment_event_id: row.payment_event_id.map(PaymentEventId::from_uuid),
            gateway: parse_column("gateway", &row.gateway, Gateway::parse)?,
            external_id: row.external_id,
            amount: row.amount,
            description: row.description,
            status: parse_column("status", &row.status, PaymentLinkStatus::parse)?,
            payer_email: row.payer_email,
            payer_name: row.payer_name,
            redirect_url: row.redirect_url,
            expires_at: Timestamp::from_datetime(row.expires_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl PaymentLinkRepository for PostgresPaymentLinkRepository {
    async fn save(&self, link: &PaymentLink) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_links (
                id, reference_id, subscription_id, payment_event_id, gateway, external_id,
                amount, description, status, payer_email, payer_name, redirect_url,
                expires_at, paid_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(link.id.as_uuid())
        .bind(&link.reference_id)
        .bind(link.subscription_id.map(|id| *id.as_uuid()))
        .bind(link.payment_event_id.map(|id| *id.as_uuid()))
        .bind(link.gateway.as_str())
        .bind(&link.external_id)
        .bind(link.amount)
        .bind(&link.description)
        .bind(link.status.as_str())
        .bind(&link.payer_email)
        .bind(&link.payer_name)
        .bind(&link.redirect_url)
        .bind(link.expires_at.as_datetime())
        .bind(link.paid_at.map(|t| *t.as_datetime()))
        .bind(link.created_at.as_datetime())
        .bind(link.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "payment_links_reference_id_key") {
                return DomainError::validation(
                    "reference_id",
                    format!("Payment link {} already exists", link.reference_id),
                );
            }
            DomainError::database(format!("Failed to save payment link: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, link: &PaymentLink) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_links SET
                external_id = $2,
                status = $3,
                payer_email = $4,
                payer_name = $5,
                redirect_url = $6,
                expires_at = $7,
                paid_at = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(link.id.as_uuid())
        .bind(&link.external_id)
        .bind(link.status.as_str())
        .bind(&link.payer_email)
        .bind(&link.payer_name)
        .bind(&link.redirect_url)
        .bind(link.expires_at.as_datetime())
        .bind(link.paid_at.map(|t| *t.as_datetime()))
        .bind(link.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("update payment link"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentLinkNotFound,
                format!("Payment link {} not found", link.reference_id),
            ));
        }
        Ok(())
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<PaymentLink>, DomainError> {
        self.find_one("reference_id", reference_id).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentLink>, DomainError> {
        self.find_one("external_id", external_id).await
    }

    async fn find_open_for_event(
        &self,
        event_id: &PaymentEventId,
        now: Timestamp,
    ) -> Result<Option<PaymentLink>, DomainError> {
        let row: Option<PaymentLinkRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_links \
             WHERE payment_event_id = $1 AND status = 'pending' AND expires_at > $2 \
             ORDER BY created_at DESC LIMIT 1",
            COLUMNS
        ))
        .bind(event_id.as_uuid())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find open payment link"))?;

        row.map(PaymentLink::try_from).transpose()
    }

    async fn find_pending(&self) -> Result<Vec<PaymentLink>, DomainError> {
        let rows: Vec<PaymentLinkRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_links WHERE status = 'pending' ORDER BY created_at",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list pending payment links"))?;

        rows.into_iter().map(PaymentLink::try_from).collect()
    }
}
