//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_unique_violation, parse_column};
use crate::domain::foundation::{
    ApplicationId, ClientId, DomainError, ErrorCode, QuoteId, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{PaymentType, ReferenceId, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

const COLUMNS: &str = "id, reference_id, client_id, application_id, quote_id, status, \
     payment_type, price, start_date, current_period_end, auto_renewal, last_payment_date, \
     next_payment_date, notes, created_at, updated_at";

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    reference_id: String,
    client_id: Uuid,
    application_id: Uuid,
    quote_id: Option<Uuid>,
    status: String,
    payment_type: String,
    price: i64,
    start_date: NaiveDate,
    current_period_end: NaiveDate,
    auto_renewal: bool,
    last_payment_date: Option<NaiveDate>,
    next_payment_date: Option<NaiveDate>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            reference_id: ReferenceId::new(row.reference_id)
                .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?,
            client_id: ClientId::from_uuid(row.client_id),
            application_id: ApplicationId::from_uuid(row.application_id),
            quote_id: row.quote_id.map(QuoteId::from_uuid),
            status: parse_column("status", &row.status, SubscriptionStatus::parse)?,
            payment_type: parse_column("payment_type", &row.payment_type, PaymentType::parse)?,
            price: row.price,
            start_date: row.start_date,
            current_period_end: row.current_period_end,
            auto_renewal: row.auto_renewal,
            last_payment_date: row.last_payment_date,
            next_payment_date: row.next_payment_date,
            notes: row.notes,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, reference_id, client_id, application_id, quote_id, status, payment_type,
                price, start_date, current_period_end, auto_renewal, last_payment_date,
                next_payment_date, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.reference_id.as_str())
        .bind(subscription.client_id.as_uuid())
        .bind(subscription.application_id.as_uuid())
        .bind(subscription.quote_id.map(|q| *q.as_uuid()))
        .bind(subscription.status.as_str())
        .bind(subscription.payment_type.as_str())
        .bind(subscription.price)
        .bind(subscription.start_date)
        .bind(subscription.current_period_end)
        .bind(subscription.auto_renewal)
        .bind(subscription.last_payment_date)
        .bind(subscription.next_payment_date)
        .bind(&subscription.notes)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "subscriptions_reference_id_key") {
                return DomainError::validation(
                    "reference_id",
                    format!("Reference {} already exists", subscription.reference_id),
                );
            }
            DomainError::database(format!("Failed to save subscription: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                price = $3,
                start_date = $4,
                current_period_end = $5,
                auto_renewal = $6,
                last_payment_date = $7,
                next_payment_date = $8,
                notes = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.price)
        .bind(subscription.start_date)
        .bind(subscription.current_period_end)
        .bind(subscription.auto_renewal)
        .bind(subscription.last_payment_date)
        .bind(subscription.next_payment_date)
        .bind(&subscription.notes)
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("update subscription"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            ));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("SELECT {} FROM subscriptions WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find subscription"))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &ReferenceId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE reference_id = $1",
            COLUMNS
        ))
        .bind(reference_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find subscription"))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn next_reference_sequence(&self, payment_type: PaymentType) -> Result<u64, DomainError> {
        let max: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(SUBSTRING(reference_id FROM 3)::BIGINT), 0)
            FROM subscriptions
            WHERE reference_id ~ ('^' || $1 || '[0-9]{6}$')
            "#,
        )
        .bind(payment_type.reference_prefix())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("read reference sequence"))?;

        Ok(u64::try_from(max).unwrap_or(0) + 1)
    }

    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE status = $1 ORDER BY reference_id",
            COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list subscriptions"))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("delete subscription"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", id),
            ));
        }
        Ok(())
    }
}
