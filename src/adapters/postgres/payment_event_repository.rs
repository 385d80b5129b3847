//! PostgreSQL implementation of PaymentEventRepository.
//!
//! The single-pending rule is the partial unique index
//! `payment_events_one_pending_idx`; inserts lean on it with
//! `ON CONFLICT DO NOTHING`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_unique_violation, parse_column};
use crate::domain::foundation::{DomainError, PaymentEventId, SubscriptionId, Timestamp};
use crate::domain::ledger::{PaymentEvent, PaymentEventStatus};
use crate::ports::PaymentEventRepository;

const COLUMNS: &str =
    "id, subscription_id, expected_date, paid_date, amount, status, notes, created_at";

pub struct PostgresPaymentEventRepository {
    pool: PgPool,
}

impl PostgresPaymentEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentEventRow {
    id: Uuid,
    subscription_id: Uuid,
    expected_date: NaiveDate,
    paid_date: Option<NaiveDate>,
    amount: i64,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentEventRow> for PaymentEvent {
    type Error = DomainError;

    fn try_from(row: PaymentEventRow) -> Result<Self, Self::Error> {
        Ok(PaymentEvent {
            id: PaymentEventId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            expected_date: row.expected_date,
            paid_date: row.paid_date,
            amount: row.amount,
            status: parse_column("status", &row.status, PaymentEventStatus::parse)?,
            notes: row.notes,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl PaymentEventRepository for PostgresPaymentEventRepository {
    async fn insert_if_no_pending(&self, event: &PaymentEvent) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (
                id, subscription_id, expected_date, paid_date, amount, status, notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (subscription_id) WHERE status = 'pending' DO NOTHING
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.subscription_id.as_uuid())
        .bind(event.expected_date)
        .bind(event.paid_date)
        .bind(event.amount)
        .bind(event.status.as_str())
        .bind(&event.notes)
        .bind(event.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("insert payment event"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: &PaymentEventId) -> Result<Option<PaymentEvent>, DomainError> {
        let row: Option<PaymentEventRow> =
            sqlx::query_as(&format!("SELECT {} FROM payment_events WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find payment event"))?;

        row.map(PaymentEvent::try_from).transpose()
    }

    async fn find_pending_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<PaymentEvent>, DomainError> {
        let row: Option<PaymentEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_events WHERE subscription_id = $1 AND status = 'pending'",
            COLUMNS
        ))
        .bind(subscription_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find pending payment event"))?;

        row.map(PaymentEvent::try_from).transpose()
    }

    async fn list_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<PaymentEvent>, DomainError> {
        let rows: Vec<PaymentEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_events WHERE subscription_id = $1 \
             ORDER BY expected_date, created_at",
            COLUMNS
        ))
        .bind(subscription_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payment events"))?;

        rows.into_iter().map(PaymentEvent::try_from).collect()
    }

    async fn mark_paid(
        &self,
        id: &PaymentEventId,
        paid_date: NaiveDate,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE payment_events SET status = 'paid', paid_date = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_uuid())
        .bind(paid_date)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark payment event paid"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn reopen(&self, id: &PaymentEventId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE payment_events SET status = 'pending', paid_date = NULL \
             WHERE id = $1 AND status = 'paid'",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(e) if is_unique_violation(&e, "payment_events_one_pending_idx") => Ok(false),
            Err(e) => Err(db_error("reopen payment event")(e)),
        }
    }

    async fn delete_pending_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM payment_events WHERE subscription_id = $1 AND status = 'pending'",
        )
        .bind(subscription_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("delete pending payment events"))?;

        Ok(result.rows_affected())
    }
}
