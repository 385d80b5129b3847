//! PostgreSQL implementation of LedgerRepository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_unique_violation, parse_column};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, ReceiptId, SubscriptionId, Timestamp, TransactionId,
};
use crate::domain::ledger::{Payment, PaymentStatus, Receipt, Transaction, TransactionKind};
use crate::ports::LedgerRepository;

pub struct PostgresLedgerRepository {
    pool: PgPool,
}

impl PostgresLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Option<Uuid>,
    amount: i64,
    status: String,
    due_date: NaiveDate,
    payment_date: Option<NaiveDate>,
    gateway_reference: Option<String>,
    notes: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            amount: row.amount,
            status: parse_column("status", &row.status, PaymentStatus::parse)?,
            due_date: row.due_date,
            payment_date: row.payment_date,
            gateway_reference: row.gateway_reference,
            notes: row.notes,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    kind: String,
    category: String,
    description: String,
    amount: i64,
    date: NaiveDate,
    payment_id: Option<Uuid>,
    source_reference: Option<String>,
    notes: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            kind: parse_column("kind", &row.kind, TransactionKind::parse)?,
            category: row.category,
            description: row.description,
            amount: row.amount,
            date: row.date,
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            source_reference: row.source_reference,
            notes: row.notes,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    receipt_number: String,
    payment_link_reference: String,
    subscription_id: Option<Uuid>,
    amount: i64,
    payer_email: Option<String>,
    payer_name: Option<String>,
    verification_code: String,
    issued_at: DateTime<Utc>,
}

impl From<ReceiptRow> for Receipt {
    fn from(row: ReceiptRow) -> Self {
        Receipt {
            id: ReceiptId::from_uuid(row.id),
            receipt_number: row.receipt_number,
            payment_link_reference: row.payment_link_reference,
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            amount: row.amount,
            payer_email: row.payer_email,
            payer_name: row.payer_name,
            verification_code: row.verification_code,
            issued_at: Timestamp::from_datetime(row.issued_at),
        }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn save_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, subscription_id, amount, status, due_date, payment_date,
                gateway_reference, notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.subscription_id.map(|id| *id.as_uuid()))
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.due_date)
        .bind(payment.payment_date)
        .bind(&payment.gateway_reference)
        .bind(&payment.notes)
        .bind(payment.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("save payment"))?;

        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                payment_date = $3,
                gateway_reference = $4,
                notes = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.payment_date)
        .bind(&payment.gateway_reference)
        .bind(&payment.notes)
        .execute(&self.pool)
        .await
        .map_err(db_error("update payment"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            ));
        }
        Ok(())
    }

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, amount, status, due_date, payment_date,
                   gateway_reference, notes, created_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find payment"))?;

        row.map(Payment::try_from).transpose()
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, kind, category, description, amount, date, payment_id,
                source_reference, notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(transaction.amount)
        .bind(transaction.date)
        .bind(transaction.payment_id.map(|id| *id.as_uuid()))
        .bind(&transaction.source_reference)
        .bind(&transaction.notes)
        .bind(transaction.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "transactions_payment_idx")
                || is_unique_violation(&e, "transactions_source_reference_idx")
            {
                return DomainError::validation("transaction", "Transaction already recorded");
            }
            DomainError::database(format!("Failed to save transaction: {}", e))
        })?;

        Ok(())
    }

    async fn transaction_exists_for_payment(&self, id: &PaymentId) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM transactions WHERE payment_id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("check transaction"))
    }

    async fn transaction_exists_for_reference(
        &self,
        reference: &str,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE source_reference = $1)",
        )
        .bind(reference)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("check transaction"))
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, DomainError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, kind, category, description, amount, date, payment_id,
                   source_reference, notes, created_at
            FROM transactions
            ORDER BY date, created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list transactions"))?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn save_receipt(&self, receipt: &Receipt) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, receipt_number, payment_link_reference, subscription_id, amount,
                payer_email, payer_name, verification_code, issued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(receipt.id.as_uuid())
        .bind(&receipt.receipt_number)
        .bind(&receipt.payment_link_reference)
        .bind(receipt.subscription_id.map(|id| *id.as_uuid()))
        .bind(receipt.amount)
        .bind(&receipt.payer_email)
        .bind(&receipt.payer_name)
        .bind(&receipt.verification_code)
        .bind(receipt.issued_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "receipts_payment_link_reference_key") {
                return DomainError::validation(
                    "payment_link_reference",
                    format!("Receipt for {} already exists", receipt.payment_link_reference),
                );
            }
            DomainError::database(format!("Failed to save receipt: {}", e))
        })?;

        Ok(())
    }

    async fn find_receipt_by_link_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Receipt>, DomainError> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            r#"
            SELECT id, receipt_number, payment_link_reference, subscription_id, amount,
                   payer_email, payer_name, verification_code, issued_at
            FROM receipts
            WHERE payment_link_reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find receipt"))?;

        Ok(row.map(Receipt::from))
    }
}
