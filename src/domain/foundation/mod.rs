//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, date arithmetic and error types
//! that form the vocabulary of the billing domain.

pub mod date_math;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use date_math::{next_annual_date, next_monthly_date};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    ApplicationId, ClientId, PaymentEventId, PaymentId, PaymentLinkId, QuoteId, ReceiptId,
    SubscriptionId, TransactionId,
};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
