//! HTTP adapter for billing endpoints.
//!
//! - `POST /webhooks/mercadopago` - Mercado Pago notifications
//! - `POST /webhooks/flow` - Flow confirmations
//! - `GET /payments/return` - payer return from a checkout
//! - `POST /payment-links/:reference/refresh` - re-query a link's gateway

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingAppState, WebhookApiError};
pub use routes::billing_router;
