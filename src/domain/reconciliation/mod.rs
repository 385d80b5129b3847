//! Gateway reconciliation domain module.
//!
//! # Module Structure
//!
//! - `status_map` - gateway status vocabularies
//! - `payer` - ordered payer-contact extractors
//! - `payment_link` - PaymentLink entity
//! - `webhook_errors` - webhook failures and their HTTP mapping
//! - `webhook_verifier` - Mercado Pago `x-signature` checks

mod payer;
mod payment_link;
mod status_map;
mod webhook_errors;
mod webhook_verifier;

pub use payer::{
    additional_info_payer, extract_payer, flow_payer_email, top_level_payer, PayerExtractor,
    PayerInfo, PAYER_EXTRACTORS,
};
pub use payment_link::{PaymentLink, PaymentLinkStatus};
pub use status_map::{map_gateway_status, Gateway, ReconciledStatus};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{MercadoPagoSignatureVerifier, SignatureHeader};
