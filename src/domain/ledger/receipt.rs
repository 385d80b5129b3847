//! Receipts issued for paid payment links.

use rand::distributions::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ReceiptId, SubscriptionId, Timestamp};

const VERIFICATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const VERIFICATION_LEN: usize = 8;

/// Proof of payment. One per payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub receipt_number: String,
    pub payment_link_reference: String,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: i64,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,

    /// Code printed on the receipt so third parties can verify it.
    pub verification_code: String,

    pub issued_at: Timestamp,
}

impl Receipt {
    pub fn issue(
        payment_link_reference: &str,
        subscription_id: Option<SubscriptionId>,
        amount: i64,
        payer_email: Option<String>,
        payer_name: Option<String>,
    ) -> Self {
        Self {
            id: ReceiptId::new(),
            receipt_number: format!("R-{}", payment_link_reference),
            payment_link_reference: payment_link_reference.to_string(),
            subscription_id,
            amount,
            payer_email,
            payer_name,
            verification_code: verification_code(),
            issued_at: Timestamp::now(),
        }
    }
}

fn verification_code() -> String {
    let dist = Uniform::from(0..VERIFICATION_ALPHABET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(VERIFICATION_LEN)
        .map(|i| VERIFICATION_ALPHABET[i] as char)
        .collect()
}
