//! Human-readable subscription reference ids (`ME000042`, `AN000007`).

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::PaymentType;
use crate::domain::foundation::ValidationError;

/// Sequential candidates tried before falling back to a random suffix.
pub const REFERENCE_ATTEMPTS: u64 = 3;

const SUFFIX_LEN: usize = 6;

/// Externally shared subscription code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Wraps a stored or user-supplied reference, rejecting blanks.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::empty_field("reference_id"));
        }
        Ok(Self(value))
    }

    /// `ME000042` style id for the given sequence number.
    pub fn sequential(payment_type: PaymentType, sequence: u64) -> Self {
        Self(format!(
            "{}{:0width$}",
            payment_type.reference_prefix(),
            sequence,
            width = SUFFIX_LEN
        ))
    }

    /// Prefix plus six random uppercase alphanumerics.
    pub fn random(payment_type: PaymentType) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();
        Self(format!("{}{}", payment_type.reference_prefix(), suffix))
    }

    /// Numeric sequence of a sequential id, if it is one.
    pub fn sequence(&self) -> Option<u64> {
        let digits = self.0.get(2..)?;
        if digits.len() != SUFFIX_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
