//! Clients and the applications they subscribe to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ApplicationId, ClientId, ValidationError};

/// Chilean RUT as entered on forms: 7-8 digits, dash, check digit or K.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxId(String);

fn is_rut_format(value: &str) -> bool {
    let Some((body, check)) = value.split_once('-') else {
        return false;
    };
    let body_ok = (7..=8).contains(&body.len()) && body.bytes().all(|b| b.is_ascii_digit());
    let check_ok = check.len() == 1
        && check
            .chars()
            .all(|c| c.is_ascii_digit() || c == 'k' || c == 'K');
    body_ok && check_ok
}

impl TaxId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::empty_field("tax_id"));
        }
        if !is_rut_format(&value) {
            return Err(ValidationError::invalid_format(
                "tax_id",
                "expected format 12345678-9",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaxId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaxId::new(value)
    }
}

impl From<TaxId> for String {
    fn from(id: TaxId) -> Self {
        id.0
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nationality {
    Chilena,
    Extranjera,
}

/// Billing contact for one or more subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    tax_id: TaxId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: Option<String>,
    pub nationality: Nationality,
}

impl Client {
    pub fn new(
        id: ClientId,
        tax_id: TaxId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        nationality: Nationality,
    ) -> Result<Self, ValidationError> {
        let email = email.into();
        if !is_plausible_email(&email) {
            return Err(ValidationError::invalid_format("email", "missing @ or domain"));
        }
        Ok(Self {
            id,
            tax_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email,
            company: None,
            nationality,
        })
    }

    /// Tax id is fixed at creation.
    pub fn tax_id(&self) -> &TaxId {
        &self.tax_id
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

/// Product a client subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub description: String,
    pub owner: Option<ClientId>,
}
