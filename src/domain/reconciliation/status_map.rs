//! Gateway status vocabularies mapped onto the domain's three outcomes.

use serde::{Deserialize, Serialize};

/// Payment gateways a link can be issued through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    MercadoPago,
    Flow,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::MercadoPago => "mercado_pago",
            Gateway::Flow => "flow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mercado_pago" | "mercadopago" => Some(Gateway::MercadoPago),
            "flow" => Some(Gateway::Flow),
            _ => None,
        }
    }
}

/// Outcome of a gateway payment as far as billing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciledStatus {
    Paid,
    Pending,
    Cancelled,
}

const MERCADO_PAGO_STATUSES: &[(&str, ReconciledStatus)] = &[
    ("approved", ReconciledStatus::Paid),
    ("pending", ReconciledStatus::Pending),
    ("in_process", ReconciledStatus::Pending),
    ("authorized", ReconciledStatus::Pending),
    ("rejected", ReconciledStatus::Cancelled),
    ("cancelled", ReconciledStatus::Cancelled),
    ("refunded", ReconciledStatus::Cancelled),
    ("charged_back", ReconciledStatus::Cancelled),
];

// Flow reports numeric codes: 1 pending, 2 paid, 3 rejected, 4 cancelled.
const FLOW_STATUSES: &[(&str, ReconciledStatus)] = &[
    ("1", ReconciledStatus::Pending),
    ("2", ReconciledStatus::Paid),
    ("3", ReconciledStatus::Cancelled),
    ("4", ReconciledStatus::Cancelled),
];

/// Maps a raw gateway status. `None` for vocabulary the table does not know.
pub fn map_gateway_status(gateway: Gateway, raw: &str) -> Option<ReconciledStatus> {
    let table = match gateway {
        Gateway::MercadoPago => MERCADO_PAGO_STATUSES,
        Gateway::Flow => FLOW_STATUSES,
    };
    let raw = raw.trim();
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(raw))
        .map(|(_, status)| *status)
}
