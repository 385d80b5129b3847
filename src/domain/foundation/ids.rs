//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a billed subscription.
    SubscriptionId
);
uuid_id!(
    /// Unique identifier for an agency client.
    ClientId
);
uuid_id!(
    /// Unique identifier for a client application being billed.
    ApplicationId
);
uuid_id!(
    /// Identifier of the quote a subscription was generated from.
    QuoteId
);
uuid_id!(
    /// Unique identifier for a scheduled payment event.
    PaymentEventId
);
uuid_id!(
    /// Unique identifier for a side-ledger payment.
    PaymentId
);
uuid_id!(
    /// Unique identifier for an income/expense ledger row.
    TransactionId
);
uuid_id!(
    /// Unique identifier for a gateway payment link.
    PaymentLinkId
);
uuid_id!(
    /// Unique identifier for an issued receipt.
    ReceiptId
);
