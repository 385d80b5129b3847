//! Time source.

use chrono::NaiveDate;

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Billing calendar day. UTC.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}
