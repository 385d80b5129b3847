//! Quote calculator that prices a monthly and an annual subscription.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ApplicationId, ClientId, DomainError, QuoteId};

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl QuoteItem {
    pub fn subtotal(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub name: String,
    pub client_id: ClientId,
    pub application_id: ApplicationId,
    pub items: Vec<QuoteItem>,

    /// Margin applied on top of the item subtotal, in percent.
    pub margin_percent: u32,

    /// Discount for paying a full year up front, in percent (0..=100).
    pub annual_discount_percent: u32,
}

impl Quote {
    pub fn subtotal(&self) -> i64 {
        self.items.iter().map(QuoteItem::subtotal).sum()
    }

    /// Subtotal plus margin, rounded up.
    pub fn total_with_margin(&self) -> i64 {
        ceil_div(self.subtotal() * (100 + i64::from(self.margin_percent)), 100)
    }

    /// Twelfth of the margin total, rounded up. No discount.
    pub fn monthly_fee(&self) -> i64 {
        ceil_div(self.total_with_margin(), 12)
    }

    /// Margin total minus the annual discount, rounded up.
    pub fn annual_total(&self) -> i64 {
        let discount = i64::from(self.annual_discount_percent.min(100));
        ceil_div(self.total_with_margin() * (100 - discount), 100)
    }

    /// # Errors
    ///
    /// Returns a validation error if the quote has no items or any line
    /// is not positive.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::validation("items", "Quote has no items"));
        }
        if let Some(item) = self
            .items
            .iter()
            .find(|i| i.quantity == 0 || i.unit_price <= 0)
        {
            return Err(DomainError::validation(
                "items",
                format!("Item '{}' must have positive quantity and price", item.description),
            ));
        }
        if self.annual_discount_percent > 100 {
            return Err(DomainError::validation(
                "annual_discount_percent",
                "Discount cannot exceed 100%",
            ));
        }
        Ok(())
    }
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1).div_euclid(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(items: Vec<(u32, i64)>, margin: u32, discount: u32) -> Quote {
        Quote {
            id: QuoteId::new(),
            name: "Portal".into(),
            client_id: ClientId::new(),
            application_id: ApplicationId::new(),
            items: items
                .into_iter()
                .map(|(quantity, unit_price)| QuoteItem {
                    description: "item".into(),
                    quantity,
                    unit_price,
                })
                .collect(),
            margin_percent: margin,
            annual_discount_percent: discount,
        }
    }

    #[test]
    fn prices_round_up() {
        // 2 * 50_000 + 1 * 20_001 = 120_001; +20% = 144_001.2 -> 144_002
        let q = quote(vec![(2, 50_000), (1, 20_001)], 20, 10);
        assert_eq!(q.subtotal(), 120_001);
        assert_eq!(q.total_with_margin(), 144_002);
        // 144_002 / 12 = 12_000.16 -> 12_001
        assert_eq!(q.monthly_fee(), 12_001);
        // 144_002 * 0.9 = 129_601.8 -> 129_602
        assert_eq!(q.annual_total(), 129_602);
    }

    #[test]
    fn exact_amounts_are_not_bumped() {
        let q = quote(vec![(1, 120_000)], 0, 0);
        assert_eq!(q.monthly_fee(), 10_000);
        assert_eq!(q.annual_total(), 120_000);
    }

    #[test]
    fn empty_quote_is_invalid() {
        assert!(quote(vec![], 10, 0).validate().is_err());
    }

    #[test]
    fn zero_quantity_is_invalid() {
        assert!(quote(vec![(0, 1_000)], 10, 0).validate().is_err());
    }
}
