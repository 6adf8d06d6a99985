//! Splits a payment between recurring subscriptions and the one-off charge.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    billing_periods::BillingPeriod, product_types::ProductType,
};

/// Invoice line joined with its product type.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_type: ProductType,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub discount: Decimal,
    pub period: Option<BillingPeriod>,
}

impl PricedLine {
    pub fn is_subscription(&self) -> bool {
        self.product_type.is_recurring()
    }

    pub fn gross(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn net(&self) -> Decimal {
        self.gross() - self.discount
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proration {
    pub subscription_lines: Vec<PricedLine>,
    /// Undiscounted price of every subscription line.
    pub subscription_total: Decimal,
    /// What the customer actually pays for subscriptions on this invoice.
    pub initial_total: Decimal,
    /// Remainder charged as a one-off payment.
    pub real_total: Decimal,
}

impl Proration {
    pub fn calculate(payment_amount: Decimal, lines: &[PricedLine]) -> Self {
        let subscription_lines: Vec<PricedLine> = lines
            .iter()
            .filter(|line| line.is_subscription())
            .cloned()
            .collect();

        let subscription_total: Decimal = subscription_lines.iter().map(PricedLine::gross).sum();
        let initial_total: Decimal = subscription_lines.iter().map(PricedLine::net).sum();

        Self {
            subscription_lines,
            subscription_total,
            initial_total,
            real_total: payment_amount - initial_total,
        }
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.subscription_lines.is_empty()
    }

    /// One-time discount for the first recurring invoice. Only present when
    /// line discounts brought the subscriptions below their list price.
    pub fn coupon_amount(&self) -> Option<Decimal> {
        Self::coupon_for(&self.subscription_lines)
    }

    /// Same as `coupon_amount` restricted to `lines`, for when only some
    /// subscriptions are being registered.
    pub fn coupon_for<'a>(lines: impl IntoIterator<Item = &'a PricedLine>) -> Option<Decimal> {
        let discount: Decimal = lines
            .into_iter()
            .map(|line| line.gross() - line.net())
            .sum();
        (discount > Decimal::ZERO).then_some(discount)
    }

    pub fn requires_charge(&self) -> bool {
        self.real_total > Decimal::ZERO
    }

    pub fn find_line(&self, product_id: Uuid, period: BillingPeriod) -> Option<&PricedLine> {
        self.subscription_lines
            .iter()
            .find(|line| line.product_id == product_id && line.period == Some(period))
    }
}
