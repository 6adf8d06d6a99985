use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::enums::{
        billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus,
    },
};

#[derive(Debug, Serialize)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&SubscriptionEntity> for SubscriptionDto {
    fn from(subscription: &SubscriptionEntity) -> Self {
        Self {
            id: subscription.id,
            order_id: subscription.order_id,
            product_id: subscription.product_id,
            period: subscription.period,
            status: subscription.status,
            updated_at: subscription.updated_at,
        }
    }
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub cancelled: usize,
    pub failed: usize,
}
