use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::subscriptions,
};

/// Local record of a recurring product bought on an order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub product_id: Uuid,
    pub period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub gateway_plan_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub gateway_snapshot: Option<Value>,
    pub cancel_snapshot: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// True once the gateway holds a live subscription for this record.
    pub fn is_registered(&self) -> bool {
        self.provider_subscription_id.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
    }

    pub fn activate(&mut self, plan_id: String, provider_subscription_id: String, snapshot: Value) {
        self.gateway_plan_id = Some(plan_id);
        self.provider_subscription_id = Some(provider_subscription_id);
        self.gateway_snapshot = Some(snapshot);
        self.status = SubscriptionStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self, snapshot: Option<Value>) {
        if snapshot.is_some() {
            self.cancel_snapshot = snapshot;
        }
        self.status = SubscriptionStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub product_id: Uuid,
    pub period: String,
    pub status: String,
    pub gateway_plan_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub gateway_snapshot: Option<Value>,
    pub cancel_snapshot: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionEntity {
    type Error = anyhow::Error;

    fn try_from(row: SubscriptionRow) -> Result<Self> {
        let period = BillingPeriod::from_str(&row.period)
            .ok_or_else(|| anyhow!("subscription {} has unknown period '{}'", row.id, row.period))?;
        let status = SubscriptionStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("subscription {} has unknown status '{}'", row.id, row.status))?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            product_id: row.product_id,
            period,
            status,
            gateway_plan_id: row.gateway_plan_id,
            provider_subscription_id: row.provider_subscription_id,
            gateway_snapshot: row.gateway_snapshot,
            cancel_snapshot: row.cancel_snapshot,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = subscriptions, treat_none_as_null = true)]
pub struct SubscriptionChangeset {
    pub status: String,
    pub gateway_plan_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub gateway_snapshot: Option<Value>,
    pub cancel_snapshot: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SubscriptionEntity> for SubscriptionChangeset {
    fn from(subscription: &SubscriptionEntity) -> Self {
        Self {
            status: subscription.status.as_str().to_string(),
            gateway_plan_id: subscription.gateway_plan_id.clone(),
            provider_subscription_id: subscription.provider_subscription_id.clone(),
            gateway_snapshot: subscription.gateway_snapshot.clone(),
            cancel_snapshot: subscription.cancel_snapshot.clone(),
            updated_at: subscription.updated_at,
        }
    }
}
