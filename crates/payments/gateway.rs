//! Contract between settlement and the external card processor.
//!
//! Amounts crossing this boundary are always integer minor units.

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::value_objects::{
    enums::billing_periods::PlanInterval, payment_methods::CardDetails,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub source: String,
    pub customer: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSourceRequest {
    pub source_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectSource {
    pub id: String,
    pub redirect_url: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub product_name: String,
    pub interval: PlanInterval,
    pub interval_count: u32,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionItemRequest {
    pub plan_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub customer: String,
    pub items: Vec<SubscriptionItemRequest>,
    /// Unix seconds.
    pub trial_end: Option<i64>,
    pub coupon: Option<String>,
    /// Replaying a key returns the subscription created the first time.
    pub idempotency_key: String,
}

/// One-time amount-off coupon applied to the first recurring invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRequest {
    pub id: String,
    pub amount_off_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayCard {
    pub id: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub last4: String,
    #[serde(default)]
    pub funding: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub raw: Value,
}

impl GatewaySubscription {
    pub fn from_value(raw: Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct Fields {
            id: String,
            #[serde(default)]
            status: String,
            #[serde(default)]
            cancel_at_period_end: bool,
        }

        let fields: Fields = serde_json::from_value(raw.clone())?;
        Ok(Self {
            id: fields.id,
            status: fields.status,
            cancel_at_period_end: fields.cancel_at_period_end,
            raw,
        })
    }

    /// Still billing and not scheduled to stop.
    pub fn is_live(&self) -> bool {
        self.status == "active" && !self.cancel_at_period_end
    }
}

#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn create_customer(&self, email: &str) -> Result<String>;

    async fn attach_card(&self, customer: &str, card: &CardDetails) -> Result<GatewayCard>;

    /// Returns the raw charge object.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Value>;

    async fn create_redirect_source(&self, request: &RedirectSourceRequest)
    -> Result<RedirectSource>;

    /// Returns the plan id.
    async fn create_plan(&self, request: &PlanRequest) -> Result<String>;

    async fn create_subscription(&self, request: &SubscriptionRequest)
    -> Result<GatewaySubscription>;

    /// Returns the coupon id.
    async fn create_coupon(&self, request: &CouponRequest) -> Result<String>;

    async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subscription_scheduled_to_cancel_is_not_live() {
        let active = GatewaySubscription::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "cancel_at_period_end": false
        }))
        .unwrap();
        assert!(active.is_live());

        let ending = GatewaySubscription::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "cancel_at_period_end": true
        }))
        .unwrap();
        assert!(!ending.is_live());

        let past_due = GatewaySubscription::from_value(json!({"id": "sub_1", "status": "past_due"}))
            .unwrap();
        assert!(!past_due.is_live());
    }
}
