use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::domain::value_objects::payment_methods::CardDetails;
use crate::payments::gateway::{
    ChargeRequest, CouponRequest, GatewayCard, GatewaySubscription, PaymentGateway, PlanRequest,
    RedirectSource, RedirectSourceRequest, SubscriptionRequest,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

type Form = Vec<(String, String)>;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Deserialize)]
struct IdResp {
    id: String,
}

impl StripeClient {
    pub fn new(secret_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self { http, secret_key })
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        // The Stripe message is customer-safe ("Your card was declined.") and
        // ends up on the payment record.
        match details.and_then(|d| d.message) {
            Some(message) => anyhow::bail!("{message}"),
            None => anyhow::bail!(
                "Stripe API request failed: {} (status {}, request_id={:?})",
                context,
                status,
                request_id
            ),
        }
    }

    async fn post_form(&self, path: &str, form: &Form, context: &str) -> Result<Value> {
        self.send_form(path, form, context, None).await
    }

    /// Stripe replays the stored response for a repeated key instead of
    /// creating a second object.
    async fn post_idempotent(
        &self,
        path: &str,
        form: &Form,
        context: &str,
        idempotency_key: &str,
    ) -> Result<Value> {
        self.send_form(path, form, context, Some(idempotency_key))
            .await
    }

    async fn send_form(
        &self,
        path: &str,
        form: &Form,
        context: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Value> {
        debug!(path, context, ?idempotency_key, "stripe: POST");

        let mut builder = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY, key);
        }

        let resp = builder
            .form(form)
            .send()
            .await
            .with_context(|| format!("{context}: request to Stripe failed"))?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }

    async fn get(&self, path: &str, context: &str) -> Result<Value> {
        debug!(path, context, "stripe: GET");

        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await
            .with_context(|| format!("{context}: request to Stripe failed"))?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn card_form(card: &CardDetails) -> Form {
    let mut form = vec![
        field("source[object]", "card"),
        field("source[number]", card.number.trim()),
        field("source[exp_month]", card.exp_month),
        field("source[exp_year]", card.exp_year),
        field("source[cvc]", card.cvc.trim()),
    ];
    if let Some(name) = card.name.as_deref().filter(|name| !name.trim().is_empty()) {
        form.push(field("source[name]", name.trim()));
    }
    form
}

fn charge_form(request: &ChargeRequest) -> Form {
    let mut form = vec![
        field("amount", request.amount_minor),
        field("currency", &request.currency),
        field("source", &request.source),
        field("description", &request.description),
    ];
    if let Some(customer) = &request.customer {
        form.push(field("customer", customer));
    }
    form
}

fn redirect_source_form(request: &RedirectSourceRequest) -> Form {
    vec![
        field("type", &request.source_type),
        field("amount", request.amount_minor),
        field("currency", &request.currency),
        field("redirect[return_url]", &request.return_url),
    ]
}

fn plan_form(request: &PlanRequest) -> Form {
    vec![
        field("amount", request.amount_minor),
        field("currency", &request.currency),
        field("interval", request.interval.as_str()),
        field("interval_count", request.interval_count),
        field("product[name]", &request.product_name),
    ]
}

fn subscription_form(request: &SubscriptionRequest) -> Form {
    let mut form = vec![field("customer", &request.customer)];
    for (idx, item) in request.items.iter().enumerate() {
        form.push(field(&format!("items[{idx}][plan]"), &item.plan_id));
        form.push(field(&format!("items[{idx}][quantity]"), item.quantity));
    }
    if let Some(trial_end) = request.trial_end {
        form.push(field("trial_end", trial_end));
    }
    if let Some(coupon) = &request.coupon {
        form.push(field("coupon", coupon));
    }
    form
}

fn coupon_form(request: &CouponRequest) -> Form {
    vec![
        field("id", &request.id),
        field("amount_off", request.amount_off_minor),
        field("currency", &request.currency),
        field("duration", "once"),
    ]
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, email: &str) -> Result<String> {
        // https://stripe.com/docs/api/customers/create
        let form = vec![field("email", email)];
        let customer = self.post_form("/customers", &form, "create customer").await?;
        let parsed: IdResp = serde_json::from_value(customer)?;
        Ok(parsed.id)
    }

    async fn attach_card(&self, customer: &str, card: &CardDetails) -> Result<GatewayCard> {
        let attached = self
            .post_form(
                &format!("/customers/{customer}/sources"),
                &card_form(card),
                "attach card",
            )
            .await?;
        Ok(serde_json::from_value(attached)?)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Value> {
        // https://stripe.com/docs/api/charges/create
        self.post_form("/charges", &charge_form(request), "create charge")
            .await
    }

    async fn create_redirect_source(
        &self,
        request: &RedirectSourceRequest,
    ) -> Result<RedirectSource> {
        let source = self
            .post_form("/sources", &redirect_source_form(request), "create source")
            .await?;

        let id = source
            .get("id")
            .and_then(Value::as_str)
            .context("source response is missing an id")?
            .to_string();
        let redirect_url = source
            .pointer("/redirect/url")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(RedirectSource {
            id,
            redirect_url,
            raw: source,
        })
    }

    async fn create_plan(&self, request: &PlanRequest) -> Result<String> {
        let plan = self
            .post_idempotent(
                "/plans",
                &plan_form(request),
                "create plan",
                &request.idempotency_key,
            )
            .await?;
        let parsed: IdResp = serde_json::from_value(plan)?;
        Ok(parsed.id)
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription> {
        let subscription = self
            .post_idempotent(
                "/subscriptions",
                &subscription_form(request),
                "create subscription",
                &request.idempotency_key,
            )
            .await?;
        GatewaySubscription::from_value(subscription)
    }

    async fn create_coupon(&self, request: &CouponRequest) -> Result<String> {
        let coupon = self
            .post_idempotent(
                "/coupons",
                &coupon_form(request),
                "create coupon",
                &request.idempotency_key,
            )
            .await?;
        let parsed: IdResp = serde_json::from_value(coupon)?;
        Ok(parsed.id)
    }

    async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription> {
        // https://stripe.com/docs/api/subscriptions/cancel#cancel_subscription-at_period_end
        let form = vec![field("cancel_at_period_end", "true")];
        let subscription = self
            .post_form(
                &format!("/subscriptions/{subscription_id}"),
                &form,
                "cancel subscription",
            )
            .await?;
        GatewaySubscription::from_value(subscription)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let subscription = self
            .get(
                &format!("/subscriptions/{subscription_id}"),
                "retrieve subscription",
            )
            .await?;
        GatewaySubscription::from_value(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::billing_periods::PlanInterval;
    use crate::payments::gateway::SubscriptionItemRequest;

    fn value_of<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn charge_form_carries_minor_units_and_optional_customer() {
        let mut request = ChargeRequest {
            amount_minor: 4999,
            currency: "usd".to_string(),
            source: "card_1".to_string(),
            customer: None,
            description: "Payment ID 1".to_string(),
        };

        let form = charge_form(&request);
        assert_eq!(value_of(&form, "amount"), Some("4999"));
        assert_eq!(value_of(&form, "customer"), None);

        request.customer = Some("cus_1".to_string());
        let form = charge_form(&request);
        assert_eq!(value_of(&form, "customer"), Some("cus_1"));
        assert_eq!(value_of(&form, "description"), Some("Payment ID 1"));
    }

    #[test]
    fn subscription_form_indexes_items() {
        let request = SubscriptionRequest {
            customer: "cus_1".to_string(),
            items: vec![
                SubscriptionItemRequest {
                    plan_id: "plan_a".to_string(),
                    quantity: 1,
                },
                SubscriptionItemRequest {
                    plan_id: "plan_b".to_string(),
                    quantity: 3,
                },
            ],
            trial_end: Some(1_900_000_000),
            coupon: None,
            idempotency_key: "reg_1".to_string(),
        };

        let form = subscription_form(&request);

        assert_eq!(value_of(&form, "items[0][plan]"), Some("plan_a"));
        assert_eq!(value_of(&form, "items[1][quantity]"), Some("3"));
        assert_eq!(value_of(&form, "trial_end"), Some("1900000000"));
        assert_eq!(value_of(&form, "coupon"), None);
    }

    #[test]
    fn plan_form_uses_gateway_interval() {
        let form = plan_form(&PlanRequest {
            amount_minor: 3000,
            currency: "usd".to_string(),
            product_name: "Coffee club".to_string(),
            interval: PlanInterval::Month,
            interval_count: 3,
            idempotency_key: "reg_1-plan-1".to_string(),
        });

        assert_eq!(value_of(&form, "interval"), Some("month"));
        assert_eq!(value_of(&form, "interval_count"), Some("3"));
        assert_eq!(value_of(&form, "product[name]"), Some("Coffee club"));
    }

    #[test]
    fn coupon_form_is_single_use_amount_off() {
        let form = coupon_form(&CouponRequest {
            id: "coupon_1".to_string(),
            amount_off_minor: 500,
            currency: "usd".to_string(),
            idempotency_key: "reg_1-coupon".to_string(),
        });

        assert_eq!(value_of(&form, "amount_off"), Some("500"));
        assert_eq!(value_of(&form, "duration"), Some("once"));
    }
}
